use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use course_core::model::{
    AssessmentKind, CourseSlug, LessonContent, LessonId, Route, SessionId,
};
use services::{
    AppServices, AssessmentController, AssessmentError, AssessmentTarget, DraftResolution,
    LessonOpen, PlaybackPosition, ProgressionController, ProgressionError, ScopedTask, TimerTick,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use ui::vm::{
    LessonBodyVm, QuestionBodyVm, ViewError, course_outline_vm, current_question_vm,
    draft_to_html, format_countdown, format_datetime, html_to_markdown, lesson_vm,
    looks_like_html, map_enrollments, parse_answer, rate_limit_banner, summary_vm,
};

use crate::terminal::{Input, TerminalShell};

pub type FlowResult<T = ()> = Result<T, Box<dyn Error>>;

/// Print the breaker banner whenever requests pause or resume.
pub fn watch_rate_limit(app: &AppServices) -> ScopedTask {
    let mut rx = app.breaker().subscribe();
    ScopedTask::spawn(async move {
        let mut was_limited = false;
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            if state.is_limited() == was_limited {
                continue;
            }
            was_limited = state.is_limited();
            match rate_limit_banner(state) {
                Some(text) => println!("[!] {text}"),
                None => println!("[i] Requests resumed."),
            }
        }
    })
}

pub async fn dashboard(app: &AppServices) -> FlowResult {
    let api = app.api();
    let enrollments = api.enrolled_courses().await?;
    let summary = summary_vm(&api.progress_summary().await?);

    println!("{} | {} | {}", summary.courses, summary.modules, summary.lessons);
    println!();
    if enrollments.is_empty() {
        println!("You are not enrolled in any course yet.");
    }
    for card in map_enrollments(&enrollments) {
        let status = if card.complete { "done" } else { "" };
        let seen = card.last_accessed_str.as_deref().unwrap_or("never opened");
        println!(
            "{:>3}%  {:<44} {:<20} {seen} {status}",
            card.percent, card.title_preview, card.slug
        );
    }
    Ok(())
}

enum Event {
    Line(Option<String>),
    Tick,
}

/// What the lesson screen does after following a route.
enum Followed {
    /// Back on a lesson; holds its checkpoint guard if it is a video.
    Viewing(Option<ScopedTask>),
    Finished,
}

/// Where an assessment screen picks up from.
enum AssessmentStart {
    Fresh(AssessmentTarget),
    Cached(AssessmentKind, SessionId),
}

/// One interactive terminal session: shell, stdin and services together.
pub struct Terminal {
    app: AppServices,
    shell: Arc<TerminalShell>,
    input: Input,
}

impl Terminal {
    pub fn new(app: AppServices) -> Self {
        Self {
            app,
            shell: Arc::new(TerminalShell::new()),
            input: Input::new(),
        }
    }

    pub async fn learn(&mut self, slug: CourseSlug, lesson: Option<LessonId>) -> FlowResult {
        let mut progression = self.app.progression(slug, self.shell.clone());
        progression.load().await?;

        let start = lesson.or_else(|| match progression.resume_route() {
            Some(Route::Lesson { lesson, .. }) => Some(lesson),
            _ => None,
        });
        let Some(start) = start else {
            println!("No lesson is open to you in this course yet.");
            return Ok(());
        };

        print_outline(&progression);
        let mut _checkpoints = self.open(&mut progression, start).await?;

        loop {
            let Some(line) = self
                .input
                .read("\n[n]ext  [p]rev  [o <id>] open  [l]ist  [q]uit > ")
                .await?
            else {
                return Ok(());
            };

            match line.split_once(' ').unwrap_or((line.as_str(), "")) {
                ("n", _) => {
                    _checkpoints = None;
                    let route = match progression.advance().await {
                        Ok(route) => route,
                        Err(err) => {
                            report_progression(&err);
                            continue;
                        }
                    };
                    match self.follow(&mut progression, route).await? {
                        Followed::Viewing(next) => _checkpoints = next,
                        Followed::Finished => return Ok(()),
                    }
                }
                ("p", _) => match progression.retreat() {
                    Some(Route::Lesson { lesson, .. }) => {
                        _checkpoints = self.open(&mut progression, lesson).await?;
                    }
                    _ => println!("This is the first lesson."),
                },
                ("o", raw) => match raw.trim().parse::<LessonId>() {
                    Ok(id) => _checkpoints = self.open(&mut progression, id).await?,
                    Err(_) => println!("Usage: o <lesson id>"),
                },
                ("l", _) => print_outline(&progression),
                ("q", _) => return Ok(()),
                _ => println!("Unknown command."),
            }
        }
    }

    /// Show a lesson. Returns the checkpoint guard for video lessons.
    async fn open(
        &mut self,
        progression: &mut ProgressionController,
        id: LessonId,
    ) -> FlowResult<Option<ScopedTask>> {
        if progression.select(id).is_none() {
            println!("Lesson {id} is locked or not part of this course.");
            return Ok(None);
        }

        match progression.open_lesson(id).await {
            Ok(LessonOpen::Loaded) => {}
            Ok(LessonOpen::Redirect(route)) => {
                if let Route::Lesson { lesson, .. } = &route {
                    let _ = progression.select(*lesson);
                }
                println!("Back to {}", route.path());
                return Ok(None);
            }
            Err(err) => {
                report_progression(&err);
                return Ok(None);
            }
        }

        let Some(content) = progression.content() else {
            return Ok(None);
        };
        self.show_lesson(content.clone()).await
    }

    async fn show_lesson(&self, content: LessonContent) -> FlowResult<Option<ScopedTask>> {
        let vm = lesson_vm(&content);
        println!("\n== {} ({}) ==\n", vm.title, vm.kind_label);
        match vm.body {
            LessonBodyVm::Article { markdown, .. } => {
                println!("{markdown}");
                Ok(None)
            }
            LessonBodyVm::Empty => {
                println!("(This lesson has no content yet.)");
                Ok(None)
            }
            LessonBodyVm::Video { source } => {
                let tracker = self.app.media_progress();
                let offset = match tracker.restore(content.id).await {
                    Ok(Some(seconds)) => {
                        println!(
                            "Video: {source} (resuming at {})",
                            format_countdown(chrono::Duration::seconds(
                                i64::try_from(seconds).unwrap_or(0)
                            ))
                        );
                        seconds
                    }
                    Ok(None) => {
                        println!("Video: {source}");
                        0
                    }
                    Err(err) => {
                        debug!(lesson = %content.id, error = %err, "no saved position");
                        println!("Video: {source}");
                        0
                    }
                };

                // No player here: playback is assumed to run from the restored offset.
                let started = Instant::now();
                let base = f64::from(u32::try_from(offset).unwrap_or(u32::MAX));
                let position: Arc<dyn PlaybackPosition> =
                    Arc::new(move || base + started.elapsed().as_secs_f64());
                Ok(Some(tracker.start_checkpoints(content.id, position)))
            }
        }
    }

    /// Follow routes until the learner is back on a lesson or the flow ends.
    async fn follow(
        &mut self,
        progression: &mut ProgressionController,
        route: Route,
    ) -> FlowResult<Followed> {
        let mut next = route;
        loop {
            info!(route = %next, "following");
            let start = match next {
                Route::Lesson { lesson, .. } => {
                    return Ok(Followed::Viewing(self.open(progression, lesson).await?));
                }
                Route::Assessment {
                    kind: AssessmentKind::Lesson,
                    model_id,
                    session,
                } => AssessmentStart::Fresh(AssessmentTarget::Lesson {
                    lesson: LessonId::new(model_id),
                    session: Some(session),
                }),
                Route::Assessment {
                    kind: AssessmentKind::Course,
                    session,
                    ..
                } => AssessmentStart::Fresh(AssessmentTarget::Course {
                    slug: progression.slug().clone(),
                    session: Some(session),
                }),
                Route::Assessment { kind, session, .. } => AssessmentStart::Cached(kind, session),
                Route::Test(session) => AssessmentStart::Cached(AssessmentKind::Test, session),
                Route::CourseAssessment(slug) => {
                    AssessmentStart::Fresh(AssessmentTarget::Course {
                        slug,
                        session: None,
                    })
                }
                Route::CourseOverview(_) => {
                    progression.refresh().await?;
                    print_outline(progression);
                    return Ok(Followed::Viewing(None));
                }
                Route::Home | Route::TestsList => return Ok(Followed::Finished),
                Route::External(url) => {
                    println!("Continue at {url}");
                    return Ok(Followed::Finished);
                }
            };

            match self.assess(start).await? {
                Some(route) => {
                    if let Err(err) = progression.refresh().await {
                        debug!(error = %err, "refresh after assessment failed");
                    }
                    next = route;
                }
                None => return Ok(Followed::Finished),
            }
        }
    }

    pub async fn test(&mut self, target: AssessmentTarget) -> FlowResult {
        if let Some(route) = self.assess(AssessmentStart::Fresh(target)).await? {
            debug!(route = %route, "test finished");
        }
        Ok(())
    }

    pub async fn resume(&mut self, kind: AssessmentKind, session: SessionId) -> FlowResult {
        match self.assess(AssessmentStart::Cached(kind, session)).await {
            Err(err)
                if matches!(
                    err.downcast_ref::<AssessmentError>(),
                    Some(AssessmentError::NothingCached)
                ) =>
            {
                println!("Nothing saved on this device for that session.");
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    /// Run an assessment to completion. `Ok(None)` when the learner leaves or time runs out.
    async fn assess(&mut self, start: AssessmentStart) -> FlowResult<Option<Route>> {
        let mut controller = self.app.assessment(self.shell.clone());
        match start {
            AssessmentStart::Fresh(target) => controller.start(target).await?,
            AssessmentStart::Cached(kind, id) => controller.resume(kind, id).await?,
        };
        if let Some(remaining) = controller.remaining() {
            println!("Time allowed: {}", format_countdown(remaining));
        }
        println!("Type an answer, or :save :next :prev :submit :quit");
        print_question(&controller);

        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                line = self.input.next_line() => Event::Line(line?),
                _ = ticker.tick() => Event::Tick,
            };

            let line = match event {
                Event::Tick => {
                    match controller.tick().await {
                        Ok(TimerTick::Running(remaining)) => {
                            let seconds = remaining.num_seconds();
                            if seconds % 60 == 0 || seconds <= 10 {
                                println!("  {} left", format_countdown(remaining));
                            }
                        }
                        Ok(TimerTick::Submitted(outcome)) => return Ok(Some(outcome.route)),
                        Ok(TimerTick::Expired) => return Ok(None),
                        Ok(TimerTick::Untimed | TimerTick::Idle) => {}
                        Err(err) => report_assessment(&err),
                    }
                    continue;
                }
                Event::Line(None) => {
                    controller.abandon();
                    return Ok(None);
                }
                Event::Line(Some(line)) => line,
            };

            match line.as_str() {
                ":next" => {
                    if let Err(err) = controller.next() {
                        println!("{err}");
                    }
                }
                ":save" => match controller.save_answer().await {
                    Ok(()) => println!("Answer saved."),
                    Err(err) => report_assessment(&err),
                },
                ":prev" => {
                    if let Err(err) = controller.prev() {
                        println!("{err}");
                    }
                }
                ":submit" => match controller.submit().await {
                    Ok(outcome) => return Ok(Some(outcome.route)),
                    Err(err) => report_assessment(&err),
                },
                ":quit" => {
                    if !self.shell.leave_guard_armed()
                        || self
                            .input
                            .confirm("Leave? Your answers stay on this device.")
                            .await?
                    {
                        controller.abandon();
                        return Ok(None);
                    }
                }
                text => answer(&mut controller, text).await,
            }
            print_question(&controller);
        }
    }

    pub async fn draft(&mut self, lesson: LessonId, publish: Option<String>) -> FlowResult {
        let drafts = self.app.drafts();

        if let Some(path) = publish {
            let raw = std::fs::read_to_string(&path)?;
            drafts.save_local(lesson, &raw).await?;
            drafts.publish(lesson, &draft_to_html(&raw)).await?;
            println!("Published lesson {lesson}.");
            return Ok(());
        }

        match drafts.reconcile(lesson).await? {
            DraftResolution::Remote { content } => print_draft(&content),
            DraftResolution::Conflict {
                local,
                remote,
                remote_updated_at,
            } => {
                let remote_at =
                    remote_updated_at.map_or_else(|| "unknown".to_owned(), format_datetime);
                println!(
                    "This device has a newer draft (saved {}, remote {remote_at}).",
                    format_datetime(local.saved_at)
                );
                if self.input.confirm("Keep the local draft?").await? {
                    print_draft(&local.content);
                } else {
                    drafts.discard_local(lesson).await?;
                    print_draft(&remote);
                }
            }
        }
        Ok(())
    }
}

async fn answer(controller: &mut AssessmentController, text: &str) {
    let Some(question) = controller
        .session()
        .and_then(|session| session.current_question())
        .cloned()
    else {
        return;
    };
    match parse_answer(&question, text) {
        Ok(value) => {
            if let Err(err) = controller.answer_current(value).await {
                report_assessment(&err);
            }
        }
        Err(err) => println!("{}", err.message()),
    }
}

fn print_question(controller: &AssessmentController) {
    let Some(vm) = controller.session().and_then(current_question_vm) else {
        return;
    };
    println!("\n{}{}", vm.position, if vm.answered { " (answered)" } else { "" });
    match vm.body {
        QuestionBodyVm::Choice { options } => {
            println!("{}", vm.prompt);
            for option in options {
                let mark = if option.selected { "*" } else { " " };
                println!(" {mark} {}. {}", option.number, option.label);
            }
        }
        QuestionBodyVm::TrueFalse { selected } => {
            println!("{}", vm.prompt);
            let shown = match selected {
                Some(true) => "true",
                Some(false) => "false",
                None => "-",
            };
            println!("   true / false  [{shown}]");
        }
        QuestionBodyVm::FillInBlank {
            prefix,
            suffix,
            value,
        } => {
            let blank = if value.is_empty() { "____".to_owned() } else { value };
            println!("{prefix}[{blank}]{suffix}");
        }
    }
    if vm.is_last {
        println!("(last question, :submit when ready)");
    }
}

fn print_outline(progression: &ProgressionController) {
    let (Some(course), Some(progress)) = (progression.course(), progression.progress()) else {
        return;
    };
    let vm = course_outline_vm(course, progress, progression.current_lesson());
    println!("\n{}  {} {}%  {}", vm.title, vm.progress_bar, vm.percent, vm.lessons_label);
    for module in vm.modules {
        println!("  {}", module.title);
        for row in module.lessons {
            let marker = match (row.current, row.locked) {
                (true, _) => ">",
                (false, true) => "#",
                (false, false) => " ",
            };
            let quiz = if row.has_assessment { " [quiz]" } else { "" };
            println!("   {marker} {:>4} {}{quiz}", row.id, row.title);
        }
    }
}

fn print_draft(content: &str) {
    if looks_like_html(content) {
        println!("{}", html_to_markdown(content));
    } else {
        println!("{content}");
    }
}

fn report_progression(err: &ProgressionError) {
    match err {
        ProgressionError::Gateway(_) | ProgressionError::UnknownLesson(_) => {
            println!("{}", ViewError::from(err).message());
        }
        other => println!("{other}"),
    }
}

fn report_assessment(err: &AssessmentError) {
    match err {
        AssessmentError::Gateway(_) => println!("{}", ViewError::from(err).message()),
        other => println!("{other}"),
    }
}
