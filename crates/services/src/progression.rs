use std::sync::Arc;
use std::time::Duration;

use course_core::model::{
    AssessmentKind, Course, CourseSlug, EnrollmentProgress, LessonContent, LessonId,
    LessonResolution, Route, resolve_current,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{CourseApi, CourseSnapshot, NextStep};
use crate::config::DEFAULT_ACCESS_PING_SECS;
use crate::error::{GatewayError, ProgressionError};
use crate::shell::{Notice, Shell};
use crate::tasks::ScopedTask;

/// Where the learner is in the course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressionState {
    Loading,
    /// Outline loaded, no lesson open.
    Ready,
    Viewing(LessonId),
    Advancing(LessonId),
    /// Terminal here; an assessment controller decides what comes next.
    HandoffToAssessment(Route),
    CourseComplete,
}

/// Result of opening a lesson.
#[derive(Debug, Clone, PartialEq)]
pub enum LessonOpen {
    Loaded,
    /// Access was refused; go here instead.
    Redirect(Route),
}

/// Drives a learner through one course, one lesson at a time.
///
/// The remote owns progress: every step ends with a fresh course fetch, and
/// nothing is advanced locally.
pub struct ProgressionController {
    api: Arc<dyn CourseApi>,
    shell: Arc<dyn Shell>,
    slug: CourseSlug,
    base_url: Url,
    access_ping_delay: Duration,
    snapshot: Option<CourseSnapshot>,
    state: ProgressionState,
    current: Option<LessonId>,
    content: Option<LessonContent>,
    last_loaded: Option<LessonId>,
    access_ping: Option<ScopedTask>,
}

impl ProgressionController {
    #[must_use]
    pub fn new(
        api: Arc<dyn CourseApi>,
        shell: Arc<dyn Shell>,
        slug: CourseSlug,
        base_url: Url,
    ) -> Self {
        Self {
            api,
            shell,
            slug,
            base_url,
            access_ping_delay: Duration::from_secs(DEFAULT_ACCESS_PING_SECS),
            snapshot: None,
            state: ProgressionState::Loading,
            current: None,
            content: None,
            last_loaded: None,
            access_ping: None,
        }
    }

    #[must_use]
    pub fn with_access_ping_delay(mut self, delay: Duration) -> Self {
        self.access_ping_delay = delay;
        self
    }

    #[must_use]
    pub fn slug(&self) -> &CourseSlug {
        &self.slug
    }

    #[must_use]
    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    #[must_use]
    pub fn course(&self) -> Option<&Course> {
        self.snapshot.as_ref().map(|s| &s.course)
    }

    #[must_use]
    pub fn progress(&self) -> Option<&EnrollmentProgress> {
        self.snapshot.as_ref().map(|s| &s.progress)
    }

    #[must_use]
    pub fn current_lesson(&self) -> Option<LessonId> {
        self.current
    }

    #[must_use]
    pub fn content(&self) -> Option<&LessonContent> {
        self.content.as_ref()
    }

    /// Fetch the outline and progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Gateway` if the course cannot be fetched.
    pub async fn load(&mut self) -> Result<&CourseSnapshot, ProgressionError> {
        let snapshot = self.api.course(&self.slug).await?;
        info!(
            course = %self.slug,
            lessons = snapshot.course.lesson_count(),
            percent = snapshot.progress.completion_percent,
            "course loaded"
        );
        self.snapshot = Some(snapshot);
        if self.state == ProgressionState::Loading {
            self.state = ProgressionState::Ready;
        }
        self.snapshot.as_ref().ok_or(ProgressionError::NotLoaded)
    }

    /// Look up `id` in the loaded outline. `NotReady` until both line up.
    #[must_use]
    pub fn resolve_current(&self, id: LessonId) -> LessonResolution<'_> {
        resolve_current(self.course(), id)
    }

    /// The lesson to reopen on entry: the resume pointer, else the first unlocked lesson.
    #[must_use]
    pub fn resume_route(&self) -> Option<Route> {
        let snapshot = self.snapshot.as_ref()?;
        snapshot
            .progress
            .resume_target(&snapshot.course)
            .map(|lesson| self.lesson_route(lesson.id()))
    }

    /// Choose a lesson from the outline. Locked or unknown lessons are ignored.
    pub fn select(&mut self, id: LessonId) -> Option<Route> {
        let lesson = self.course()?.lesson(id)?;
        if !lesson.is_unlocked() {
            debug!(lesson = %id, "ignoring locked lesson");
            return None;
        }
        self.current = Some(id);
        self.state = ProgressionState::Viewing(id);
        Some(self.lesson_route(id))
    }

    /// Fetch a lesson's content and schedule the delayed access ping.
    ///
    /// Opening another lesson before the delay elapses cancels the pending ping.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Gateway` for anything but a refusal, which is
    /// reported as [`LessonOpen::Redirect`].
    pub async fn open_lesson(&mut self, id: LessonId) -> Result<LessonOpen, ProgressionError> {
        self.access_ping = None;

        match self.api.lesson(id).await {
            Ok(content) => {
                self.content = Some(content);
                self.current = Some(id);
                self.last_loaded = Some(id);
                self.state = ProgressionState::Viewing(id);
                self.schedule_access_ping(id);
                Ok(LessonOpen::Loaded)
            }
            Err(GatewayError::Forbidden) => {
                warn!(lesson = %id, "lesson access refused");
                self.shell.notify(Notice::NoLessonAccess);
                let route = match self.last_loaded {
                    Some(previous) => self.lesson_route(previous),
                    None => Route::CourseOverview(self.slug.clone()),
                };
                Ok(LessonOpen::Redirect(route))
            }
            Err(err) => {
                if let GatewayError::RateLimited { retry_after_secs } = err {
                    self.shell.notify(Notice::RateLimited { retry_after_secs });
                }
                Err(err.into())
            }
        }
    }

    fn schedule_access_ping(&mut self, id: LessonId) {
        let api = Arc::clone(&self.api);
        let delay = self.access_ping_delay;
        self.access_ping = Some(ScopedTask::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = api.lesson_accessed(id).await {
                debug!(lesson = %id, error = %err, "access ping failed");
            }
        }));
    }

    /// Move past the current lesson.
    ///
    /// A lesson with an assessment hands off to it; the last lesson is marked
    /// complete and hands off to the course assessment; any other lesson is marked
    /// complete and the remote picks the next step. The course is re-fetched
    /// afterwards whatever happened.
    ///
    /// # Errors
    ///
    /// - `Busy` while a previous step has not settled.
    /// - `HandedOff` once the course has passed control elsewhere.
    /// - `NotLoaded`, `NoCurrentLesson`, `UnknownLesson` when there is nothing to advance from.
    /// - `Gateway` or `Route` when the remote step fails; the state returns to viewing.
    pub async fn advance(&mut self) -> Result<Route, ProgressionError> {
        match self.state {
            ProgressionState::Advancing(_) => return Err(ProgressionError::Busy),
            ProgressionState::HandoffToAssessment(_) | ProgressionState::CourseComplete => {
                return Err(ProgressionError::HandedOff);
            }
            _ => {}
        }

        let course = self.course().ok_or(ProgressionError::NotLoaded)?;
        let id = self.current.ok_or(ProgressionError::NoCurrentLesson)?;
        let lesson = course.lesson(id).ok_or(ProgressionError::UnknownLesson(id))?;
        let has_assessment = lesson.has_assessment();
        let is_last = course.is_last(id);

        self.state = ProgressionState::Advancing(id);
        let outcome = self.step(id, has_assessment, is_last).await;

        if let Err(err) = self.refresh().await {
            warn!(course = %self.slug, error = %err, "course refresh after step failed");
        }

        match outcome {
            Ok((state, route)) => {
                info!(from = %id, to = %route, "advanced");
                self.state = state;
                Ok(route)
            }
            Err(err) => {
                self.state = ProgressionState::Viewing(id);
                Err(err)
            }
        }
    }

    async fn step(
        &mut self,
        id: LessonId,
        has_assessment: bool,
        is_last: bool,
    ) -> Result<(ProgressionState, Route), ProgressionError> {
        if has_assessment {
            let session = self.api.start_lesson_assessment(id).await?;
            let route = Route::Assessment {
                kind: AssessmentKind::Lesson,
                model_id: id.value(),
                session,
            };
            return Ok((ProgressionState::HandoffToAssessment(route.clone()), route));
        }

        self.api.complete_lesson(id).await?;

        if is_last {
            let route = Route::CourseAssessment(self.slug.clone());
            return Ok((ProgressionState::HandoffToAssessment(route.clone()), route));
        }

        match self.api.next_step(&self.slug, id).await? {
            NextStep::Lesson { url } => {
                let route = Route::parse(&url, &self.base_url)?;
                let state = match &route {
                    Route::Lesson { lesson, .. } => {
                        self.current = Some(*lesson);
                        ProgressionState::Viewing(*lesson)
                    }
                    _ => ProgressionState::Ready,
                };
                Ok((state, route))
            }
            NextStep::Assessment { url } => {
                let route = Route::parse(&url, &self.base_url)?;
                Ok((ProgressionState::HandoffToAssessment(route.clone()), route))
            }
            NextStep::End => {
                self.shell.notify(Notice::CourseComplete);
                Ok((ProgressionState::CourseComplete, Route::Home))
            }
        }
    }

    /// Step back one lesson. Nothing happens on the first lesson.
    pub fn retreat(&mut self) -> Option<Route> {
        let id = self.current?;
        let previous = self.course()?.predecessor(id)?.id();
        self.current = Some(previous);
        self.state = ProgressionState::Viewing(previous);
        Some(self.lesson_route(previous))
    }

    /// Finish the course from its last lesson and hand off to the course assessment.
    ///
    /// # Errors
    ///
    /// Returns `Gateway` if the lesson cannot be marked complete.
    pub async fn finish_course(&mut self) -> Result<Route, ProgressionError> {
        let id = self.current.ok_or(ProgressionError::NoCurrentLesson)?;
        self.api.complete_lesson(id).await?;
        if let Err(err) = self.refresh().await {
            warn!(course = %self.slug, error = %err, "course refresh after finish failed");
        }
        let route = Route::CourseAssessment(self.slug.clone());
        self.state = ProgressionState::HandoffToAssessment(route.clone());
        Ok(route)
    }

    /// Re-read outline and progress from the remote.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Gateway` if the fetch fails; the previous snapshot is kept.
    pub async fn refresh(&mut self) -> Result<(), ProgressionError> {
        self.snapshot = Some(self.api.course(&self.slug).await?);
        Ok(())
    }

    fn lesson_route(&self, lesson: LessonId) -> Route {
        Route::Lesson {
            course: self.slug.clone(),
            lesson,
        }
    }
}
