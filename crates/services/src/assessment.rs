use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use course_core::model::{
    AnswerValue, Answers, AssessmentId, AssessmentKind, AssessmentSession, CategoryId, CourseSlug,
    DeadlineTick, DeadlineWatch, LessonId, Question, QuestionId, Route, SessionId, SessionOwner,
    SessionTiming,
};
use serde::{Deserialize, Serialize};
use storage::repository::CacheScope;
use tracing::{info, warn};
use url::Url;

use crate::api::{CourseApi, Difficulty, SessionPayload, SubmitVerdict, Submission};
use crate::cache::LocalCache;
use crate::config::DEFAULT_RETRY_REDIRECT_SECS;
use crate::error::{AssessmentError, GatewayError};
use crate::shell::{Notice, Shell};

const SESSION_KEY: &str = "session";
const ANSWERS_KEY: &str = "answers";

/// What to open an assessment session for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentTarget {
    /// `session` is the id handed over by the progression step, if any.
    Lesson {
        lesson: LessonId,
        session: Option<SessionId>,
    },
    Course {
        slug: CourseSlug,
        session: Option<SessionId>,
    },
    Test {
        category: CategoryId,
        difficulty: Difficulty,
    },
}

/// The remote verdict and where it sends the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub verdict: SubmitVerdict,
    pub route: Route,
}

/// One pass of the countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTick {
    /// No timed session is open.
    Untimed,
    Running(chrono::Duration),
    /// The deadline already fired.
    Idle,
    /// Time ran out with nothing answered.
    Expired,
    /// Time ran out and the buffered answers were submitted.
    Submitted(SubmitOutcome),
}

/// Session metadata written through to the local cache so a reload can resume.
#[derive(Debug, Serialize, Deserialize)]
struct CachedSession {
    owner: SessionOwner,
    assessment_id: Option<AssessmentId>,
    course_slug: Option<CourseSlug>,
    questions: Vec<Question>,
    timing: Option<SessionTiming>,
}

/// Runs a single assessment attempt: lesson, course, or standalone test.
///
/// Answers are buffered locally and written through to the cache; the remote
/// grades on submit and decides where the learner goes next.
pub struct AssessmentController {
    api: Arc<dyn CourseApi>,
    cache: LocalCache,
    shell: Arc<dyn Shell>,
    base_url: Url,
    retry_redirect_delay: Duration,
    session: Option<AssessmentSession>,
    deadline: Option<DeadlineWatch>,
}

impl AssessmentController {
    #[must_use]
    pub fn new(
        api: Arc<dyn CourseApi>,
        cache: LocalCache,
        shell: Arc<dyn Shell>,
        base_url: Url,
    ) -> Self {
        Self {
            api,
            cache,
            shell,
            base_url,
            retry_redirect_delay: Duration::from_secs(DEFAULT_RETRY_REDIRECT_SECS),
            session: None,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_retry_redirect_delay(mut self, delay: Duration) -> Self {
        self.retry_redirect_delay = delay;
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<&AssessmentSession> {
        self.session.as_ref()
    }

    /// Question at `index`, without clamping.
    #[must_use]
    pub fn current_question(&self, index: usize) -> Option<&Question> {
        self.session.as_ref()?.question_at(index)
    }

    /// Time left as last observed, for timed sessions.
    #[must_use]
    pub fn remaining(&self) -> Option<chrono::Duration> {
        self.deadline.as_ref().map(DeadlineWatch::remaining)
    }

    /// Open a session, starting one remotely when no id was handed over.
    ///
    /// Answers cached by an earlier visit to the same session are restored.
    ///
    /// # Errors
    ///
    /// - `Gateway` if the start or fetch fails.
    /// - `Session(NoQuestions)` if the remote returns an empty question set.
    pub async fn start(
        &mut self,
        target: AssessmentTarget,
    ) -> Result<&AssessmentSession, AssessmentError> {
        let session = match target {
            AssessmentTarget::Lesson { lesson, session } => {
                let id = match session {
                    Some(id) => id,
                    None => self.api.start_lesson_assessment(lesson).await?,
                };
                let payload = self.api.session(AssessmentKind::Lesson, id).await?;
                from_payload(id, SessionOwner::Lesson(lesson), payload)?
            }
            AssessmentTarget::Course { slug, session } => {
                let id = match session {
                    Some(id) => id,
                    None => self.api.start_course_assessment(&slug).await?,
                };
                let payload = self.api.session(AssessmentKind::Course, id).await?;
                from_payload(id, SessionOwner::Course(slug), payload)?
            }
            AssessmentTarget::Test {
                category,
                difficulty,
            } => {
                let started = self.api.start_test(category, difficulty).await?;
                AssessmentSession::new(
                    started.session,
                    SessionOwner::Test(category),
                    started.questions,
                )?
                .with_timing(started.timing)
            }
        };

        let scope = scope_of(&session);
        let session = match self.cache.get::<Answers>(&scope, ANSWERS_KEY).await {
            Ok(Some(cached)) => session.with_answers(cached.value),
            Ok(None) => session,
            Err(err) => {
                warn!(%scope, error = %err, "ignoring unreadable cached answers");
                session
            }
        };

        self.write_through_session(&session).await;
        Ok(self.open(session))
    }

    /// Reopen a session purely from the local cache, as after a reload.
    ///
    /// # Errors
    ///
    /// - `NothingCached` if the session was never cached here or was already submitted.
    /// - `Cache` if the cached copy cannot be read.
    pub async fn resume(
        &mut self,
        kind: AssessmentKind,
        id: SessionId,
    ) -> Result<&AssessmentSession, AssessmentError> {
        let scope = CacheScope::assessment(kind, id);
        let cached = self
            .cache
            .get::<CachedSession>(&scope, SESSION_KEY)
            .await?
            .ok_or(AssessmentError::NothingCached)?
            .value;

        let mut session = AssessmentSession::new(id, cached.owner, cached.questions)?;
        if let Some(assessment_id) = cached.assessment_id {
            session = session.with_assessment(assessment_id, cached.course_slug);
        }
        if let Some(timing) = cached.timing {
            session = session.with_timing(timing);
        }
        if let Some(answers) = self.cache.get::<Answers>(&scope, ANSWERS_KEY).await? {
            session = session.with_answers(answers.value);
        }

        info!(%scope, answered = session.answers().len(), "resumed from cache");
        Ok(self.open(session))
    }

    /// [`AssessmentController::resume`] for a standalone test.
    ///
    /// # Errors
    ///
    /// See [`AssessmentController::resume`].
    pub async fn resume_test(&mut self, id: SessionId) -> Result<&AssessmentSession, AssessmentError> {
        self.resume(AssessmentKind::Test, id).await
    }

    fn open(&mut self, session: AssessmentSession) -> &AssessmentSession {
        info!(
            kind = %session.kind(),
            session = %session.id(),
            questions = session.total(),
            timed = session.timing().is_some(),
            "assessment opened"
        );
        self.deadline = session.timing().map(DeadlineWatch::new);
        self.shell.set_leave_guard(true);
        self.session.insert(session)
    }

    /// Buffer an answer and write it through to the cache.
    ///
    /// # Errors
    ///
    /// - `TimeUp` once the deadline has fired; only a submit is left.
    /// - `Session` when the session is closed, the question is unknown, or a
    ///   choice arrives while a non-MCQ question is shown.
    pub async fn record_answer(
        &mut self,
        question: QuestionId,
        value: AnswerValue,
    ) -> Result<(), AssessmentError> {
        let session = self.session.as_mut().ok_or(AssessmentError::NotStarted)?;
        if self.deadline.as_ref().is_some_and(DeadlineWatch::has_fired) {
            return Err(AssessmentError::TimeUp);
        }
        session.record_answer(question, value)?;
        let scope = scope_of(session);
        if let Err(err) = self.cache.put(&scope, ANSWERS_KEY, session.answers()).await {
            warn!(%scope, error = %err, "could not cache answers");
        }
        Ok(())
    }

    /// Answer whatever question is currently shown.
    ///
    /// # Errors
    ///
    /// See [`AssessmentController::record_answer`].
    pub async fn answer_current(&mut self, value: AnswerValue) -> Result<(), AssessmentError> {
        let question = self
            .session
            .as_ref()
            .and_then(AssessmentSession::current_question)
            .map(Question::id)
            .ok_or(AssessmentError::NotStarted)?;
        self.record_answer(question, value).await
    }

    /// Send the current question's answer to the remote, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `Gateway` when the save fails; the answer stays buffered locally.
    pub async fn save_answer(&self) -> Result<(), AssessmentError> {
        let session = self.session.as_ref().ok_or(AssessmentError::NotStarted)?;
        let Some(question) = session.current_question() else {
            return Ok(());
        };
        let Some(answer) = session.answer_for(question.id()) else {
            return Ok(());
        };

        if let Err(err) = self
            .api
            .save_answer(session.kind(), session.id(), question.id(), answer)
            .await
        {
            warn!(session = %session.id(), question = %question.id(), error = %err, "answer not saved");
            self.shell.notify(Notice::AnswerNotSaved);
            return Err(err.into());
        }
        Ok(())
    }

    /// Move forward, clamped at the last question. Nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` if no session is open.
    pub fn next(&mut self) -> Result<usize, AssessmentError> {
        let session = self.session.as_mut().ok_or(AssessmentError::NotStarted)?;
        Ok(session.next())
    }

    /// # Errors
    ///
    /// Returns `NotStarted` if no session is open.
    pub fn prev(&mut self) -> Result<usize, AssessmentError> {
        let session = self.session.as_mut().ok_or(AssessmentError::NotStarted)?;
        Ok(session.prev())
    }

    /// Submit the buffered answers and route on the remote verdict.
    ///
    /// The local cache is cleared only once the remote accepted the submission.
    ///
    /// # Errors
    ///
    /// - `Session(NoAnswers)` with nothing answered; nothing is sent.
    /// - `MissingAssessmentId` for lesson or course sessions without one.
    /// - `Gateway` if the submit fails; answers stay buffered and cached.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, AssessmentError> {
        let session = self.session.as_ref().ok_or(AssessmentError::NotStarted)?;
        session.ensure_submittable()?;
        let kind = session.kind();
        if kind != AssessmentKind::Test && session.assessment_id().is_none() {
            return Err(AssessmentError::MissingAssessmentId);
        }

        let verdict = match self
            .api
            .submit(Submission {
                kind,
                assessment: session.assessment_id(),
                session: session.id(),
                answers: session.answers(),
            })
            .await
        {
            Ok(verdict) => verdict,
            Err(err) => {
                if let GatewayError::RateLimited { retry_after_secs } = err {
                    self.shell.notify(Notice::RateLimited { retry_after_secs });
                }
                return Err(err.into());
            }
        };

        let course_slug = session.course_slug().cloned();
        info!(%kind, session = %session.id(), ?verdict, "assessment submitted");
        if let Some(session) = self.session.as_mut() {
            session.mark_submitted();
        }
        self.close().await;

        let route = if kind == AssessmentKind::Test {
            self.shell.notify(Notice::TestSubmitted);
            Route::TestsList
        } else {
            self.route_for(&verdict, course_slug).await
        };
        Ok(SubmitOutcome { verdict, route })
    }

    async fn route_for(&self, verdict: &SubmitVerdict, course_slug: Option<CourseSlug>) -> Route {
        match verdict {
            SubmitVerdict::RetryLesson { url } => {
                self.shell.notify(Notice::RetryLesson);
                tokio::time::sleep(self.retry_redirect_delay).await;
                self.parse_or_home(url)
            }
            SubmitVerdict::Lesson { url } => self.parse_or_home(url),
            SubmitVerdict::End => {
                self.shell.notify(Notice::CourseComplete);
                Route::Home
            }
            SubmitVerdict::Recorded => course_slug.map_or(Route::Home, Route::CourseOverview),
        }
    }

    fn parse_or_home(&self, url: &str) -> Route {
        Route::parse(url, &self.base_url).unwrap_or_else(|err| {
            warn!(url, error = %err, "unroutable verdict url");
            Route::Home
        })
    }

    /// Observe the deadline now.
    ///
    /// # Errors
    ///
    /// See [`AssessmentController::tick_at`].
    pub async fn tick(&mut self) -> Result<TimerTick, AssessmentError> {
        let now = self.cache.clock().now();
        self.tick_at(now).await
    }

    /// Observe the deadline at `now`. Expiry is acted on exactly once: buffered
    /// answers are submitted, and a session with none is closed as expired.
    /// If that submit fails the answers stay frozen and cached until
    /// [`AssessmentController::submit`] succeeds.
    ///
    /// # Errors
    ///
    /// Returns whatever the automatic submit returns.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> Result<TimerTick, AssessmentError> {
        let Some(watch) = self.deadline.as_mut() else {
            return Ok(TimerTick::Untimed);
        };
        match watch.observe(now) {
            DeadlineTick::Running(left) => Ok(TimerTick::Running(left)),
            DeadlineTick::Idle => Ok(TimerTick::Idle),
            DeadlineTick::Expired => self.expire().await,
        }
    }

    async fn expire(&mut self) -> Result<TimerTick, AssessmentError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(TimerTick::Idle);
        };
        if !session.is_open() {
            return Ok(TimerTick::Idle);
        }
        if session.answers().is_empty() {
            info!(session = %session.id(), "time is up with nothing answered");
            session.mark_expired();
            self.shell.notify(Notice::TimeUp);
            self.close().await;
            return Ok(TimerTick::Expired);
        }
        info!(session = %session.id(), "time is up; submitting");
        let submitted = self.submit().await;
        if let Err(err) = &submitted {
            warn!(error = %err, "automatic submit failed; waiting for a manual one");
            self.shell.notify(Notice::SubmitPending);
        }
        submitted.map(TimerTick::Submitted)
    }

    /// Leave the session without submitting. Cached answers are kept for a resume.
    pub fn abandon(&mut self) {
        if self.session.take().is_some() {
            self.deadline = None;
            self.shell.set_leave_guard(false);
        }
    }

    async fn close(&mut self) {
        self.deadline = None;
        self.shell.set_leave_guard(false);
        if let Some(session) = self.session.as_ref() {
            let scope = scope_of(session);
            if let Err(err) = self.cache.clear(&scope).await {
                warn!(%scope, error = %err, "could not clear cached session");
            }
        }
    }

    async fn write_through_session(&self, session: &AssessmentSession) {
        let scope = scope_of(session);
        let cached = CachedSession {
            owner: session.owner().clone(),
            assessment_id: session.assessment_id(),
            course_slug: session.course_slug().cloned(),
            questions: session.questions().to_vec(),
            timing: session.timing(),
        };
        if let Err(err) = self.cache.put(&scope, SESSION_KEY, &cached).await {
            warn!(%scope, error = %err, "could not cache session");
        }
    }
}

fn scope_of(session: &AssessmentSession) -> CacheScope {
    CacheScope::assessment(session.kind(), session.id())
}

fn from_payload(
    id: SessionId,
    owner: SessionOwner,
    payload: SessionPayload,
) -> Result<AssessmentSession, AssessmentError> {
    let mut session = AssessmentSession::new(id, owner, payload.questions)?;
    if let Some(assessment_id) = payload.assessment_id {
        session = session.with_assessment(assessment_id, payload.course_slug);
    }
    if let Some(timing) = payload.timing {
        session = session.with_timing(timing);
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StartedTest;
    use crate::api::fake::{FakeApi, Failure};
    use crate::shell::recording::RecordingShell;
    use course_core::model::{McqOption, OptionId, QuestionKind, SessionState, SessionStateError};
    use course_core::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn questions() -> Vec<Question> {
        vec![
            Question::new(
                QuestionId::new(1),
                "Which keyword declares a binding?",
                QuestionKind::MultipleChoice {
                    options: vec![
                        McqOption::new(Some(OptionId::new(10)), "let").correct(),
                        McqOption::new(Some(OptionId::new(11)), "var"),
                    ],
                },
            )
            .unwrap(),
            Question::new(
                QuestionId::new(2),
                "Bindings are immutable by default.",
                QuestionKind::TrueFalse { expected: true },
            )
            .unwrap(),
            Question::new(
                QuestionId::new(3),
                "Ownership moves on ______.",
                QuestionKind::FillInBlank {
                    expected: "assignment".into(),
                },
            )
            .unwrap(),
        ]
    }

    fn lesson_payload() -> SessionPayload {
        SessionPayload {
            assessment_id: Some(AssessmentId::new(5)),
            course_slug: Some(CourseSlug::new("rust-101").unwrap()),
            questions: questions(),
            timing: None,
        }
    }

    struct Harness {
        api: Arc<FakeApi>,
        shell: Arc<RecordingShell>,
        cache: LocalCache,
        controller: AssessmentController,
    }

    fn harness() -> Harness {
        let api = Arc::new(FakeApi::default());
        let shell = Arc::new(RecordingShell::default());
        let cache = LocalCache::new(Arc::new(InMemoryRepository::new()), fixed_clock());
        let controller = AssessmentController::new(
            api.clone(),
            cache.clone(),
            shell.clone(),
            Url::parse("https://learn.test/").unwrap(),
        );
        Harness {
            api,
            shell,
            cache,
            controller,
        }
    }

    fn lesson_target(session: Option<u64>) -> AssessmentTarget {
        AssessmentTarget::Lesson {
            lesson: LessonId::new(3),
            session: session.map(SessionId::new),
        }
    }

    fn test_target() -> AssessmentTarget {
        AssessmentTarget::Test {
            category: CategoryId::new(2),
            difficulty: Difficulty::Normal,
        }
    }

    fn timed_test(api: &FakeApi) {
        api.state().started_test = Some(StartedTest {
            session: SessionId::new(40),
            timing: SessionTiming {
                started_at: fixed_now(),
                duration_minutes: 1,
            },
            questions: questions(),
        });
    }

    #[tokio::test]
    async fn handed_over_session_is_fetched_not_started() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());

        let session = h.controller.start(lesson_target(Some(77))).await.unwrap();

        assert_eq!(session.id(), SessionId::new(77));
        assert_eq!(session.total(), 3);
        assert_eq!(h.api.calls(), vec!["GET sessions/77/lesson/".to_owned()]);
        assert!(h.shell.guard_armed());
    }

    #[tokio::test]
    async fn missing_session_id_starts_one() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        h.api.state().started_session = Some(SessionId::new(8));

        let session = h.controller.start(lesson_target(None)).await.unwrap();

        assert_eq!(session.id(), SessionId::new(8));
        assert_eq!(
            h.api.calls(),
            vec![
                "POST assessments/lessons/3/start/".to_owned(),
                "GET sessions/8/lesson/".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn cached_answers_are_restored_on_start() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        let mut answers = Answers::new();
        answers.insert(QuestionId::new(2), AnswerValue::TrueFalse(false));
        answers.insert(QuestionId::new(99), AnswerValue::TrueFalse(true));
        h.cache
            .put(
                &CacheScope::assessment(AssessmentKind::Lesson, SessionId::new(77)),
                ANSWERS_KEY,
                &answers,
            )
            .await
            .unwrap();

        let session = h.controller.start(lesson_target(Some(77))).await.unwrap();

        assert_eq!(session.answers().len(), 1);
        assert_eq!(
            session.answer_for(QuestionId::new(2)),
            Some(&AnswerValue::TrueFalse(false))
        );
    }

    #[tokio::test]
    async fn choice_on_a_non_mcq_question_is_rejected() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        h.controller.start(lesson_target(Some(77))).await.unwrap();
        h.controller.next().unwrap();

        let err = h
            .controller
            .answer_current(AnswerValue::Choice(OptionId::new(10)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AssessmentError::Session(SessionStateError::ChoiceRejected)
        ));
    }

    #[tokio::test]
    async fn moving_between_questions_never_reaches_the_remote() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        h.controller.start(lesson_target(Some(77))).await.unwrap();
        h.controller
            .answer_current(AnswerValue::Choice(OptionId::new(10)))
            .await
            .unwrap();
        let before = h.api.calls().len();

        assert_eq!(h.controller.next().unwrap(), 1);
        assert_eq!(h.controller.next().unwrap(), 2);
        assert_eq!(h.controller.next().unwrap(), 2);
        assert_eq!(h.controller.prev().unwrap(), 1);

        assert_eq!(h.api.calls().len(), before);
        assert!(h.api.state().saved.is_empty());
        assert_eq!(h.controller.session().unwrap().answers().len(), 1);
    }

    #[tokio::test]
    async fn explicit_save_posts_the_current_answer() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        h.controller.start(lesson_target(Some(77))).await.unwrap();
        h.controller
            .answer_current(AnswerValue::Choice(OptionId::new(10)))
            .await
            .unwrap();

        h.controller.save_answer().await.unwrap();

        assert_eq!(
            h.api.state().saved,
            vec![(QuestionId::new(1), AnswerValue::Choice(OptionId::new(10)))]
        );
        assert!(
            h.api
                .calls()
                .contains(&"POST save-answer lesson 77 1".to_string())
        );

        h.controller.next().unwrap();
        h.controller.save_answer().await.unwrap();
        assert_eq!(h.api.state().saved.len(), 1);
    }

    #[tokio::test]
    async fn failed_save_notifies_but_keeps_the_answer() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        h.api.fail("save_answer", Failure::RateLimited(5));
        h.controller.start(lesson_target(Some(77))).await.unwrap();
        h.controller
            .answer_current(AnswerValue::Choice(OptionId::new(11)))
            .await
            .unwrap();

        assert!(matches!(
            h.controller.save_answer().await,
            Err(AssessmentError::Gateway(_))
        ));
        assert_eq!(h.shell.notices(), vec![Notice::AnswerNotSaved]);
        assert_eq!(h.controller.session().unwrap().answers().len(), 1);
    }

    #[tokio::test]
    async fn submit_without_answers_never_reaches_the_remote() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        h.controller.start(lesson_target(Some(77))).await.unwrap();

        let err = h.controller.submit().await.unwrap_err();

        assert!(matches!(
            err,
            AssessmentError::Session(SessionStateError::NoAnswers)
        ));
        assert!(!h.api.calls().iter().any(|c| c.starts_with("POST submit")));
    }

    #[tokio::test]
    async fn submit_needs_an_assessment_id_outside_tests() {
        let mut h = harness();
        h.api.state().payload = Some(SessionPayload {
            assessment_id: None,
            ..lesson_payload()
        });
        h.controller.start(lesson_target(Some(77))).await.unwrap();
        h.controller
            .answer_current(AnswerValue::Choice(OptionId::new(10)))
            .await
            .unwrap();

        assert!(matches!(
            h.controller.submit().await,
            Err(AssessmentError::MissingAssessmentId)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_verdict_waits_then_routes_back_to_the_lesson() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        h.api.state().verdict = Some(SubmitVerdict::RetryLesson {
            url: "/courses/rust-101/lessons/3".into(),
        });
        h.controller.start(lesson_target(Some(77))).await.unwrap();
        h.controller
            .answer_current(AnswerValue::Choice(OptionId::new(11)))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let outcome = h.controller.submit().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(
            outcome.route,
            Route::Lesson {
                course: CourseSlug::new("rust-101").unwrap(),
                lesson: LessonId::new(3),
            }
        );
        assert_eq!(h.shell.notices(), vec![Notice::RetryLesson]);
        assert!(!h.shell.guard_armed());
        assert_eq!(
            h.controller.session().unwrap().state(),
            SessionState::Submitted
        );
        let scope = CacheScope::assessment(AssessmentKind::Lesson, SessionId::new(77));
        assert!(
            h.cache
                .get::<Answers>(&scope, ANSWERS_KEY)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn failed_submit_keeps_everything_cached() {
        let mut h = harness();
        h.api.state().payload = Some(lesson_payload());
        h.api.fail("submit", Failure::RateLimited(30));
        h.controller.start(lesson_target(Some(77))).await.unwrap();
        h.controller
            .answer_current(AnswerValue::Choice(OptionId::new(10)))
            .await
            .unwrap();

        assert!(h.controller.submit().await.is_err());

        assert!(h.controller.session().unwrap().is_open());
        assert!(h.shell.guard_armed());
        assert_eq!(
            h.shell.notices(),
            vec![Notice::RateLimited {
                retry_after_secs: 30
            }]
        );
        let scope = CacheScope::assessment(AssessmentKind::Lesson, SessionId::new(77));
        let cached = h.cache.get::<Answers>(&scope, ANSWERS_KEY).await.unwrap();
        assert_eq!(cached.unwrap().value.len(), 1);
    }

    #[tokio::test]
    async fn deadline_submits_buffered_answers_exactly_once() {
        let mut h = harness();
        timed_test(&h.api);
        h.controller.start(test_target()).await.unwrap();
        h.controller
            .record_answer(QuestionId::new(2), AnswerValue::TrueFalse(true))
            .await
            .unwrap();

        let half = fixed_now() + chrono::Duration::seconds(30);
        assert_eq!(
            h.controller.tick_at(half).await.unwrap(),
            TimerTick::Running(chrono::Duration::seconds(30))
        );

        let late = fixed_now() + chrono::Duration::seconds(61);
        let tick = h.controller.tick_at(late).await.unwrap();
        assert_eq!(
            tick,
            TimerTick::Submitted(SubmitOutcome {
                verdict: SubmitVerdict::Recorded,
                route: Route::TestsList,
            })
        );
        assert_eq!(h.api.state().submitted.len(), 1);
        assert_eq!(
            h.controller.tick_at(late).await.unwrap(),
            TimerTick::Untimed
        );
    }

    #[tokio::test]
    async fn deadline_with_nothing_answered_expires_without_submitting() {
        let mut h = harness();
        timed_test(&h.api);
        h.controller.start(test_target()).await.unwrap();

        let late = fixed_now() + chrono::Duration::minutes(2);
        assert_eq!(h.controller.tick_at(late).await.unwrap(), TimerTick::Expired);

        assert!(h.api.state().submitted.is_empty());
        assert_eq!(
            h.controller.session().unwrap().state(),
            SessionState::Expired
        );
        assert_eq!(h.shell.notices(), vec![Notice::TimeUp]);
        assert!(!h.shell.guard_armed());
    }

    #[tokio::test]
    async fn failed_auto_submit_freezes_answers_until_a_manual_submit() {
        let mut h = harness();
        timed_test(&h.api);
        h.api.fail("submit", Failure::RateLimited(10));
        h.controller.start(test_target()).await.unwrap();
        h.controller
            .record_answer(QuestionId::new(2), AnswerValue::TrueFalse(true))
            .await
            .unwrap();

        let late = fixed_now() + chrono::Duration::seconds(61);
        assert!(h.controller.tick_at(late).await.is_err());
        assert_eq!(h.controller.tick_at(late).await.unwrap(), TimerTick::Idle);
        assert_eq!(
            h.shell.notices(),
            vec![
                Notice::RateLimited {
                    retry_after_secs: 10
                },
                Notice::SubmitPending,
            ]
        );

        let err = h
            .controller
            .record_answer(QuestionId::new(3), AnswerValue::Text("assignment".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AssessmentError::TimeUp));
        assert_eq!(h.controller.session().unwrap().answers().len(), 1);
        assert!(h.shell.guard_armed());

        h.api.clear_failure("submit");
        let outcome = h.controller.submit().await.unwrap();
        assert_eq!(outcome.route, Route::TestsList);
        assert_eq!(h.api.state().submitted.len(), 1);
        assert!(!h.shell.guard_armed());
    }

    #[tokio::test]
    async fn reload_resumes_a_test_from_the_cache() {
        let mut h = harness();
        timed_test(&h.api);
        h.controller.start(test_target()).await.unwrap();
        h.controller
            .answer_current(AnswerValue::Choice(OptionId::new(11)))
            .await
            .unwrap();
        h.controller.abandon();
        assert!(!h.shell.guard_armed());

        let mut reloaded = AssessmentController::new(
            h.api.clone(),
            h.cache.clone(),
            h.shell.clone(),
            Url::parse("https://learn.test/").unwrap(),
        );
        let session = reloaded.resume_test(SessionId::new(40)).await.unwrap();

        assert_eq!(session.total(), 3);
        assert_eq!(
            session.answer_for(QuestionId::new(1)),
            Some(&AnswerValue::Choice(OptionId::new(11)))
        );
        assert_eq!(session.owner(), &SessionOwner::Test(CategoryId::new(2)));
        assert!(session.timing().is_some());
        assert!(reloaded.current_question(2).is_some());
        assert!(reloaded.current_question(3).is_none());

        assert!(matches!(
            reloaded.resume(AssessmentKind::Test, SessionId::new(41)).await,
            Err(AssessmentError::NothingCached)
        ));
    }
}
