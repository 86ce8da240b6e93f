//! Scripted `CourseApi` for controller tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use course_core::model::{
    AnswerValue, Answers, AssessmentKind, CategoryId, CourseSlug, EnrollmentProgress,
    LessonContent, LessonId, LessonKind, QuestionId, SessionId,
};

use super::{
    CourseApi, CourseSnapshot, Difficulty, NextStep, ProgressSummary, SessionPayload, StartedTest,
    SubmitVerdict, Submission,
};
use crate::error::GatewayError;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    RateLimited(u64),
    Forbidden,
    NotFound,
}

impl Failure {
    fn to_error(self) -> GatewayError {
        match self {
            Self::RateLimited(retry_after_secs) => GatewayError::RateLimited { retry_after_secs },
            Self::Forbidden => GatewayError::Forbidden,
            Self::NotFound => GatewayError::NotFound,
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub calls: Vec<String>,
    pub snapshot: Option<CourseSnapshot>,
    pub lessons: HashMap<LessonId, LessonContent>,
    pub forbidden: HashSet<LessonId>,
    pub next_step: Option<NextStep>,
    pub started_session: Option<SessionId>,
    pub payload: Option<SessionPayload>,
    pub started_test: Option<StartedTest>,
    pub verdict: Option<SubmitVerdict>,
    pub playback: u64,
    pub failures: HashMap<&'static str, Failure>,
    pub submitted: Vec<Answers>,
    pub saved: Vec<(QuestionId, AnswerValue)>,
    pub progress_updates: Vec<(LessonId, u64)>,
    pub published: Vec<(LessonId, String)>,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn fail(&self, op: &'static str, failure: Failure) {
        self.state().failures.insert(op, failure);
    }

    pub fn clear_failure(&self, op: &'static str) {
        self.state().failures.remove(op);
    }

    fn record(&self, op: &'static str, line: String) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.calls.push(line);
        match state.failures.get(op) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CourseApi for FakeApi {
    async fn course(&self, slug: &CourseSlug) -> Result<CourseSnapshot, GatewayError> {
        self.record("course", format!("GET courses/{slug}/"))?;
        self.state().snapshot.clone().ok_or(GatewayError::NotFound)
    }

    async fn enrolled_courses(&self) -> Result<Vec<EnrollmentProgress>, GatewayError> {
        self.record("enrolled_courses", "GET enrollments/my/".into())?;
        Ok(self
            .state()
            .snapshot
            .iter()
            .map(|s| s.progress.clone())
            .collect())
    }

    async fn progress_summary(&self) -> Result<ProgressSummary, GatewayError> {
        self.record("progress_summary", "GET courses/progress/summary/".into())?;
        Ok(ProgressSummary::default())
    }

    async fn lesson(&self, lesson: LessonId) -> Result<LessonContent, GatewayError> {
        self.record("lesson", format!("GET lessons/{lesson}/"))?;
        let state = self.state();
        if state.forbidden.contains(&lesson) {
            return Err(GatewayError::Forbidden);
        }
        Ok(state.lessons.get(&lesson).cloned().unwrap_or(LessonContent {
            id: lesson,
            title: format!("Lesson {lesson}"),
            kind: LessonKind::Article,
            body: None,
            draft_content: None,
            updated_at: None,
        }))
    }

    async fn complete_lesson(&self, lesson: LessonId) -> Result<(), GatewayError> {
        self.record("complete_lesson", format!("PATCH lessons/{lesson}/complete/"))
    }

    async fn lesson_accessed(&self, lesson: LessonId) -> Result<(), GatewayError> {
        self.record("lesson_accessed", format!("POST lessons/{lesson}/accessed/"))
    }

    async fn next_step(&self, slug: &CourseSlug, current: LessonId) -> Result<NextStep, GatewayError> {
        self.record(
            "next_step",
            format!("GET courses/{slug}/next-step/?current_lesson={current}"),
        )?;
        Ok(self.state().next_step.clone().unwrap_or(NextStep::End))
    }

    async fn start_lesson_assessment(&self, lesson: LessonId) -> Result<SessionId, GatewayError> {
        self.record(
            "start_lesson_assessment",
            format!("POST assessments/lessons/{lesson}/start/"),
        )?;
        Ok(self.state().started_session.unwrap_or(SessionId::new(1)))
    }

    async fn start_course_assessment(&self, slug: &CourseSlug) -> Result<SessionId, GatewayError> {
        self.record(
            "start_course_assessment",
            format!("POST assessments/courses/{slug}/start/"),
        )?;
        Ok(self.state().started_session.unwrap_or(SessionId::new(1)))
    }

    async fn start_test(
        &self,
        category: CategoryId,
        difficulty: Difficulty,
    ) -> Result<StartedTest, GatewayError> {
        self.record(
            "start_test",
            format!("POST assessments/{category}/test/start/ {difficulty}"),
        )?;
        self.state().started_test.clone().ok_or(GatewayError::NotFound)
    }

    async fn session(
        &self,
        kind: AssessmentKind,
        session: SessionId,
    ) -> Result<SessionPayload, GatewayError> {
        self.record("session", format!("GET sessions/{session}/{kind}/"))?;
        self.state().payload.clone().ok_or(GatewayError::NotFound)
    }

    async fn save_answer(
        &self,
        kind: AssessmentKind,
        session: SessionId,
        question: QuestionId,
        answer: &AnswerValue,
    ) -> Result<(), GatewayError> {
        self.record(
            "save_answer",
            format!("POST save-answer {kind} {session} {question}"),
        )?;
        self.state().saved.push((question, answer.clone()));
        Ok(())
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<SubmitVerdict, GatewayError> {
        self.record(
            "submit",
            format!("POST submit {} {}", submission.kind, submission.session),
        )?;
        let mut state = self.state();
        state.submitted.push(submission.answers.clone());
        Ok(state.verdict.clone().unwrap_or(SubmitVerdict::Recorded))
    }

    async fn lesson_progress(&self, lesson: LessonId) -> Result<u64, GatewayError> {
        self.record("lesson_progress", format!("GET lessons/{lesson}/progress/"))?;
        Ok(self.state().playback)
    }

    async fn update_lesson_progress(
        &self,
        lesson: LessonId,
        current_time: u64,
    ) -> Result<(), GatewayError> {
        self.record(
            "update_lesson_progress",
            format!("POST lessons/{lesson}/progress/update/ {current_time}"),
        )?;
        self.state().progress_updates.push((lesson, current_time));
        Ok(())
    }

    async fn publish_draft(&self, lesson: LessonId, content: &str) -> Result<(), GatewayError> {
        self.record("publish_draft", format!("PATCH lessons/{lesson}/"))?;
        self.state().published.push((lesson, content.to_owned()));
        Ok(())
    }
}
