//! Typed view of the course service's JSON endpoints.

use async_trait::async_trait;
use course_core::model::{
    AnswerValue, Answers, AssessmentId, AssessmentKind, CategoryId, Course, CourseSlug,
    EnrollmentProgress, LessonContent, LessonId, Question, QuestionId, SessionId, SessionTiming,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GatewayError;

mod dto;
mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpCourseApi;

/// Course outline together with the learner's progress in it.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseSnapshot {
    pub course: Course,
    pub progress: EnrollmentProgress,
}

/// What the remote says comes after the current lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Lesson { url: String },
    Assessment { url: String },
    End,
}

/// Routing verdict returned when an assessment is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitVerdict {
    /// Below the pass mark: review the lesson, then retake.
    RetryLesson { url: String },
    /// Passed: continue with the indicated lesson.
    Lesson { url: String },
    /// Course finished.
    End,
    /// Standalone test recorded; no routing hint.
    Recorded,
}

/// Question set and metadata of an existing session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPayload {
    pub assessment_id: Option<AssessmentId>,
    pub course_slug: Option<CourseSlug>,
    pub questions: Vec<Question>,
    pub timing: Option<SessionTiming>,
}

/// A freshly started standalone test.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedTest {
    pub session: SessionId,
    pub timing: SessionTiming,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "EASY",
            Self::Normal => "NORMAL",
            Self::Hard => "HARD",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EASY" => Ok(Self::Easy),
            "NORMAL" => Ok(Self::Normal),
            "HARD" => Ok(Self::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Everything needed to submit a session.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub kind: AssessmentKind,
    pub assessment: Option<AssessmentId>,
    pub session: SessionId,
    pub answers: &'a Answers,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Tally {
    pub total: u32,
    pub completed: u32,
}

/// Totals across every enrolled course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressSummary {
    pub lessons: Tally,
    pub modules: Tally,
    pub courses: Tally,
}

/// Remote operations used by the controllers.
///
/// Every call goes through the gateway, so every call may fail with
/// `RateLimited` or `ReauthenticationRequired`.
#[async_trait]
pub trait CourseApi: Send + Sync {
    /// `GET courses/{slug}/`
    async fn course(&self, slug: &CourseSlug) -> Result<CourseSnapshot, GatewayError>;

    /// `GET enrollments/my/`
    async fn enrolled_courses(&self) -> Result<Vec<EnrollmentProgress>, GatewayError>;

    /// `GET courses/progress/summary/`
    async fn progress_summary(&self) -> Result<ProgressSummary, GatewayError>;

    /// `GET lessons/{id}/`
    async fn lesson(&self, lesson: LessonId) -> Result<LessonContent, GatewayError>;

    /// `PATCH lessons/{id}/complete/`
    async fn complete_lesson(&self, lesson: LessonId) -> Result<(), GatewayError>;

    /// `POST lessons/{id}/accessed/`
    async fn lesson_accessed(&self, lesson: LessonId) -> Result<(), GatewayError>;

    /// `GET courses/{slug}/next-step/?current_lesson={id}`
    async fn next_step(&self, slug: &CourseSlug, current: LessonId) -> Result<NextStep, GatewayError>;

    /// `POST assessments/lessons/{id}/start/`
    async fn start_lesson_assessment(&self, lesson: LessonId) -> Result<SessionId, GatewayError>;

    /// `POST assessments/courses/{slug}/start/`
    async fn start_course_assessment(&self, slug: &CourseSlug) -> Result<SessionId, GatewayError>;

    /// `POST assessments/{category}/test/start/`
    async fn start_test(
        &self,
        category: CategoryId,
        difficulty: Difficulty,
    ) -> Result<StartedTest, GatewayError>;

    /// `GET sessions/{id}/{kind}/`
    async fn session(
        &self,
        kind: AssessmentKind,
        session: SessionId,
    ) -> Result<SessionPayload, GatewayError>;

    /// `POST assessments/{session}/save-answer/` for tests,
    /// `POST assessments/lesson/{session}/save-answer/` otherwise.
    async fn save_answer(
        &self,
        kind: AssessmentKind,
        session: SessionId,
        question: QuestionId,
        answer: &AnswerValue,
    ) -> Result<(), GatewayError>;

    /// `POST assessments/{kind}/{assessment}/submit/{session}/`, or
    /// `POST assessments/{session}/test/submit/` for tests.
    async fn submit(&self, submission: Submission<'_>) -> Result<SubmitVerdict, GatewayError>;

    /// `GET lessons/{id}/progress/`: last saved playback position in seconds.
    async fn lesson_progress(&self, lesson: LessonId) -> Result<u64, GatewayError>;

    /// `POST lessons/{id}/progress/update/`
    async fn update_lesson_progress(
        &self,
        lesson: LessonId,
        current_time: u64,
    ) -> Result<(), GatewayError>;

    /// `PATCH lessons/{id}/` with `{draft_content}`
    async fn publish_draft(&self, lesson: LessonId, content: &str) -> Result<(), GatewayError>;
}
