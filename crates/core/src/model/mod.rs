mod answer;
mod assessment;
mod course;
mod ids;
mod lesson;
mod progress;
mod question;
mod rate_limit;
mod route;

pub use ids::{
    AssessmentId, CategoryId, CourseId, LessonId, ModuleId, OptionId, ParseIdError, QuestionId,
    SessionId,
};

pub use answer::{AnswerValue, Answers, WireAnswer, WireAnswers};
pub use assessment::{
    AssessmentKind, AssessmentSession, DeadlineTick, DeadlineWatch, INFORMATIONAL_PASS_PERCENT,
    SessionOwner, SessionState, SessionStateError, SessionTiming,
};
pub use course::{Course, CourseError, CourseSlug, LessonResolution, Module, resolve_current};
pub use lesson::{Lesson, LessonBody, LessonContent, LessonError, LessonKind};
pub use progress::EnrollmentProgress;
pub use question::{
    BLANK_MARKER, BlankPrompt, McqOption, Question, QuestionError, QuestionKind, QuestionType,
    split_blank,
};
pub use rate_limit::RateLimitState;
pub use route::{Route, RouteError};
