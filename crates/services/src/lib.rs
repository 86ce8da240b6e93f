#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod assessment;
pub mod cache;
pub mod config;
pub mod drafts;
pub mod error;
pub mod gateway;
pub mod media_progress;
pub mod progression;
pub mod rate_limit;
pub mod shell;
pub mod tasks;

pub use course_core::Clock;

pub use api::{
    CourseApi, CourseSnapshot, Difficulty, HttpCourseApi, NextStep, ProgressSummary,
    SessionPayload, StartedTest, SubmitVerdict, Submission, Tally,
};
pub use app_services::AppServices;
pub use assessment::{AssessmentController, AssessmentTarget, SubmitOutcome, TimerTick};
pub use cache::{Cached, LocalCache};
pub use config::ClientConfig;
pub use drafts::{DraftResolution, DraftService, LocalDraft};
pub use error::{
    AppServicesError, AssessmentError, CacheError, ConfigError, DraftError, GatewayError,
    MediaProgressError, ProgressionError,
};
pub use gateway::{Credentials, Gateway};
pub use media_progress::{MediaProgressTracker, PlaybackPosition};
pub use progression::{LessonOpen, ProgressionController, ProgressionState};
pub use rate_limit::{RateLimitBreaker, ThrottleSignal};
pub use shell::{LogShell, Notice, Shell};
pub use tasks::ScopedTask;
