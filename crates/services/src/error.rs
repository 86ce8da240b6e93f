//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{
    CourseError, LessonError, LessonId, QuestionError, RouteError, SessionStateError,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while reading `ClientConfig` from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("COURSE_API_BASE_URL is not set")]
    MissingBaseUrl,
    #[error("invalid base url {value:?}: {reason}")]
    InvalidBaseUrl { value: String, reason: String },
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },
}

/// Errors emitted by the HTTP `Gateway`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Throttled remotely, or refused locally while the breaker is cooling down.
    #[error("too many requests; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    /// The credential was rejected and could not be refreshed.
    #[error("session expired; please sign in again")]
    ReauthenticationRequired,
    #[error("access denied")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("request failed with status {status}{}", detail_suffix(.message))]
    Status {
        status: reqwest::StatusCode,
        message: Option<String>,
    },
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

fn detail_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl GatewayError {
    /// Network-level failures the learner can simply retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// Errors emitted by the local cache wrapper.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("cached value is unreadable: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors emitted by `ProgressionController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("course is not loaded")]
    NotLoaded,
    #[error("no lesson is open")]
    NoCurrentLesson,
    #[error("lesson {0} is not part of this course")]
    UnknownLesson(LessonId),
    #[error("another step is already in progress")]
    Busy,
    #[error("control has passed to an assessment or the course is finished")]
    HandedOff,
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors emitted by `AssessmentController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("no assessment session is open")]
    NotStarted,
    #[error("session has no assessment id to submit against")]
    MissingAssessmentId,
    #[error("nothing cached for this session")]
    NothingCached,
    #[error("time is up; submit to finish")]
    TimeUp,
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors emitted by `MediaProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MediaProgressError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors emitted by `DraftService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DraftError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_is_appended_when_present() {
        let err = GatewayError::Status {
            status: reqwest::StatusCode::BAD_REQUEST,
            message: Some("lesson_id is required".into()),
        };
        assert_eq!(
            err.to_string(),
            "request failed with status 400 Bad Request: lesson_id is required"
        );
        let bare = GatewayError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            message: None,
        };
        assert_eq!(bare.to_string(), "request failed with status 502 Bad Gateway");
        assert!(bare.is_transient());
    }
}
