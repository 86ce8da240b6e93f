use services::{AssessmentError, DraftError, GatewayError, ProgressionError};

/// Failure categories a screen can show without leaking transport detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewError {
    SignedOut,
    RateLimited { retry_after_secs: u64 },
    NoAccess,
    NotFound,
    Offline,
    Unknown,
}

impl ViewError {
    #[must_use]
    pub fn from_gateway(err: &GatewayError) -> Self {
        match err {
            GatewayError::ReauthenticationRequired => Self::SignedOut,
            GatewayError::RateLimited { retry_after_secs } => Self::RateLimited {
                retry_after_secs: *retry_after_secs,
            },
            GatewayError::Forbidden => Self::NoAccess,
            GatewayError::NotFound => Self::NotFound,
            err if err.is_transient() => Self::Offline,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn message(self) -> String {
        match self {
            Self::SignedOut => "Your session has expired. Please sign in again.".to_owned(),
            Self::RateLimited { retry_after_secs } => {
                format!("Too many requests. Try again in {retry_after_secs}s.")
            }
            Self::NoAccess => "You don't have access to this page.".to_owned(),
            Self::NotFound => "That page doesn't exist.".to_owned(),
            Self::Offline => "Couldn't reach the server. Check your connection.".to_owned(),
            Self::Unknown => "Something went wrong. Please try again.".to_owned(),
        }
    }
}

impl From<&ProgressionError> for ViewError {
    fn from(err: &ProgressionError) -> Self {
        match err {
            ProgressionError::Gateway(err) => Self::from_gateway(err),
            ProgressionError::UnknownLesson(_) => Self::NotFound,
            _ => Self::Unknown,
        }
    }
}

impl From<&AssessmentError> for ViewError {
    fn from(err: &AssessmentError) -> Self {
        match err {
            AssessmentError::Gateway(err) => Self::from_gateway(err),
            AssessmentError::NothingCached => Self::NotFound,
            _ => Self::Unknown,
        }
    }
}

impl From<&DraftError> for ViewError {
    fn from(err: &DraftError) -> Self {
        match err {
            DraftError::Gateway(err) => Self::from_gateway(err),
            _ => Self::Unknown,
        }
    }
}
