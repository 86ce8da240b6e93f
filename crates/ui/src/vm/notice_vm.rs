use course_core::model::RateLimitState;
use services::Notice;

use crate::vm::time_fmt::format_cooldown;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeTone {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoticeVm {
    pub tone: NoticeTone,
    pub text: String,
}

impl NoticeVm {
    fn new(tone: NoticeTone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

impl From<&Notice> for NoticeVm {
    fn from(notice: &Notice) -> Self {
        match notice {
            Notice::NoLessonAccess => Self::new(
                NoticeTone::Error,
                "You don't have access to this lesson yet.",
            ),
            Notice::RateLimited { retry_after_secs } => Self::new(
                NoticeTone::Warning,
                format!(
                    "Too many requests. Try again in {}.",
                    format_cooldown(*retry_after_secs)
                ),
            ),
            Notice::RetryLesson => Self::new(
                NoticeTone::Warning,
                "Not quite. Review the lesson and try the assessment again.",
            ),
            Notice::CourseComplete => {
                Self::new(NoticeTone::Success, "Course complete. Well done!")
            }
            Notice::TestSubmitted => Self::new(NoticeTone::Success, "Test submitted."),
            Notice::TimeUp => Self::new(
                NoticeTone::Error,
                "Time is up. No answers were recorded.",
            ),
            Notice::AnswerNotSaved => Self::new(
                NoticeTone::Warning,
                "Your answer could not be saved. It is kept on this device.",
            ),
            Notice::SubmitPending => Self::new(
                NoticeTone::Error,
                "Time is up but your answers were not submitted. Submit again to finish.",
            ),
        }
    }
}

/// Banner text while requests are paused; `None` once the cooldown ends.
#[must_use]
pub fn rate_limit_banner(state: RateLimitState) -> Option<String> {
    state.is_limited().then(|| {
        format!(
            "Requests paused. Resuming in {}.",
            format_cooldown(state.cooldown())
        )
    })
}
