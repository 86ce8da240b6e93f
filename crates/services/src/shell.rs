//! Hooks into whatever hosts the controllers: a terminal, a window, a test.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// User-facing notices raised by the controllers. Wording belongs to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The remote refused to show a lesson.
    NoLessonAccess,
    /// Requests are paused until the cooldown ends.
    RateLimited { retry_after_secs: u64 },
    /// Assessment failed; the learner is sent back to the lesson.
    RetryLesson,
    CourseComplete,
    TestSubmitted,
    /// The timer ran out with nothing answered.
    TimeUp,
    /// An answer could not be saved remotely; it is still kept locally.
    AnswerNotSaved,
    /// The timer ran out but the automatic submit failed; answers are frozen
    /// until a manual submit goes through.
    SubmitPending,
}

/// Host environment seen by the controllers.
pub trait Shell: Send + Sync {
    fn notify(&self, notice: Notice);

    /// Arm or disarm the "leave this page?" confirmation.
    fn set_leave_guard(&self, armed: bool);
}

/// Shell that only logs. Useful for headless runs.
#[derive(Debug, Default)]
pub struct LogShell {
    guard: AtomicBool,
}

impl LogShell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn leave_guard_armed(&self) -> bool {
        self.guard.load(Ordering::Relaxed)
    }
}

impl Shell for LogShell {
    fn notify(&self, notice: Notice) {
        info!(?notice, "notice");
    }

    fn set_leave_guard(&self, armed: bool) {
        self.guard.store(armed, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::{Notice, Shell};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingShell {
        pub notices: Mutex<Vec<Notice>>,
        pub guard: Mutex<Vec<bool>>,
    }

    impl RecordingShell {
        pub fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }

        pub fn guard_armed(&self) -> bool {
            self.guard.lock().unwrap().last().copied().unwrap_or(false)
        }
    }

    impl Shell for RecordingShell {
        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }

        fn set_leave_guard(&self, armed: bool) {
            self.guard.lock().unwrap().push(armed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_shell_tracks_the_leave_guard() {
        let shell = LogShell::new();
        assert!(!shell.leave_guard_armed());
        shell.set_leave_guard(true);
        assert!(shell.leave_guard_armed());
        shell.notify(Notice::TimeUp);
        shell.set_leave_guard(false);
        assert!(!shell.leave_guard_armed());
    }
}
