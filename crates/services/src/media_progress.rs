use std::sync::Arc;
use std::time::Duration;

use course_core::model::LessonId;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::api::CourseApi;
use crate::config::DEFAULT_CHECKPOINT_SECS;
use crate::error::MediaProgressError;
use crate::tasks::ScopedTask;

/// Reads the player's current position in seconds.
pub trait PlaybackPosition: Send + Sync {
    fn position(&self) -> f64;
}

impl<F> PlaybackPosition for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn position(&self) -> f64 {
        self()
    }
}

/// Restores and checkpoints video playback positions.
#[derive(Clone)]
pub struct MediaProgressTracker {
    api: Arc<dyn CourseApi>,
    interval: Duration,
}

impl MediaProgressTracker {
    #[must_use]
    pub fn new(api: Arc<dyn CourseApi>) -> Self {
        Self {
            api,
            interval: Duration::from_secs(DEFAULT_CHECKPOINT_SECS),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Saved position to seek to, if any.
    ///
    /// # Errors
    ///
    /// Returns `MediaProgressError::Gateway` if the lookup fails.
    pub async fn restore(&self, lesson: LessonId) -> Result<Option<u64>, MediaProgressError> {
        let seconds = self.api.lesson_progress(lesson).await?;
        Ok((seconds > 0).then_some(seconds))
    }

    /// Post the position every interval until the guard is dropped.
    ///
    /// Posts are best effort: failures are logged and the next tick tries again.
    pub fn start_checkpoints(
        &self,
        lesson: LessonId,
        source: Arc<dyn PlaybackPosition>,
    ) -> ScopedTask {
        let api = Arc::clone(&self.api);
        let period = self.interval;
        ScopedTask::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(seconds) = whole_seconds(source.position()) else {
                    continue;
                };
                if let Err(err) = api.update_lesson_progress(lesson, seconds).await {
                    debug!(lesson = %lesson, seconds, error = %err, "checkpoint not saved");
                }
            }
        })
    }
}

fn whole_seconds(position: f64) -> Option<u64> {
    if !position.is_finite() || position < 1.0 {
        return None;
    }
    // Finite and >= 1, so the cast cannot wrap.
    Some(position.floor() as u64)
}
