use std::sync::Arc;
use std::time::Duration;

use course_core::model::RateLimitState;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::tasks::ScopedTask;

/// Sink for throttle signals detected inside the request pipeline.
///
/// The gateway only sees this trait, never the breaker or its subscribers.
pub trait ThrottleSignal: Send + Sync {
    /// The remote asked us to back off for `retry_after_secs`.
    fn throttled(&self, retry_after_secs: u64);

    /// Remaining cooldown while limited, `None` otherwise.
    fn cooling_down(&self) -> Option<u64>;
}

/// Process-wide client-side circuit breaker for remote throttling.
///
/// Construct once and share through `Arc`.
#[derive(Debug)]
pub struct RateLimitBreaker {
    state: watch::Sender<RateLimitState>,
}

impl Default for RateLimitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitBreaker {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(RateLimitState::default());
        Self { state }
    }

    #[must_use]
    pub fn state(&self) -> RateLimitState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.state.borrow().is_limited()
    }

    /// Single subscription point for countdown displays.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RateLimitState> {
        self.state.subscribe()
    }

    pub fn trip(&self, seconds: u64) {
        self.state.send_if_modified(|state| {
            let before = *state;
            state.trip(seconds);
            *state != before
        });
        info!(cooldown = self.state().cooldown(), "rate limit tripped");
    }

    /// One-second step; clears the breaker on the final step.
    pub fn tick(&self) -> u64 {
        self.state.send_if_modified(|state| {
            if !state.is_limited() {
                return false;
            }
            state.tick();
            true
        });
        let cooldown = self.state().cooldown();
        if cooldown == 0 {
            debug!("rate limit cooldown elapsed");
        }
        cooldown
    }

    pub fn reset(&self) {
        self.state.send_if_modified(|state| {
            let was_limited = state.is_limited();
            state.reset();
            was_limited
        });
    }

    /// Drive [`RateLimitBreaker::tick`] once per second until the guard drops.
    pub fn spawn_ticker(self: &Arc<Self>) -> ScopedTask {
        let breaker = Arc::clone(self);
        ScopedTask::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                if breaker.is_limited() {
                    breaker.tick();
                }
            }
        })
    }
}

impl ThrottleSignal for RateLimitBreaker {
    fn throttled(&self, retry_after_secs: u64) {
        self.trip(retry_after_secs);
    }

    fn cooling_down(&self) -> Option<u64> {
        let state = self.state();
        state.is_limited().then_some(state.cooldown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_ticks_clear_the_breaker() {
        let breaker = RateLimitBreaker::new();
        breaker.trip(3);
        assert_eq!(breaker.cooling_down(), Some(3));
        assert_eq!(breaker.tick(), 2);
        assert_eq!(breaker.tick(), 1);
        assert_eq!(breaker.tick(), 0);
        assert_eq!(breaker.cooling_down(), None);
        assert!(!breaker.is_limited());
    }

    #[tokio::test]
    async fn subscribers_see_trips_and_resets() {
        let breaker = RateLimitBreaker::new();
        let mut rx = breaker.subscribe();
        breaker.trip(10);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().cooldown(), 10);
        breaker.reset();
        rx.changed().await.unwrap();
        assert!(!rx.borrow().is_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_counts_down_to_zero() {
        let breaker = Arc::new(RateLimitBreaker::new());
        let _ticker = breaker.spawn_ticker();
        breaker.trip(30);

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(breaker.state().cooldown(), 20);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(!breaker.is_limited());
        assert_eq!(breaker.state().cooldown(), 0);
    }
}
