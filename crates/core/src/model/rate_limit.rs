use serde::{Deserialize, Serialize};

/// Client-side throttle state.
///
/// `is_limited` is true exactly when `cooldown > 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    is_limited: bool,
    cooldown: u64,
}

impl RateLimitState {
    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.is_limited
    }

    /// Remaining cooldown in whole seconds.
    #[must_use]
    pub fn cooldown(&self) -> u64 {
        self.cooldown
    }

    /// Enter the limited state. While already limited the longer cooldown is kept.
    ///
    /// A zero-second trip is ignored.
    pub fn trip(&mut self, seconds: u64) {
        if seconds == 0 {
            return;
        }
        self.cooldown = if self.is_limited {
            self.cooldown.max(seconds)
        } else {
            seconds
        };
        self.is_limited = true;
    }

    /// One-second step. Returns the cooldown after the step.
    pub fn tick(&mut self) -> u64 {
        if !self.is_limited {
            return 0;
        }
        if self.cooldown <= 1 {
            self.reset();
        } else {
            self.cooldown -= 1;
        }
        self.cooldown
    }

    pub fn reset(&mut self) {
        self.is_limited = false;
        self.cooldown = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_ticks_clear_a_thirty_second_trip() {
        let mut state = RateLimitState::default();
        state.trip(30);
        for expected in (1..30).rev() {
            assert_eq!(state.tick(), expected);
            assert!(state.is_limited());
        }
        assert_eq!(state.tick(), 0);
        assert!(!state.is_limited());
        assert_eq!(state.cooldown(), 0);
    }

    #[test]
    fn never_limited_with_zero_cooldown() {
        let mut state = RateLimitState::default();
        state.trip(2);
        for _ in 0..5 {
            state.tick();
            assert_eq!(state.is_limited(), state.cooldown() > 0);
        }
    }

    #[test]
    fn retrip_keeps_the_longer_cooldown() {
        let mut state = RateLimitState::default();
        state.trip(30);
        state.tick();
        state.trip(10);
        assert_eq!(state.cooldown(), 29);
        state.trip(60);
        assert_eq!(state.cooldown(), 60);
    }

    #[test]
    fn zero_trip_and_idle_tick_are_noops() {
        let mut state = RateLimitState::default();
        state.trip(0);
        assert!(!state.is_limited());
        assert_eq!(state.tick(), 0);
    }
}
