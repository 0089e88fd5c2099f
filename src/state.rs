//! Read models shared between the orchestrator and its observers.

use serde::Serialize;

const TICK_MS: u64 = 1000;

/// Sub-second carry for the one-second display countdowns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SecondTicker {
    carry_ms: u64,
}

impl SecondTicker {
    fn until_next(&self) -> u64 {
        TICK_MS - self.carry_ms
    }

    /// Returns `true` when a whole second boundary was crossed.
    fn elapse(&mut self, ms: u64) -> bool {
        self.carry_ms += ms;
        if self.carry_ms >= TICK_MS {
            self.carry_ms -= TICK_MS;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitState {
    pub active: bool,
    pub seconds_remaining: u64,
    #[serde(skip)]
    ticker: SecondTicker,
}

impl RateLimitState {
    pub fn engage(&mut self, seconds: u64) {
        self.active = true;
        self.seconds_remaining = seconds;
        self.ticker = SecondTicker::default();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn ms_until_tick(&self) -> Option<u64> {
        self.active.then(|| self.ticker.until_next())
    }

    /// Advances the countdown. Returns `true` when the limit was lifted.
    pub(crate) fn elapse(&mut self, ms: u64) -> bool {
        if !self.active || !self.ticker.elapse(ms) {
            return false;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            self.clear();
            return true;
        }
        false
    }
}

/// Display-only countdown armed after a transient failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkErrorState {
    pub active: bool,
    pub seconds_remaining: u64,
    pub initial_seconds: u64,
    #[serde(skip)]
    ticker: SecondTicker,
}

impl NetworkErrorState {
    pub fn arm(&mut self, seconds: u64) {
        self.active = true;
        self.seconds_remaining = seconds;
        self.initial_seconds = seconds;
        self.ticker = SecondTicker::default();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn ms_until_tick(&self) -> Option<u64> {
        (self.active && self.seconds_remaining > 0).then(|| self.ticker.until_next())
    }

    // Stays active at zero; only a success clears the flag.
    pub(crate) fn elapse(&mut self, ms: u64) {
        if self.active && self.seconds_remaining > 0 && self.ticker.elapse(ms) {
            self.seconds_remaining -= 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub first_failure_delay_ms: u64,
    pub repeat_failure_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            first_failure_delay_ms: 30_000,
            repeat_failure_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackoffState {
    pub current_delay_ms: u64,
    pub consecutive_failures: u32,
    pub network_error: NetworkErrorState,
    #[serde(skip)]
    policy: BackoffPolicy,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current_delay_ms: policy.base_delay_ms,
            consecutive_failures: 0,
            network_error: NetworkErrorState::default(),
            policy,
        }
    }

    pub fn is_escalated(&self) -> bool {
        self.consecutive_failures > 0
    }

    /// First failure after a success waits long; later ones wait shorter.
    pub fn escalate(&mut self) -> u64 {
        self.current_delay_ms = if self.is_escalated() {
            self.policy.repeat_failure_delay_ms
        } else {
            self.policy.first_failure_delay_ms
        };
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.network_error.arm(self.current_delay_ms / 1000);
        self.current_delay_ms
    }

    pub fn reset(&mut self) {
        self.current_delay_ms = self.policy.base_delay_ms;
        self.consecutive_failures = 0;
        self.network_error.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub total: usize,
    pub current: usize,
    pub fetching_title: String,
    pub active: bool,
}

impl ProgressState {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            current: 0,
            fetching_title: String::new(),
            active: true,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_lifts_after_whole_seconds() {
        let mut state = RateLimitState::default();
        state.engage(2);
        assert!(!state.elapse(999));
        assert_eq!(state.seconds_remaining, 2);
        assert!(!state.elapse(1));
        assert_eq!(state.seconds_remaining, 1);
        assert!(state.elapse(1000));
        assert!(!state.active);
    }

    #[test]
    fn backoff_escalates_then_caps() {
        let mut backoff = BackoffState::new(BackoffPolicy::default());
        let delays: Vec<u64> = (0..4).map(|_| backoff.escalate()).collect();
        assert_eq!(delays, vec![30_000, 10_000, 10_000, 10_000]);
        assert!(backoff.network_error.active);
        assert_eq!(backoff.network_error.initial_seconds, 10);
        backoff.reset();
        assert_eq!(backoff.current_delay_ms, 2_000);
        assert!(!backoff.network_error.active);
    }

    #[test]
    fn network_countdown_stays_active_at_zero() {
        let mut state = NetworkErrorState::default();
        state.arm(1);
        state.elapse(1000);
        assert_eq!(state.seconds_remaining, 0);
        assert!(state.active);
        assert_eq!(state.ms_until_tick(), None);
    }
}
