//! Exponential backoff for process restarts. Only the exponential
//! strategy is implemented, and a `max_delay` cap is added so the
//! computed delay never exceeds 30 s regardless of restart count.

use std::cmp::max;
use std::time::{Duration, Instant};

/// Restarts more than this long apart are treated as a fresh failure
/// sequence and reset the backoff state.
pub const STABLE_UPTIME_RESET: Duration = Duration::from_secs(31);

pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    last_retry: Instant,
    tries: usize,
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: usize,
    stable_uptime_reset: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            last_retry: Instant::now(),
            tries: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: DEFAULT_MAX_DELAY,
            max_retries: 0,
            stable_uptime_reset: STABLE_UPTIME_RESET,
        }
    }
}

impl Backoff {
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_stable_uptime_reset(mut self, stable_uptime_reset: Duration) -> Self {
        self.stable_uptime_reset = stable_uptime_reset;
        self
    }

    pub fn tries(&self) -> usize {
        self.tries
    }

    /// Whether another restart attempt is permitted. Resets the try counter
    /// first if the instance has been stable longer than `stable_uptime_reset`.
    pub fn should_retry(&mut self) -> bool {
        if self.last_retry.elapsed() > self.stable_uptime_reset {
            self.tries = 0;
        }
        self.max_retries == 0 || self.tries < self.max_retries
    }

    /// Computes the next delay (exponential, base 2, capped at `max_delay`)
    /// and advances the internal state. Does not sleep; the caller decides
    /// how to wait (a `tokio` timer in the supervisor loop).
    pub fn next_delay(&mut self) -> Duration {
        let exponent = max(self.tries as u32, 1) - 1;
        let delay = self
            .initial_delay
            .checked_mul(2u32.saturating_pow(exponent))
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        self.last_retry = Instant::now();
        self.tries += 1;
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn delay_never_exceeds_max_even_with_many_tries() {
        let mut backoff = Backoff::default();
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= DEFAULT_MAX_DELAY);
        }
    }

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 4)]
    #[case(4, 8)]
    fn delay_doubles_each_try_below_the_cap(#[case] tries_before: usize, #[case] expected_secs: u64) {
        let mut backoff = Backoff::default();
        for _ in 0..tries_before - 1 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(expected_secs));
    }

    #[test]
    fn max_retries_zero_means_unlimited() {
        let mut backoff = Backoff::default();
        for _ in 0..1000 {
            assert!(backoff.should_retry());
            backoff.next_delay();
        }
    }

    #[test]
    fn exceeding_max_retries_stops_retry() {
        let mut backoff = Backoff::default().with_max_retries(2);
        assert!(backoff.should_retry());
        backoff.next_delay();
        assert!(backoff.should_retry());
        backoff.next_delay();
        assert!(!backoff.should_retry());
    }
}
