//! Health state machine kept by [`crate::health::checker::HealthChecker`] for
//! each supervised instance.

use std::fmt::Display;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Spec §4.4: "Interval bounds are enforced: minimum 10 s, maximum ~5 min."
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(300);
/// Spec §4.4: "thresholds 1..10."
pub const MIN_FAILURE_THRESHOLD: u32 = 1;
pub const MAX_FAILURE_THRESHOLD: u32 = 10;

/// Coarse health classification, independent of which [`crate::health::probe::Probe`]
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStateKind {
    /// No probe has completed yet, or the instance isn't running.
    Unknown,
    Healthy,
    Unhealthy,
}

impl Display for HealthStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStateKind::Unknown => "unknown",
            HealthStateKind::Healthy => "healthy",
            HealthStateKind::Unhealthy => "unhealthy",
        };
        write!(f, "{s}")
    }
}

/// Mutable bookkeeping the checker keeps per instance between probe runs.
///
/// `consecutive_failures` only resets to zero on a successful probe;
/// crossing `failure_threshold` is what flips [`HealthState::kind`] to
/// [`HealthStateKind::Unhealthy`] and, if `auto_restart` is set, enqueues a
/// restart request.
#[derive(Debug, Clone)]
pub struct HealthState {
    kind: HealthStateKind,
    connected: bool,
    next_check_at: Instant,
    consecutive_failures: u32,
    failure_threshold: u32,
    check_interval: Duration,
    auto_restart: bool,
}

impl HealthState {
    pub fn new(check_interval: Duration, failure_threshold: u32, auto_restart: bool) -> Self {
        let clamped_interval = check_interval.clamp(MIN_CHECK_INTERVAL, MAX_CHECK_INTERVAL);
        if clamped_interval != check_interval {
            warn!(
                requested_secs = check_interval.as_secs(),
                clamped_secs = clamped_interval.as_secs(),
                "health check interval out of bounds, clamping to [10s, 300s]"
            );
        }
        let clamped_threshold = failure_threshold.clamp(MIN_FAILURE_THRESHOLD, MAX_FAILURE_THRESHOLD);
        if clamped_threshold != failure_threshold {
            warn!(
                requested = failure_threshold,
                clamped = clamped_threshold,
                "health failure threshold out of bounds, clamping to [1, 10]"
            );
        }
        Self {
            kind: HealthStateKind::Unknown,
            connected: false,
            next_check_at: Instant::now(),
            consecutive_failures: 0,
            failure_threshold: clamped_threshold,
            check_interval: clamped_interval,
            auto_restart,
        }
    }

    pub fn kind(&self) -> HealthStateKind {
        self.kind
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_check_at
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Records a successful probe. Returns the previous [`HealthStateKind`]
    /// so the caller can decide whether a `health.changed` event is due.
    pub fn record_success(&mut self, now: Instant) -> HealthStateKind {
        let previous = self.kind;
        self.connected = true;
        self.consecutive_failures = 0;
        self.kind = HealthStateKind::Healthy;
        self.next_check_at = now + self.check_interval;
        previous
    }

    /// Records a failed probe, bumping the failure counter and possibly
    /// crossing `failure_threshold`. Returns the previous kind.
    pub fn record_failure(&mut self, now: Instant) -> HealthStateKind {
        let previous = self.kind;
        self.connected = false;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.failure_threshold {
            self.kind = HealthStateKind::Unhealthy;
        }
        self.next_check_at = now + self.check_interval;
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_healthy_until_threshold_is_crossed() {
        let mut state = HealthState::new(Duration::from_secs(5), 3, true);
        let now = Instant::now();
        state.record_failure(now);
        state.record_failure(now);
        assert_eq!(state.kind(), HealthStateKind::Unknown);
        state.record_failure(now);
        assert_eq!(state.kind(), HealthStateKind::Unhealthy);
    }

    #[test]
    fn success_resets_failure_counter() {
        let mut state = HealthState::new(Duration::from_secs(5), 2, false);
        let now = Instant::now();
        state.record_failure(now);
        state.record_success(now);
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(state.kind(), HealthStateKind::Healthy);
    }

    #[test]
    fn interval_below_floor_is_clamped_to_ten_seconds() {
        let mut state = HealthState::new(Duration::from_secs(0), 3, true);
        let now = Instant::now();
        state.record_success(now);
        assert!(!state.is_due(now + Duration::from_secs(9)));
        assert!(state.is_due(now + Duration::from_secs(10)));
    }

    #[test]
    fn interval_above_ceiling_is_clamped_to_five_minutes() {
        let mut state = HealthState::new(Duration::from_secs(3600), 3, true);
        let now = Instant::now();
        state.record_success(now);
        assert!(!state.is_due(now + Duration::from_secs(299)));
        assert!(state.is_due(now + Duration::from_secs(300)));
    }

    #[test]
    fn failure_threshold_of_zero_is_clamped_to_one() {
        let mut state = HealthState::new(Duration::from_secs(30), 0, true);
        let now = Instant::now();
        state.record_failure(now);
        assert_eq!(state.kind(), HealthStateKind::Unhealthy);
    }

    #[test]
    fn failure_threshold_above_ten_is_clamped_to_ten() {
        let mut state = HealthState::new(Duration::from_secs(30), 99, true);
        let now = Instant::now();
        for _ in 0..9 {
            state.record_failure(now);
        }
        assert_eq!(state.kind(), HealthStateKind::Unknown);
        state.record_failure(now);
        assert_eq!(state.kind(), HealthStateKind::Unhealthy);
    }
}
