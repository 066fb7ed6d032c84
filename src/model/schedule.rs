//! Time-of-day/timezone routing schedules evaluated by
//! [`crate::schedule::evaluator`].

use std::fmt::Display;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::InstanceId;

const MAX_LENGTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("routing id must be 1-{MAX_LENGTH} characters, start with a letter, end with an alphanumeric, and contain only lowercase letters, digits, or dashes")]
pub struct InvalidRoutingId;

fn is_valid_format(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_LENGTH
        && s.starts_with(|c: char| c.is_ascii_alphabetic())
        && s.ends_with(|c: char| c.is_ascii_alphanumeric())
        && s.chars()
            .all(|c| c == '-' || c.is_ascii_digit() || c.is_ascii_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutingId(String);

impl RoutingId {
    pub fn new(s: &str) -> Result<Self, InvalidRoutingId> {
        Self::try_from(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoutingId {
    type Error = InvalidRoutingId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_valid_format(&s) {
            Ok(Self(s))
        } else {
            Err(InvalidRoutingId)
        }
    }
}

impl From<RoutingId> for String {
    fn from(value: RoutingId) -> Self {
        value.0
    }
}

impl Display for RoutingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single activation window, e.g. "weekdays, 09:00-17:00 in
/// `Europe/Berlin`". The evaluator widens everything to UTC using
/// `chrono-tz` before comparing against the router clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationWindow {
    pub days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSchedule {
    pub id: RoutingId,
    /// The instance whose routing this schedule gates via the
    /// `KillSwitchCoordinator`.
    pub instance_id: InstanceId,
    pub windows: Vec<ActivationWindow>,
    pub enabled: bool,
    /// Mirrors the kill-switch state so the evaluator only calls
    /// `Suspend`/`Resume` on an actual transition, not every tick.
    pub active: bool,
    pub last_activated: Option<DateTime<Utc>>,
    pub last_deactivated: Option<DateTime<Utc>>,
}

impl RoutingSchedule {
    /// A schedule with no windows is always inactive, never "always on";
    /// Activation always requires an explicit window; there is no implicit default.
    pub fn has_windows(&self) -> bool {
        !self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_routing_ids() {
        assert!(RoutingId::new("Office-Hours").is_err());
        assert!(RoutingId::new("").is_err());
    }

    #[test]
    fn schedule_with_no_windows_has_no_windows() {
        let schedule = RoutingSchedule {
            id: RoutingId::new("office-hours").unwrap(),
            instance_id: crate::model::ids::InstanceId::new("tor-1").unwrap(),
            windows: vec![],
            enabled: true,
            active: false,
            last_activated: None,
            last_deactivated: None,
        };
        assert!(!schedule.has_windows());
    }
}
