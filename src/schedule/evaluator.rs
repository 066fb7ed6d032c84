//! Periodic evaluation of routing schedules against the router clock.
//! Activation and deactivation ordering is deliberately asymmetric: the
//! kill-switch call *follows* the persisted update for activation, and
//! *precedes* it for deactivation, so a crash mid-transition never leaves
//! traffic flowing through a row that claims to be suspended.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc, Weekday};
use thiserror::Error;
use tracing::warn;

use crate::event::channel::EventPublisher;
use crate::event::OrchestratorEvent;
use crate::model::schedule::{ActivationWindow, RoutingSchedule};
use crate::ports::{KillSwitchCoordinator, PortError, RouterPort, Store};

const TICK_INTERVAL: Duration = Duration::from_secs(60);
const CLOCK_SKEW_WARNING: chrono::Duration = chrono::Duration::minutes(5);

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("store error: {0}")]
    Store(#[from] PortError),
}

pub struct ScheduleEvaluator {
    store: std::sync::Arc<dyn Store>,
    router: std::sync::Arc<dyn RouterPort>,
    kill_switch: std::sync::Arc<dyn KillSwitchCoordinator>,
    events: EventPublisher<OrchestratorEvent>,
}

impl ScheduleEvaluator {
    pub fn new(
        store: std::sync::Arc<dyn Store>,
        router: std::sync::Arc<dyn RouterPort>,
        kill_switch: std::sync::Arc<dyn KillSwitchCoordinator>,
        events: EventPublisher<OrchestratorEvent>,
    ) -> Self {
        Self {
            store,
            router,
            kill_switch,
            events,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(err) = self.evaluate_once().await {
                warn!(%err, "schedule evaluation pass failed");
            }
        }
    }

    async fn resolve_now(&self) -> DateTime<Utc> {
        match self.router.current_time().await {
            Ok(router_now) => {
                let system_now = Utc::now();
                let skew = (router_now - system_now).abs();
                if skew > CLOCK_SKEW_WARNING {
                    warn!(
                        skew_seconds = skew.num_seconds(),
                        "router clock has drifted from system clock, proceeding with router time"
                    );
                }
                router_now
            }
            Err(err) => {
                warn!(%err, "router clock unavailable, falling back to system time");
                Utc::now()
            }
        }
    }

    pub async fn evaluate_once(&self) -> Result<(), ScheduleError> {
        let now = self.resolve_now().await;
        let schedules = self.store.list_schedules().await?;

        for schedule in schedules {
            if !schedule.enabled {
                continue;
            }
            let should_be_active = schedule.has_windows()
                && schedule
                    .windows
                    .iter()
                    .any(|window| window_is_active(window, now));

            if should_be_active && !schedule.active {
                self.activate(schedule, now).await?;
            } else if !should_be_active && schedule.active {
                self.deactivate(schedule, now).await?;
            }
        }
        Ok(())
    }

    async fn activate(&self, mut schedule: RoutingSchedule, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        schedule.active = true;
        schedule.last_activated = Some(now);
        self.store.put_schedule(&schedule).await?;

        if let Err(err) = self.kill_switch.resume(&schedule.instance_id).await {
            warn!(routing_id = %schedule.id, %err, "kill-switch resume failed after activation was persisted");
        }
        self.events
            .publish(OrchestratorEvent::RoutingActivated {
                routing_id: schedule.id,
            })
            .ok();
        Ok(())
    }

    async fn deactivate(&self, mut schedule: RoutingSchedule, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        if let Err(err) = self.kill_switch.suspend(&schedule.instance_id).await {
            warn!(routing_id = %schedule.id, %err, "kill-switch suspend failed before deactivation, aborting to avoid a traffic leak");
            return Ok(());
        }

        schedule.active = false;
        schedule.last_deactivated = Some(now);
        self.store.put_schedule(&schedule).await?;

        self.events
            .publish(OrchestratorEvent::RoutingDeactivated {
                routing_id: schedule.id,
            })
            .ok();
        Ok(())
    }
}

fn resolve_timezone(name: &str) -> chrono_tz::Tz {
    chrono_tz::Tz::from_str(name).unwrap_or_else(|_| {
        warn!(timezone = name, "unrecognized timezone, falling back to UTC");
        chrono_tz::UTC
    })
}

fn window_is_active(window: &ActivationWindow, now_utc: DateTime<Utc>) -> bool {
    let tz = resolve_timezone(&window.timezone);
    let local = now_utc.with_timezone(&tz);
    let local_time = local.time();
    let weekday = local.weekday();

    if window.start <= window.end {
        window.days.contains(&weekday) && local_time >= window.start && local_time < window.end
    } else {
        let today_tail = window.days.contains(&weekday) && local_time >= window.start;
        let yesterday_head =
            window.days.contains(&previous_weekday(weekday)) && local_time < window.end;
        today_tail || yesterday_head
    }
}

fn previous_weekday(day: Weekday) -> Weekday {
    day.pred()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn window(days: Vec<Weekday>, start: &str, end: &str) -> ActivationWindow {
        ActivationWindow {
            days,
            start: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
            timezone: "UTC".to_string(),
        }
    }

    #[test]
    fn simple_daytime_window_is_active_within_bounds() {
        let w = window(vec![Weekday::Mon], "09:00", "17:00");
        let noon_monday = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        assert_eq!(noon_monday.weekday(), Weekday::Mon);
        assert!(window_is_active(&w, noon_monday));
    }

    #[test]
    fn simple_daytime_window_is_inactive_outside_bounds() {
        let w = window(vec![Weekday::Mon], "09:00", "17:00");
        let evening_monday = Utc.with_ymd_and_hms(2026, 7, 27, 20, 0, 0).unwrap();
        assert!(!window_is_active(&w, evening_monday));
    }

    #[test]
    fn overnight_window_is_active_before_and_after_midnight() {
        let w = window(vec![Weekday::Mon, Weekday::Tue], "22:00", "06:00");
        let late_monday = Utc.with_ymd_and_hms(2026, 7, 27, 23, 0, 0).unwrap();
        let early_tuesday = Utc.with_ymd_and_hms(2026, 7, 28, 3, 0, 0).unwrap();
        assert!(window_is_active(&w, late_monday));
        assert!(window_is_active(&w, early_tuesday));
    }

    #[test]
    fn overnight_window_requires_the_previous_day_to_be_listed() {
        let w = window(vec![Weekday::Mon], "22:00", "06:00");
        let early_tuesday = Utc.with_ymd_and_hms(2026, 7, 28, 3, 0, 0).unwrap();
        assert!(!window_is_active(&w, early_tuesday));
    }

    #[test]
    fn unrecognized_timezone_falls_back_to_utc() {
        let tz = resolve_timezone("Not/A_Real_Zone");
        assert_eq!(tz, chrono_tz::UTC);
    }
}
