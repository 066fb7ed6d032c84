//! Resource usage sampling loop. Samples RSS for every running instance's
//! PID via `sysinfo`, bounded by a semaphore so a large instance count
//! can't spawn unbounded concurrent refreshes, and emits threshold-crossing
//! events (warning at 80%, critical at 90%, exceeded at 100% of the
//! instance's configured memory limit) with de-duplication so a
//! steady-state overage doesn't spam one event per tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

use crate::event::channel::EventPublisher;
use crate::event::OrchestratorEvent;
use crate::model::ids::InstanceId;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_CONCURRENT_SAMPLES: usize = 8;
const WARNING_RATIO: f64 = 0.80;
const CRITICAL_RATIO: f64 = 0.90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThresholdLevel {
    Normal,
    Warning,
    Critical,
    Exceeded,
}

fn classify(usage_bytes: u64, limit_bytes: u64) -> ThresholdLevel {
    if limit_bytes == 0 {
        return ThresholdLevel::Normal;
    }
    let ratio = usage_bytes as f64 / limit_bytes as f64;
    if ratio >= 1.0 {
        ThresholdLevel::Exceeded
    } else if ratio >= CRITICAL_RATIO {
        ThresholdLevel::Critical
    } else if ratio >= WARNING_RATIO {
        ThresholdLevel::Warning
    } else {
        ThresholdLevel::Normal
    }
}

struct Tracked {
    pid: u32,
    limit_bytes: u64,
    last_level: ThresholdLevel,
}

#[derive(Clone)]
pub struct ResourcePoller {
    tracked: Arc<Mutex<HashMap<InstanceId, Tracked>>>,
    semaphore: Arc<Semaphore>,
    events: EventPublisher<OrchestratorEvent>,
}

impl ResourcePoller {
    pub fn new(events: EventPublisher<OrchestratorEvent>) -> Self {
        Self {
            tracked: Arc::new(Mutex::new(HashMap::new())),
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_SAMPLES)),
            events,
        }
    }

    pub async fn track(&self, instance_id: InstanceId, pid: u32, limit_bytes: u64) {
        self.tracked.lock().await.insert(
            instance_id,
            Tracked {
                pid,
                limit_bytes,
                last_level: ThresholdLevel::Normal,
            },
        );
    }

    pub async fn untrack(&self, instance_id: &InstanceId) {
        self.tracked.lock().await.remove(instance_id);
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            ticker.tick().await;
            self.sample_all().await;
        }
    }

    async fn sample_all(&self) {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let mut system = System::new();
        let ids: Vec<(InstanceId, u32)> = {
            let tracked = self.tracked.lock().await;
            tracked.iter().map(|(id, t)| (id.clone(), t.pid)).collect()
        };
        let pids: Vec<Pid> = ids.iter().map(|(_, pid)| Pid::from_u32(*pid)).collect();
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&pids), true);

        for (instance_id, pid) in ids {
            let Some(process) = system.process(Pid::from_u32(pid)) else {
                debug!(%instance_id, pid, "process not found during resource sampling");
                continue;
            };
            let usage_bytes = process.memory();
            self.record_sample(instance_id, usage_bytes).await;
        }
    }

    async fn record_sample(&self, instance_id: InstanceId, usage_bytes: u64) {
        let mut tracked = self.tracked.lock().await;
        let Some(entry) = tracked.get_mut(&instance_id) else {
            return;
        };
        let level = classify(usage_bytes, entry.limit_bytes);
        if level == entry.last_level {
            return;
        }
        entry.last_level = level;
        let limit_bytes = entry.limit_bytes;
        drop(tracked);

        let event = match level {
            ThresholdLevel::Warning => Some(OrchestratorEvent::ResourceWarning {
                instance_id,
                usage_bytes,
                limit_bytes,
            }),
            ThresholdLevel::Critical => Some(OrchestratorEvent::ResourceCritical {
                instance_id,
                usage_bytes,
                limit_bytes,
            }),
            ThresholdLevel::Exceeded => Some(OrchestratorEvent::ResourceLimitExceeded {
                instance_id,
                usage_bytes,
                limit_bytes,
            }),
            ThresholdLevel::Normal => None,
        };
        if let Some(event) = event {
            self.events.publish(event).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_thresholds() {
        assert_eq!(classify(50, 100), ThresholdLevel::Normal);
        assert_eq!(classify(80, 100), ThresholdLevel::Warning);
        assert_eq!(classify(95, 100), ThresholdLevel::Critical);
        assert_eq!(classify(100, 100), ThresholdLevel::Exceeded);
        assert_eq!(classify(10, 0), ThresholdLevel::Normal);
    }

    #[tokio::test]
    async fn repeated_same_level_does_not_duplicate_events() {
        let (publisher, consumer) = crate::event::channel::pub_sub();
        let poller = ResourcePoller::new(publisher);
        let id = InstanceId::new("tor-1").unwrap();
        poller.track(id.clone(), 1, 100).await;

        poller.record_sample(id.clone(), 85).await;
        poller.record_sample(id.clone(), 86).await;

        assert!(consumer.as_ref().try_recv().is_ok());
        assert!(consumer.as_ref().try_recv().is_err());
    }
}
