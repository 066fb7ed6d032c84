//! Single scheduler that walks every registered instance on a fixed tick,
//! running due probes with bounded concurrency: one scheduler services
//! all instances rather than one thread per instance.
//!
//! With potentially hundreds of service instances, one OS thread each
//! would be wasteful, so probes run as bounded `tokio` tasks fanned out
//! from one scheduler loop instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::event::channel::EventPublisher;
use crate::event::OrchestratorEvent;
use crate::health::probe::Probe;
use crate::health::restart_request::RestartRequestSender;
use crate::health::state::{HealthState, HealthStateKind};
use crate::model::ids::InstanceId;

const SCHEDULER_TICK: Duration = Duration::from_secs(1);
const MAX_CONCURRENT_PROBES: usize = 16;

struct Registration {
    probe: Arc<dyn Probe>,
    state: HealthState,
}

/// Owns the health state for every registered instance and drives probe
/// execution. Cheap to clone; the registry and semaphore are shared.
#[derive(Clone)]
pub struct HealthChecker {
    registrations: Arc<Mutex<HashMap<InstanceId, Registration>>>,
    semaphore: Arc<Semaphore>,
    events: EventPublisher<OrchestratorEvent>,
    restarts: RestartRequestSender,
}

impl HealthChecker {
    pub fn new(events: EventPublisher<OrchestratorEvent>, restarts: RestartRequestSender) -> Self {
        Self {
            registrations: Arc::new(Mutex::new(HashMap::new())),
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES)),
            events,
            restarts,
        }
    }

    pub async fn register(
        &self,
        instance_id: InstanceId,
        probe: Arc<dyn Probe>,
        check_interval: Duration,
        failure_threshold: u32,
        auto_restart: bool,
    ) {
        let state = HealthState::new(check_interval, failure_threshold, auto_restart);
        self.registrations
            .lock()
            .await
            .insert(instance_id, Registration { probe, state });
    }

    pub async fn unregister(&self, instance_id: &InstanceId) {
        self.registrations.lock().await.remove(instance_id);
    }

    pub async fn current_kind(&self, instance_id: &InstanceId) -> Option<HealthStateKind> {
        self.registrations
            .lock()
            .await
            .get(instance_id)
            .map(|r| r.state.kind())
    }

    /// Runs forever, ticking every [`SCHEDULER_TICK`] and running any probe
    /// that's due. Intended to be driven from a dedicated `tokio` task; stop
    /// by dropping that task's `JoinHandle` or wrapping with a cancellation
    /// token at the call site.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(SCHEDULER_TICK);
        loop {
            ticker.tick().await;
            self.run_due_probes().await;
        }
    }

    async fn run_due_probes(&self) {
        let now = Instant::now();
        let due: Vec<(InstanceId, Arc<dyn Probe>)> = {
            let registrations = self.registrations.lock().await;
            registrations
                .iter()
                .filter(|(_, r)| r.state.is_due(now))
                .map(|(id, r)| (id.clone(), Arc::clone(&r.probe)))
                .collect()
        };

        for (instance_id, probe) in due {
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let checker = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                checker.run_one(instance_id, probe).await;
            });
        }
    }

    async fn run_one(&self, instance_id: InstanceId, probe: Arc<dyn Probe>) {
        let result = probe.check().await;
        let now = Instant::now();
        let mut registrations = self.registrations.lock().await;
        let Some(registration) = registrations.get_mut(&instance_id) else {
            return;
        };

        let previous = match &result {
            Ok(()) => registration.state.record_success(now),
            Err(err) => {
                debug!(%instance_id, %err, "health probe failed");
                registration.state.record_failure(now)
            }
        };
        let current = registration.state.kind();
        let auto_restart = registration.state.auto_restart();
        let consecutive_failures = registration.state.consecutive_failures();
        drop(registrations);

        if previous != current {
            info!(%instance_id, %previous, %current, "health state changed");
            self.events
                .publish(OrchestratorEvent::HealthChanged {
                    instance_id: instance_id.clone(),
                    previous,
                    current,
                })
                .ok();
        }

        // Only the crossing itself requests a restart. Without the
        // `previous != current` guard a probe that keeps failing after the
        // instance is already `Unhealthy` would enqueue a fresh restart
        // request on every tick instead of exactly once per threshold
        // crossing.
        if previous != current && current == HealthStateKind::Unhealthy && auto_restart {
            self.restarts.request(
                instance_id,
                format!("unhealthy after {consecutive_failures} consecutive failures"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::channel::pub_sub;
    use crate::health::probe::ProbeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyProbe {
        healthy: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Probe for FlakyProbe {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn check(&self) -> Result<(), ProbeError> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ProbeError::NotConfigured)
            }
        }
    }

    #[tokio::test]
    async fn crossing_failure_threshold_requests_restart() {
        let (event_pub, event_consumer) = pub_sub();
        let (restart_sender, mut restart_receiver) = crate::health::restart_request::restart_request_channel();
        let checker = HealthChecker::new(event_pub, restart_sender);
        let healthy = Arc::new(AtomicBool::new(false));
        let instance_id = InstanceId::new("tor-1").unwrap();

        checker
            .register(
                instance_id.clone(),
                Arc::new(FlakyProbe {
                    healthy: Arc::clone(&healthy),
                }),
                Duration::ZERO,
                2,
                true,
            )
            .await;

        checker.run_due_probes().await;
        // give the spawned task a chance to run
        tokio::time::sleep(Duration::from_millis(20)).await;
        checker.run_due_probes().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(
            checker.current_kind(&instance_id).await,
            Some(HealthStateKind::Unhealthy)
        );

        let request = restart_receiver.recv().await.unwrap();
        assert_eq!(request.instance_id, instance_id);

        let event = event_consumer.as_ref().try_recv();
        assert!(event.is_ok());
    }
}
