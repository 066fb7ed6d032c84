//! Instance Manager: owns the instance lifecycle FSM and orchestrates the
//! Process Supervisor, Isolation Verifier, Resource Limiter, Dependency
//! Manager, Gateway and BridgeOrchestrator collaborators around it.
//!
//! One long-lived struct holds every collaborator, and each method is a
//! transaction-shaped sequence of collaborator calls with explicit logging
//! at each step. Collaborators are held as `Arc<dyn Trait>` objects rather
//! than compile-time generic type parameters, which keeps this module's
//! signature stable as collaborators are added, at the cost of a vtable
//! indirection per call — an acceptable trade for a subprocess-lifecycle
//! manager that isn't on anyone's hot path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::dependency::DependencyGraph;
use crate::event::channel::EventPublisher;
use crate::event::OrchestratorEvent;
use crate::health::checker::HealthChecker;
use crate::health::probe;
use crate::isolation;
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::transitions::is_legal;
use crate::model::ids::InstanceId;
use crate::model::instance::{Instance, InstanceStatus};
use crate::ports::{BridgeOrchestrator, Gateway, Registry, Store};
use crate::resource::{limiter, ResourcePoller};
use crate::supervisor::command_os::ExecutableSpec;
use crate::supervisor::ProcessSupervisor;

const MAX_DEPENDENCY_DEPTH: usize = 10;
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(30);
const SOCKS5_HANDSHAKE_DEADLINE: Duration = Duration::from_secs(10);
const SOCKS5_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// RFC 1928 no-auth negotiation request: VER=5, NMETHODS=1, METHODS=[0x00].
const SOCKS5_GREETING: [u8; 3] = [0x05, 0x01, 0x00];

pub struct InstanceManager {
    store: Arc<dyn Store>,
    registry: Arc<dyn Registry>,
    gateway: Arc<dyn Gateway>,
    bridge: Arc<dyn BridgeOrchestrator>,
    supervisor: ProcessSupervisor,
    resource_poller: ResourcePoller,
    health_checker: HealthChecker,
    events: EventPublisher<OrchestratorEvent>,
    dependencies: Arc<Mutex<DependencyGraph>>,
    /// Per-instance lock serializing lifecycle operations. Cross-instance
    /// operations may run in parallel.
    instance_locks: Arc<Mutex<HashMap<InstanceId, Arc<Mutex<()>>>>>,
    allowed_binary_base: PathBuf,
}

impl InstanceManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<dyn Registry>,
        gateway: Arc<dyn Gateway>,
        bridge: Arc<dyn BridgeOrchestrator>,
        supervisor: ProcessSupervisor,
        resource_poller: ResourcePoller,
        health_checker: HealthChecker,
        events: EventPublisher<OrchestratorEvent>,
        dependencies: DependencyGraph,
        allowed_binary_base: PathBuf,
    ) -> Self {
        Self {
            store,
            registry,
            gateway,
            bridge,
            supervisor,
            resource_poller,
            health_checker,
            events,
            dependencies: Arc::new(Mutex::new(dependencies)),
            instance_locks: Arc::new(Mutex::new(HashMap::new())),
            allowed_binary_base,
        }
    }

    async fn lock_for(&self, instance_id: &InstanceId) -> Arc<Mutex<()>> {
        self.instance_locks
            .lock()
            .await
            .entry(instance_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn transition(
        &self,
        instance: &mut Instance,
        to: InstanceStatus,
    ) -> Result<(), LifecycleError> {
        let from = instance.status;
        if !is_legal(from, to) {
            return Err(LifecycleError::IllegalTransition {
                instance_id: instance.id.clone(),
                from,
                to,
            });
        }
        instance.status = to;
        self.store.put_instance(instance).await?;
        // Events are published after the persisted status is updated so
        // subscribers never observe a future state before it is durable.
        self.events
            .publish(OrchestratorEvent::ServiceStateChanged {
                instance_id: instance.id.clone(),
                previous: from,
                current: to,
            })
            .ok();
        Ok(())
    }

    /// Pre-flight memory check: if the instance's configured memory limit
    /// would exceed currently available system memory, fail listing other
    /// running instances whose stop would free enough memory rather than
    /// starting into an OOM risk.
    async fn check_available_memory(&self, instance: &Instance) -> Result<(), LifecycleError> {
        let needed = instance.memory_limit_bytes;
        let available = limiter::available_system_memory_bytes();
        if available >= needed {
            return Ok(());
        }

        let running = self.store.list_instances().await?;
        let candidates: Vec<InstanceId> = running
            .into_iter()
            .filter(|other| other.id != instance.id && other.status == InstanceStatus::Running)
            .map(|other| other.id)
            .collect();

        warn!(instance_id = %instance.id, needed, available, "insufficient memory to start instance");
        Err(LifecycleError::InsufficientMemory {
            instance_id: instance.id.clone(),
            needed_bytes: needed,
            available_bytes: available,
            candidates,
        })
    }

    /// Re-verifies the on-disk binary against the hash recorded by the
    /// download/verification pipeline. A missing `binary_hash` is treated
    /// as nothing to verify, not a failure.
    async fn verify_binary_hash(&self, instance: &mut Instance) -> Result<(), LifecycleError> {
        use sha2::{Digest, Sha256};

        let Some(expected) = instance.verification.binary_hash.clone() else {
            return Ok(());
        };

        let bytes = match std::fs::read(&instance.binary_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                let reason = format!("failed to read binary for verification: {err}");
                instance.unavailable_reason = Some(reason.clone());
                self.transition(instance, InstanceStatus::Failed).await?;
                self.events
                    .publish(OrchestratorEvent::BinaryVerificationFailed {
                        instance_id: instance.id.clone(),
                        reason: reason.clone(),
                    })
                    .ok();
                return Err(LifecycleError::IsolationViolation {
                    instance_id: instance.id.clone(),
                    message: reason,
                });
            }
        };
        let actual = hex::encode(Sha256::digest(&bytes));

        if actual != expected {
            let reason = "binary modified since verification".to_string();
            instance.unavailable_reason = Some(reason.clone());
            self.transition(instance, InstanceStatus::Failed).await?;
            self.events
                .publish(OrchestratorEvent::BinaryVerificationFailed {
                    instance_id: instance.id.clone(),
                    reason: reason.clone(),
                })
                .ok();
            return Err(LifecycleError::IsolationViolation {
                instance_id: instance.id.clone(),
                message: reason,
            });
        }

        self.events
            .publish(OrchestratorEvent::BinaryVerified {
                instance_id: instance.id.clone(),
            })
            .ok();
        Ok(())
    }

    /// Registers `dependent -> dependency`, persisting the edge before
    /// updating the in-memory graph so a restart never loses it.
    pub async fn add_dependency(
        &self,
        dependent: &InstanceId,
        dependency: &InstanceId,
    ) -> Result<(), LifecycleError> {
        let edge = crate::ports::store::DependencyEdge {
            dependent: dependent.clone(),
            dependency: dependency.clone(),
        };
        self.store.put_dependency(&edge).await?;
        self.dependencies.lock().await.add_edge(dependent, dependency);
        Ok(())
    }

    /// Removes a previously registered `dependent -> dependency` edge.
    pub async fn remove_dependency(
        &self,
        dependent: &InstanceId,
        dependency: &InstanceId,
    ) -> Result<(), LifecycleError> {
        let edge = crate::ports::store::DependencyEdge {
            dependent: dependent.clone(),
            dependency: dependency.clone(),
        };
        self.store.delete_dependency(&edge).await?;
        self.dependencies.lock().await.remove_edge(dependent, dependency);
        Ok(())
    }

    /// Recursive, dependency-aware start.
    pub async fn start_instance(&self, instance_id: &InstanceId) -> Result<(), LifecycleError> {
        self.start_instance_inner(instance_id, &mut std::collections::HashSet::new(), 0)
            .await
    }

    fn start_instance_inner<'a>(
        &'a self,
        instance_id: &'a InstanceId,
        visited: &'a mut std::collections::HashSet<InstanceId>,
        depth: usize,
    ) -> BoxFuture<'a, Result<(), LifecycleError>> {
        Box::pin(async move {
            if depth >= MAX_DEPENDENCY_DEPTH {
                return Err(LifecycleError::MaxDepthExceeded(instance_id.clone()));
            }
            if !visited.insert(instance_id.clone()) {
                return Ok(());
            }

            let lock = self.lock_for(instance_id).await;
            let _guard = lock.lock().await;

            let mut instance = self
                .store
                .get_instance(instance_id)
                .await?
                .ok_or_else(|| LifecycleError::NotFound(instance_id.clone()))?;

            if instance.status == InstanceStatus::Running {
                return Ok(());
            }

            let dependencies = self.dependencies.lock().await.direct_dependencies(instance_id);
            for dependency_id in dependencies {
                let dependency = self
                    .store
                    .get_instance(&dependency_id)
                    .await?
                    .ok_or_else(|| LifecycleError::NotFound(dependency_id.clone()))?;
                if dependency.auto_start && dependency.status != InstanceStatus::Running {
                    self.start_instance_inner(&dependency_id, visited, depth + 1)
                        .await?;
                }
                self.wait_for_running(&dependency_id, DEFAULT_HEALTH_TIMEOUT)
                    .await?;
            }

            self.transition(&mut instance, InstanceStatus::Starting).await?;

            let manifest = self
                .registry
                .get_manifest(&instance.feature_id)
                .await?
                .ok_or_else(|| {
                    LifecycleError::MissingManifest(instance.id.clone(), instance.feature_id.clone())
                })?;

            let allocated_ports: Vec<u16> = self
                .store
                .list_port_allocations(&instance.id)
                .await?
                .into_iter()
                .map(|allocation| allocation.port)
                .collect();
            let report = isolation::verify_all(&instance, &self.allowed_binary_base, &allocated_ports);
            if report.has_errors() {
                let violation = report.first_error().cloned().expect("has_errors implies a first error");
                instance.unavailable_reason = Some(violation.message.clone());
                self.transition(&mut instance, InstanceStatus::Failed).await?;
                self.events
                    .publish(OrchestratorEvent::IsolationViolation {
                        instance_id: instance.id.clone(),
                        violation_kind: violation.layer.to_string(),
                        affected_ports: violation.affected_ports.clone(),
                        message: violation.message,
                    })
                    .ok();
                return Err(LifecycleError::IsolationViolation {
                    instance_id: instance.id.clone(),
                    message: "pre-start isolation check failed".to_string(),
                });
            }

            self.check_available_memory(&instance).await?;
            self.verify_binary_hash(&mut instance).await?;

            self.discard_stale_process_entry(&instance.id);
            self.supervisor.add(instance.id.clone()).ok();
            let mut env = manifest.env.clone();
            if manifest.tags.iter().any(|tag| tag == "garbage-collected") {
                let soft_limit = instance.memory_limit_bytes * 9 / 10;
                env.insert("GOMEMLIMIT".to_string(), format!("{soft_limit}B"));
            }
            let spec = ExecutableSpec {
                binary_path: PathBuf::from(&instance.binary_path),
                args: Vec::new(),
                env,
                working_dir: None,
                shutdown_timeout: Duration::from_secs(10),
            };
            let pid = self.supervisor.start(
                &instance.id,
                &spec,
                &instance.allocated_ports,
                instance.auto_restart,
            )?;

            if let Err(err) = limiter::apply_memory_limit(&instance.id, instance.memory_limit_bytes) {
                warn!(instance_id = %instance.id, %err, "failed to apply cgroup memory limit");
            } else if let Err(err) = limiter::add_process(&instance.id, pid) {
                warn!(instance_id = %instance.id, %err, "failed to attach process to cgroup");
            }
            self.resource_poller
                .track(instance.id.clone(), pid, instance.memory_limit_bytes)
                .await;

            if manifest.tags.iter().any(|tag| tag == "socks5") {
                self.poll_socks5_handshake(&instance).await?;
            }

            if self.gateway.needs_gateway(&manifest, "default") {
                self.gateway.start_gateway(&instance.id).await?;
            }
            self.bridge.setup_bridge(&instance, &manifest).await?;

            self.transition(&mut instance, InstanceStatus::Running).await?;
            info!(instance_id = %instance.id, pid, "instance is running");

            if let Some(probe) = probe::build_probe(&instance.health.probe) {
                self.health_checker
                    .register(
                        instance.id.clone(),
                        Arc::from(probe),
                        manifest.default_health_check_interval,
                        manifest.default_failure_threshold,
                        instance.auto_restart,
                    )
                    .await;
            }
            Ok(())
        })
    }

    /// Polls the instance's first allocated port with a SOCKS5 no-auth
    /// negotiation until the server replies or the deadline elapses.
    async fn poll_socks5_handshake(&self, instance: &Instance) -> Result<(), LifecycleError> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let Some(&port) = instance.allocated_ports.first() else {
            return Ok(());
        };
        let addr = std::net::SocketAddr::new(instance.bind_ip.into(), port);
        let deadline = tokio::time::Instant::now() + SOCKS5_HANDSHAKE_DEADLINE;

        loop {
            let attempt = async {
                let mut stream = tokio::net::TcpStream::connect(addr).await?;
                stream.write_all(&SOCKS5_GREETING).await?;
                let mut response = [0u8; 2];
                stream.read_exact(&mut response).await?;
                Ok::<[u8; 2], std::io::Error>(response)
            };

            match tokio::time::timeout(Duration::from_secs(1), attempt).await {
                Ok(Ok(response)) if response[0] == 0x05 => return Ok(()),
                _ => {}
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(LifecycleError::Socks5HandshakeFailed(instance.id.clone()));
            }
            tokio::time::sleep(SOCKS5_POLL_INTERVAL).await;
        }
    }

    /// Drops a previous `Crashed` (or otherwise non-restartable) supervisor
    /// entry for `instance_id` before a fresh `Start`.
    ///
    /// A process that crashed with `auto_restart=false` is left registered
    /// in `Crashed` state — there is no `Crashed -> Starting` edge in the
    /// process FSM, so handing that stale entry straight to
    /// `ProcessSupervisor::start` would fail forever. Removing it here lets
    /// the subsequent `add` register a clean `Stopped` process instead.
    fn discard_stale_process_entry(&self, instance_id: &InstanceId) {
        if !self.supervisor.list().contains(instance_id) {
            return;
        }
        let is_live = matches!(
            self.supervisor.state_of(instance_id),
            Ok(crate::supervisor::process::ProcessState::Running)
                | Ok(crate::supervisor::process::ProcessState::Starting)
                | Ok(crate::supervisor::process::ProcessState::Stopping)
                | Ok(crate::supervisor::process::ProcessState::BackingOff)
        );
        if !is_live {
            self.supervisor.remove(instance_id).ok();
        }
    }

    async fn wait_for_running(
        &self,
        instance_id: &InstanceId,
        timeout: Duration,
    ) -> Result<(), LifecycleError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let instance = self
                .store
                .get_instance(instance_id)
                .await?
                .ok_or_else(|| LifecycleError::NotFound(instance_id.clone()))?;
            if instance.status == InstanceStatus::Running {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LifecycleError::Timeout {
                    instance_id: instance_id.clone(),
                    expected: InstanceStatus::Running,
                });
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    pub async fn stop_instance(
        &self,
        instance_id: &InstanceId,
        force: bool,
    ) -> Result<(), LifecycleError> {
        let lock = self.lock_for(instance_id).await;
        let _guard = lock.lock().await;

        let mut instance = self
            .store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(instance_id.clone()))?;

        if !force {
            let active_dependents = self.active_dependents(instance_id).await?;
            if !active_dependents.is_empty() {
                return Err(LifecycleError::DependentsActive {
                    instance_id: instance_id.clone(),
                    dependents: active_dependents,
                });
            }
        }

        self.transition(&mut instance, InstanceStatus::Stopping).await?;

        self.gateway.stop_gateway(instance_id).await.ok();
        self.resource_poller.untrack(instance_id).await;
        self.health_checker.unregister(instance_id).await;
        self.supervisor.stop(instance_id)?;
        self.supervisor.remove(instance_id).ok();

        self.transition(&mut instance, InstanceStatus::Stopped).await?;
        Ok(())
    }

    async fn active_dependents(&self, instance_id: &InstanceId) -> Result<Vec<InstanceId>, LifecycleError> {
        let dependents = self.dependencies.lock().await.direct_dependents(instance_id);
        let mut active = Vec::new();
        for dependent_id in dependents {
            if let Some(dependent) = self.store.get_instance(&dependent_id).await? {
                if matches!(
                    dependent.status,
                    InstanceStatus::Running | InstanceStatus::Starting
                ) {
                    active.push(dependent_id);
                }
            }
        }
        Ok(active)
    }

    pub async fn restart_instance(&self, instance_id: &InstanceId) -> Result<(), LifecycleError> {
        self.stop_instance(instance_id, true).await?;
        self.start_instance(instance_id).await
    }

    /// Single-transaction cascade delete.
    pub async fn delete_instance(&self, instance_id: &InstanceId) -> Result<(), LifecycleError> {
        let lock = self.lock_for(instance_id).await;
        let _guard = lock.lock().await;

        let mut instance = self
            .store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(instance_id.clone()))?;

        if !instance.status.is_terminal() {
            return Err(LifecycleError::IllegalTransition {
                instance_id: instance_id.clone(),
                from: instance.status,
                to: InstanceStatus::Deleting,
            });
        }

        self.transition(&mut instance, InstanceStatus::Deleting).await?;

        if self.supervisor.list().contains(instance_id) {
            self.supervisor.stop(instance_id).ok();
            self.supervisor.remove(instance_id).ok();
        }
        self.bridge.teardown_bridge(instance_id).await.ok();
        limiter::remove_cgroup(instance_id).ok();

        self.store.delete_instance_cascade(instance_id).await?;
        self.instance_locks.lock().await.remove(instance_id);

        if let Some(log_capture) = self.supervisor.log_capture() {
            for path in log_capture.log_files_for(instance_id) {
                match std::fs::remove_file(&path) {
                    Ok(()) => info!(instance_id = %instance_id, path = %path.display(), "removed log file"),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => warn!(instance_id = %instance_id, path = %path.display(), %err, "failed to remove log file"),
                }
            }
        }
        Ok(())
    }

    /// Reconciles persisted instance state with reality at orchestrator
    /// startup. Idempotent.
    pub async fn reconcile_on_startup(&self) -> Result<(), LifecycleError> {
        let instances = self.store.list_instances().await?;
        for mut instance in instances {
            if !matches!(
                instance.status,
                InstanceStatus::Running | InstanceStatus::Starting
            ) {
                continue;
            }
            let has_live_process = self
                .supervisor
                .list()
                .contains(&instance.id)
                && self
                    .supervisor
                    .state_of(&instance.id)
                    .map(|s| s == crate::supervisor::process::ProcessState::Running)
                    .unwrap_or(false);
            if !has_live_process {
                warn!(instance_id = %instance.id, "reconciling orphaned instance on boot");
                instance.unavailable_reason = Some("orphaned on boot".to_string());
                self.discard_stale_process_entry(&instance.id);
                if instance.status == InstanceStatus::Starting {
                    self.transition(&mut instance, InstanceStatus::Failed).await?;
                } else {
                    // Running -> Stopped has no direct edge in the FSM; an
                    // orphaned-on-boot instance is walked through Stopping
                    // first so reconciliation never takes a shortcut the
                    // rest of the lifecycle can't.
                    self.transition(&mut instance, InstanceStatus::Stopping).await?;
                    self.transition(&mut instance, InstanceStatus::Stopped).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::net::Ipv4Addr;

    use crate::health::state::HealthStateKind;
    use crate::model::instance::{HealthSummary, Instance, VerificationInfo};
    use crate::model::ids::FeatureId;
    use crate::ports::bridge::MockBridgeOrchestrator;
    use crate::ports::gateway::MockGateway;
    use crate::ports::registry::MockRegistry;
    use crate::ports::store::MockStore;
    use crate::supervisor::log_capture::LogCapture;

    #[test]
    fn max_dependency_depth_is_ten() {
        assert_eq!(MAX_DEPENDENCY_DEPTH, 10);
    }

    fn sample_instance(status: InstanceStatus) -> Instance {
        Instance {
            id: InstanceId::new("tor-1").unwrap(),
            feature_id: FeatureId::new("tor").unwrap(),
            name: "tor-1".to_string(),
            binary_path: "/data/services/tor/bin/tor".to_string(),
            binary_version: "0.4.8.9".to_string(),
            config: StdHashMap::new(),
            allocated_ports: vec![9050],
            allocated_vlan: Some(42),
            bind_ip: Ipv4Addr::new(10, 10, 0, 5),
            memory_limit_bytes: 256 * 1024 * 1024,
            router_id: "router-1".to_string(),
            status,
            auto_start: true,
            auto_restart: false,
            verification: VerificationInfo::default(),
            health: HealthSummary {
                state: HealthStateKind::Unknown,
                ..HealthSummary::default()
            },
            unavailable_reason: None,
        }
    }

    /// Builds an `InstanceManager` wired to whatever mocked collaborators a
    /// test needs, with a real `ProcessSupervisor`/`ResourcePoller`/
    /// `HealthChecker` since those have no external side effects when
    /// unused.
    fn manager_with(
        store: MockStore,
        registry: MockRegistry,
        gateway: MockGateway,
        bridge: MockBridgeOrchestrator,
    ) -> InstanceManager {
        let (events, _consumer) = crate::event::channel::pub_sub::<OrchestratorEvent>();
        let (restart_sender, _restart_receiver) = crate::health::restart_request::restart_request_channel();
        let supervisor = ProcessSupervisor::new(None::<LogCapture>, events.clone());
        let resource_poller = ResourcePoller::new(events.clone());
        let health_checker = HealthChecker::new(events.clone(), restart_sender);
        InstanceManager::new(
            Arc::new(store),
            Arc::new(registry),
            Arc::new(gateway),
            Arc::new(bridge),
            supervisor,
            resource_poller,
            health_checker,
            events,
            DependencyGraph::new(),
            PathBuf::from("/data/services"),
        )
    }

    /// Regression test for the "stuck `Crashed`" deadlock: a process that
    /// fails to spawn lands in `Crashed`, which has no outgoing edge back
    /// to `Starting` in the process FSM. Before `discard_stale_process_entry`
    /// existed, a second `add` for the same instance id would fail forever
    /// with `AlreadyRegistered`.
    #[test]
    fn discard_stale_process_entry_clears_a_crashed_slot() {
        let manager = manager_with(
            MockStore::new(),
            MockRegistry::new(),
            MockGateway::new(),
            MockBridgeOrchestrator::new(),
        );
        let id = InstanceId::new("tor-1").unwrap();
        manager.supervisor.add(id.clone()).unwrap();

        let bad_spec = ExecutableSpec {
            binary_path: PathBuf::from("/nonexistent/binary/does-not-exist"),
            args: Vec::new(),
            env: StdHashMap::new(),
            working_dir: None,
            shutdown_timeout: Duration::from_secs(1),
        };
        assert!(manager.supervisor.start(&id, &bad_spec, &[], false).is_err());
        assert_eq!(
            manager.supervisor.state_of(&id).unwrap(),
            crate::supervisor::process::ProcessState::Crashed
        );

        manager.discard_stale_process_entry(&id);
        assert!(manager.supervisor.list().is_empty());

        // The slot is free again: a fresh `add` for the same id now succeeds
        // instead of failing with `AlreadyRegistered` forever.
        manager.supervisor.add(id).unwrap();
    }

    /// A process still `Running` is left alone: `discard_stale_process_entry`
    /// only clears entries that can never restart on their own.
    #[test]
    fn discard_stale_process_entry_leaves_a_registered_but_unstarted_process_alone() {
        let manager = manager_with(
            MockStore::new(),
            MockRegistry::new(),
            MockGateway::new(),
            MockBridgeOrchestrator::new(),
        );
        let id = InstanceId::new("tor-1").unwrap();
        manager.supervisor.add(id.clone()).unwrap();

        // A freshly `add`-ed entry is `Stopped`, not `Crashed` -- also not
        // something `discard_stale_process_entry` should touch, since a
        // second `add` for a `Stopped` entry would fail anyway and the
        // caller's `.ok()` already tolerates that.
        manager.discard_stale_process_entry(&id);
        assert_eq!(manager.supervisor.list(), vec![id]);
    }

    /// Regression test for the illegal `Running -> Stopped` transition that
    /// `reconcile_on_startup` used to attempt directly. An instance
    /// persisted as `Running` with no live supervisor entry (the
    /// orchestrator restarted and the OS process is gone) must walk through
    /// `Stopping` on its way to `Stopped`.
    #[tokio::test]
    async fn reconcile_on_startup_walks_an_orphaned_running_instance_through_stopping() {
        let mut store = MockStore::new();
        store
            .expect_list_instances()
            .returning(|| Ok(vec![sample_instance(InstanceStatus::Running)]));
        store.expect_put_instance().returning(|_| Ok(()));

        let manager = manager_with(
            store,
            MockRegistry::new(),
            MockGateway::new(),
            MockBridgeOrchestrator::new(),
        );

        manager.reconcile_on_startup().await.unwrap();
    }

    /// An instance persisted as `Starting` with no live process is reconciled
    /// straight to `Failed`, which is a direct, legal edge.
    #[tokio::test]
    async fn reconcile_on_startup_fails_an_orphaned_starting_instance() {
        let mut store = MockStore::new();
        store
            .expect_list_instances()
            .returning(|| Ok(vec![sample_instance(InstanceStatus::Starting)]));
        store.expect_put_instance().returning(|instance| {
            assert_eq!(instance.status, InstanceStatus::Failed);
            Ok(())
        });

        let manager = manager_with(
            store,
            MockRegistry::new(),
            MockGateway::new(),
            MockBridgeOrchestrator::new(),
        );

        manager.reconcile_on_startup().await.unwrap();
    }

    /// An instance that is already `Stopped` is left untouched: reconciliation
    /// only acts on `Running`/`Starting` rows.
    #[tokio::test]
    async fn reconcile_on_startup_ignores_already_stopped_instances() {
        let mut store = MockStore::new();
        store
            .expect_list_instances()
            .returning(|| Ok(vec![sample_instance(InstanceStatus::Stopped)]));
        // No `put_instance` call is expected; mockall panics on an
        // unexpected call to a method with no configured expectation.

        let manager = manager_with(
            store,
            MockRegistry::new(),
            MockGateway::new(),
            MockBridgeOrchestrator::new(),
        );

        manager.reconcile_on_startup().await.unwrap();
    }
}
