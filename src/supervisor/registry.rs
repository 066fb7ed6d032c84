//! In-memory registry of every live [`ManagedProcess`], the Process
//! Supervisor's public surface: `Add`, `Start`, `Stop`, `Remove`, `List`,
//! `Get`, `StopAll`. Each instance's process state is guarded by its own
//! mutex so one slow shutdown doesn't block unrelated instances; the
//! registry map itself is guarded separately and only held briefly to
//! look up or insert an entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::event::channel::EventPublisher;
use crate::event::OrchestratorEvent;
use crate::model::ids::InstanceId;
use crate::supervisor::command_os::ExecutableSpec;
use crate::supervisor::error::SupervisorError;
use crate::supervisor::log_capture::LogCapture;
use crate::supervisor::monitor::{self, CrashMonitor};
use crate::supervisor::process::{ManagedProcess, ProcessState};
use crate::supervisor::restart_policy::Backoff;
use crate::supervisor::shutdown::ProcessTerminator;

#[derive(Clone)]
pub struct ProcessSupervisor {
    processes: Arc<Mutex<HashMap<InstanceId, Arc<Mutex<ManagedProcess>>>>>,
    monitors: Arc<Mutex<HashMap<InstanceId, CrashMonitor>>>,
    log_capture: Option<LogCapture>,
    terminator: Arc<ProcessTerminator>,
    events: EventPublisher<OrchestratorEvent>,
}

impl ProcessSupervisor {
    pub fn new(log_capture: Option<LogCapture>, events: EventPublisher<OrchestratorEvent>) -> Self {
        Self {
            processes: Arc::new(Mutex::new(HashMap::new())),
            monitors: Arc::new(Mutex::new(HashMap::new())),
            log_capture,
            terminator: Arc::new(ProcessTerminator::default()),
            events,
        }
    }

    pub fn add(&self, instance_id: InstanceId) -> Result<(), SupervisorError> {
        let mut processes = self.processes.lock().expect("registry mutex poisoned");
        if processes.contains_key(&instance_id) {
            return Err(SupervisorError::AlreadyRegistered(instance_id));
        }
        processes.insert(
            instance_id.clone(),
            Arc::new(Mutex::new(ManagedProcess::new(
                instance_id,
                Backoff::default(),
            ))),
        );
        Ok(())
    }

    fn get_handle(&self, instance_id: &InstanceId) -> Result<Arc<Mutex<ManagedProcess>>, SupervisorError> {
        self.processes
            .lock()
            .expect("registry mutex poisoned")
            .get(instance_id)
            .cloned()
            .ok_or_else(|| SupervisorError::NotRegistered(instance_id.clone()))
    }

    /// Pre-flight port availability check against the Port Registry, if
    /// configured, followed by the actual OS spawn. On success, starts a
    /// background crash monitor that respawns the process with backoff on
    /// an unexpected exit when `auto_restart` is set.
    pub fn start(
        &self,
        instance_id: &InstanceId,
        spec: &ExecutableSpec,
        declared_ports: &[u16],
        auto_restart: bool,
    ) -> Result<u32, SupervisorError> {
        for &port in declared_ports {
            if port_in_use(port) {
                return Err(SupervisorError::PortUnavailable {
                    instance_id: instance_id.clone(),
                    port,
                });
            }
        }

        let handle = self.get_handle(instance_id)?;
        {
            let mut process = handle.lock().expect("process mutex poisoned");
            process.start(spec, self.log_capture.clone())?;
            info!(%instance_id, pid = process.pid(), "process started");
        }

        let monitor = monitor::spawn(
            instance_id.clone(),
            handle.clone(),
            spec.clone(),
            self.log_capture.clone(),
            self.events.clone(),
            auto_restart,
        );
        let previous = self
            .monitors
            .lock()
            .expect("monitor registry mutex poisoned")
            .insert(instance_id.clone(), monitor);
        if let Some(previous) = previous {
            previous.stop();
        }

        let pid = handle.lock().expect("process mutex poisoned").pid();
        Ok(pid.unwrap_or(0))
    }

    pub fn stop(&self, instance_id: &InstanceId) -> Result<(), SupervisorError> {
        if let Some(monitor) = self
            .monitors
            .lock()
            .expect("monitor registry mutex poisoned")
            .remove(instance_id)
        {
            monitor.stop();
        }
        let handle = self.get_handle(instance_id)?;
        let mut process = handle.lock().expect("process mutex poisoned");
        self.terminator.terminate(instance_id, &mut process)
    }

    pub fn stop_all(&self) {
        let ids: Vec<InstanceId> = self
            .processes
            .lock()
            .expect("registry mutex poisoned")
            .keys()
            .cloned()
            .collect();
        for id in ids {
            if let Err(err) = self.stop(&id) {
                tracing::warn!(instance_id = %id, %err, "failed to stop process during stop_all");
            }
        }
    }

    pub fn remove(&self, instance_id: &InstanceId) -> Result<(), SupervisorError> {
        if let Some(monitor) = self
            .monitors
            .lock()
            .expect("monitor registry mutex poisoned")
            .remove(instance_id)
        {
            monitor.stop();
        }
        self.processes
            .lock()
            .expect("registry mutex poisoned")
            .remove(instance_id)
            .map(|_| ())
            .ok_or_else(|| SupervisorError::NotRegistered(instance_id.clone()))
    }

    pub fn list(&self) -> Vec<InstanceId> {
        self.processes
            .lock()
            .expect("registry mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn state_of(&self, instance_id: &InstanceId) -> Result<ProcessState, SupervisorError> {
        let handle = self.get_handle(instance_id)?;
        Ok(handle.lock().expect("process mutex poisoned").state())
    }

    pub fn log_capture(&self) -> Option<&LogCapture> {
        self.log_capture.as_ref()
    }
}

fn port_in_use(port: u16) -> bool {
    std::net::TcpListener::bind(("0.0.0.0", port)).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_supervisor() -> ProcessSupervisor {
        let (publisher, _consumer) = crate::event::channel::pub_sub::<OrchestratorEvent>();
        ProcessSupervisor::new(None, publisher)
    }

    #[test]
    fn add_then_remove_roundtrips() {
        let supervisor = test_supervisor();
        let id = InstanceId::new("tor-1").unwrap();
        supervisor.add(id.clone()).unwrap();
        assert_eq!(supervisor.list(), vec![id.clone()]);
        supervisor.remove(&id).unwrap();
        assert!(supervisor.list().is_empty());
    }

    #[test]
    fn adding_twice_errors() {
        let supervisor = test_supervisor();
        let id = InstanceId::new("tor-1").unwrap();
        supervisor.add(id.clone()).unwrap();
        assert!(supervisor.add(id).is_err());
    }

    #[test]
    fn operating_on_unregistered_instance_errors() {
        let supervisor = test_supervisor();
        let id = InstanceId::new("tor-1").unwrap();
        assert!(supervisor.stop(&id).is_err());
        assert!(supervisor.remove(&id).is_err());
    }
}
