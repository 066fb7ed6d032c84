//! Process-level FSM tracked per managed child process, independent of the
//! instance-level FSM in [`crate::lifecycle`]. Both are encoded as
//! explicit transition tables rather than ad-hoc conditionals.
//!
//! States and transitions: `Stopped -> Starting -> Running`;
//! `Running -> Stopping -> Stopped`; on an unexpected exit,
//! `Running -> BackingOff -> Starting` when auto-restart applies, else
//! `Running -> Crashed`.

use std::collections::HashSet;
use std::time::SystemTime;

use crate::model::ids::InstanceId;
use crate::supervisor::command_os::{ExecutableSpec, SpawnedProcess};
use crate::supervisor::error::SupervisorError;
use crate::supervisor::log_capture::LogCapture;
use crate::supervisor::restart_policy::Backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
    BackingOff,
}

fn legal_transitions() -> HashSet<(ProcessState, ProcessState)> {
    use ProcessState::*;
    HashSet::from([
        (Stopped, Starting),
        (Starting, Running),
        (Starting, Crashed),
        (Running, Stopping),
        (Stopping, Stopped),
        (Running, BackingOff),
        (BackingOff, Starting),
        (Running, Crashed),
    ])
}

pub struct ManagedProcess {
    instance_id: InstanceId,
    state: ProcessState,
    process: Option<SpawnedProcess>,
    pub backoff: Backoff,
    pub started_at: Option<SystemTime>,
}

impl ManagedProcess {
    pub fn new(instance_id: InstanceId, backoff: Backoff) -> Self {
        Self {
            instance_id,
            state: ProcessState::Stopped,
            process: None,
            backoff,
            started_at: None,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(SpawnedProcess::pid)
    }

    fn transition(&mut self, to: ProcessState) -> Result<(), SupervisorError> {
        if self.state == to || legal_transitions().contains(&(self.state, to)) {
            self.state = to;
            Ok(())
        } else {
            Err(SupervisorError::IllegalTransition {
                instance_id: self.instance_id.clone(),
                from: self.state,
                to,
            })
        }
    }

    /// Spawns the OS process, transitioning `Stopped|BackingOff -> Starting
    /// -> Running` once the OS fork succeeds.
    pub fn start(
        &mut self,
        spec: &ExecutableSpec,
        log_capture: Option<LogCapture>,
    ) -> Result<(), SupervisorError> {
        self.transition(ProcessState::Starting)?;
        let spawned = match SpawnedProcess::spawn(self.instance_id.clone(), spec, log_capture) {
            Ok(spawned) => spawned,
            Err(err) => {
                self.transition(ProcessState::Crashed).ok();
                return Err(err);
            }
        };
        self.process = Some(spawned);
        self.started_at = Some(SystemTime::now());
        self.transition(ProcessState::Running)
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.state, ProcessState::Running)
            && self
                .process
                .as_mut()
                .map(SpawnedProcess::is_running)
                .unwrap_or(false)
    }

    /// Non-blocking check for an unexpected exit while still `Running`.
    /// Returns `None` if the process is still alive or isn't in a state
    /// where exiting would be unexpected.
    pub fn poll_unexpected_exit(&mut self) -> Option<std::process::ExitStatus> {
        if self.state != ProcessState::Running {
            return None;
        }
        self.process.as_mut().and_then(SpawnedProcess::poll_exit)
    }

    /// Records an unexpected exit. Moves to `BackingOff` when the caller
    /// intends to retry, else `Crashed`.
    pub fn mark_crashed(&mut self, will_restart: bool) -> Result<(), SupervisorError> {
        self.process = None;
        let target = if will_restart {
            ProcessState::BackingOff
        } else {
            ProcessState::Crashed
        };
        self.transition(target)
    }

    /// After a backoff sleep, reopens the door to another `start()` call.
    pub fn begin_restart(&mut self) -> Result<(), SupervisorError> {
        self.transition(ProcessState::Starting)
    }

    pub fn request_shutdown(&mut self) -> Result<(), SupervisorError> {
        self.transition(ProcessState::Stopping)?;
        if let Some(process) = self.process.as_mut() {
            process.shutdown()?;
        }
        Ok(())
    }

    pub fn mark_stopped(&mut self) -> Result<(), SupervisorError> {
        self.process = None;
        self.transition(ProcessState::Stopped)
    }

    pub fn wait(self) -> Result<std::process::ExitStatus, SupervisorError> {
        let process = self
            .process
            .ok_or_else(|| SupervisorError::NotRegistered(self.instance_id.clone()))?;
        process.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_to_running_is_legal_running_to_running_is_idempotent() {
        let mut process = ManagedProcess::new(InstanceId::new("tor-1").unwrap(), Backoff::default());
        assert_eq!(process.state(), ProcessState::Stopped);
        process.transition(ProcessState::Starting).unwrap();
        process.transition(ProcessState::Running).unwrap();
        process.transition(ProcessState::Running).unwrap();
        assert_eq!(process.state(), ProcessState::Running);
    }

    #[test]
    fn stopped_to_crashed_is_illegal() {
        let mut process = ManagedProcess::new(InstanceId::new("tor-1").unwrap(), Backoff::default());
        assert!(process.transition(ProcessState::Crashed).is_err());
    }

    #[test]
    fn crash_with_restart_goes_to_backing_off_then_starting() {
        let mut process = ManagedProcess::new(InstanceId::new("tor-1").unwrap(), Backoff::default());
        process.transition(ProcessState::Starting).unwrap();
        process.transition(ProcessState::Running).unwrap();
        process.mark_crashed(true).unwrap();
        assert_eq!(process.state(), ProcessState::BackingOff);
        process.begin_restart().unwrap();
        assert_eq!(process.state(), ProcessState::Starting);
    }

    #[test]
    fn crash_without_restart_goes_to_crashed_terminal_state() {
        let mut process = ManagedProcess::new(InstanceId::new("tor-1").unwrap(), Backoff::default());
        process.transition(ProcessState::Starting).unwrap();
        process.transition(ProcessState::Running).unwrap();
        process.mark_crashed(false).unwrap();
        assert_eq!(process.state(), ProcessState::Crashed);
        assert!(process.transition(ProcessState::Starting).is_err());
    }
}
