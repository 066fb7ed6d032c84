//! OS process spawn/stream/signal primitives. Uses a single
//! `SpawnedProcess` type with logging setup passed as a constructor
//! argument rather than encoded as separate typestates.

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use crate::model::ids::InstanceId;
use crate::supervisor::error::SupervisorError;
use crate::supervisor::log_capture::LogCapture;

#[derive(Clone)]
pub struct ExecutableSpec {
    pub binary_path: PathBuf,
    pub args: Vec<String>,
    pub env: std::collections::HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub shutdown_timeout: Duration,
}

pub struct SpawnedProcess {
    instance_id: InstanceId,
    child: Child,
    shutdown_timeout: Duration,
}

impl SpawnedProcess {
    pub fn spawn(
        instance_id: InstanceId,
        spec: &ExecutableSpec,
        log_capture: Option<LogCapture>,
    ) -> Result<Self, SupervisorError> {
        let mut cmd = Command::new(&spec.binary_path);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            instance_id: instance_id.clone(),
            source,
        })?;

        if let Some(capture) = log_capture {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| SupervisorError::StreamPipe(instance_id.clone()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| SupervisorError::StreamPipe(instance_id.clone()))?;
            capture.spawn_readers(instance_id.clone(), stdout, stderr);
        }

        Ok(Self {
            instance_id,
            child,
            shutdown_timeout: spec.shutdown_timeout,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn is_running(&mut self) -> bool {
        self.child.try_wait().is_ok_and(|status| status.is_none())
    }

    /// Non-blocking exit check, returning the exit status once the child has
    /// actually terminated. Used by the crash monitor to poll without ever
    /// holding a process lock across a blocking `wait()`.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    pub fn wait(mut self) -> Result<ExitStatus, SupervisorError> {
        self.child
            .wait()
            .map_err(|source| SupervisorError::Wait {
                instance_id: self.instance_id.clone(),
                source,
            })
    }

    #[cfg(unix)]
    pub fn shutdown(&mut self) -> Result<(), SupervisorError> {
        use nix::sys::signal;
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.child.id() as i32);
        let graceful = signal::kill(pid, signal::Signal::SIGTERM);

        if graceful.is_err() || self.is_running_after_timeout(self.shutdown_timeout) {
            self.child
                .kill()
                .map_err(|source| SupervisorError::Wait {
                    instance_id: self.instance_id.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn shutdown(&mut self) -> Result<(), SupervisorError> {
        self.child
            .kill()
            .map_err(|source| SupervisorError::Wait {
                instance_id: self.instance_id.clone(),
                source,
            })
    }

    fn is_running_after_timeout(&mut self, timeout: Duration) -> bool {
        const POLL_INTERVAL: Duration = Duration::from_millis(100);
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.is_running() {
                std::thread::sleep(POLL_INTERVAL);
            } else {
                return false;
            }
        }
        true
    }
}
