//! Graceful-then-forceful process termination helper, pulled out of
//! [`crate::supervisor::process::ManagedProcess`] so the strict shutdown
//! phase ordering can be driven uniformly from the supervisor registry.

use std::time::Duration;

use tracing::{info, warn};

use crate::model::ids::InstanceId;
use crate::supervisor::error::SupervisorError;
use crate::supervisor::process::ManagedProcess;

pub struct ProcessTerminator {
    pub grace_period: Duration,
}

impl Default for ProcessTerminator {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(10),
        }
    }
}

impl ProcessTerminator {
    /// Sends a graceful shutdown signal and marks the process terminated.
    /// The actual wait-with-timeout-then-kill behavior lives in
    /// `SpawnedProcess::shutdown`; this wrapper only sequences the FSM
    /// transitions and logs the outcome for the instance manager.
    pub fn terminate(
        &self,
        instance_id: &InstanceId,
        process: &mut ManagedProcess,
    ) -> Result<(), SupervisorError> {
        info!(%instance_id, "requesting process shutdown");
        match process.request_shutdown() {
            Ok(()) => {
                process.mark_stopped()?;
                Ok(())
            }
            Err(err) => {
                warn!(%instance_id, %err, "shutdown request failed");
                Err(err)
            }
        }
    }
}
