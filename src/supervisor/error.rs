use thiserror::Error;

use crate::model::ids::InstanceId;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn process for {instance_id}: {source}")]
    Spawn {
        instance_id: InstanceId,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to capture stdout/stderr pipe for {0}")]
    StreamPipe(InstanceId),
    #[error("io error waiting on process for {instance_id}: {source}")]
    Wait {
        instance_id: InstanceId,
        #[source]
        source: std::io::Error,
    },
    #[error("process signal error for {instance_id}: {message}")]
    Signal {
        instance_id: InstanceId,
        message: String,
    },
    #[error("port {port} is already bound, cannot start {instance_id}")]
    PortUnavailable { instance_id: InstanceId, port: u16 },
    #[error("no process registered for instance {0}")]
    NotRegistered(InstanceId),
    #[error("instance {0} is already registered")]
    AlreadyRegistered(InstanceId),
    #[error("illegal process transition for {instance_id}: {from:?} -> {to:?}")]
    IllegalTransition {
        instance_id: InstanceId,
        from: crate::supervisor::process::ProcessState,
        to: crate::supervisor::process::ProcessState,
    },
}
