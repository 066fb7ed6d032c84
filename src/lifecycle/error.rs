use thiserror::Error;

use crate::model::ids::InstanceId;
use crate::model::instance::InstanceStatus;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("illegal transition for {instance_id}: {from} -> {to}")]
    IllegalTransition {
        instance_id: InstanceId,
        from: InstanceStatus,
        to: InstanceStatus,
    },
    #[error("instance {0} not found")]
    NotFound(InstanceId),
    #[error("instance {0} has no registered manifest for feature {1}")]
    MissingManifest(InstanceId, crate::model::ids::FeatureId),
    #[error("cannot stop {instance_id}: dependents still active: {dependents:?}")]
    DependentsActive {
        instance_id: InstanceId,
        dependents: Vec<InstanceId>,
    },
    #[error("isolation violation for {instance_id}: {message}")]
    IsolationViolation {
        instance_id: InstanceId,
        message: String,
    },
    #[error("insufficient memory to start {instance_id}: need {needed_bytes}, available {available_bytes}; candidates to free memory: {candidates:?}")]
    InsufficientMemory {
        instance_id: InstanceId,
        needed_bytes: u64,
        available_bytes: u64,
        candidates: Vec<InstanceId>,
    },
    #[error("dependency error: {0}")]
    Dependency(#[from] crate::dependency::DependencyError),
    #[error("supervisor error: {0}")]
    Supervisor(#[from] crate::supervisor::SupervisorError),
    #[error("resource error: {0}")]
    Resource(#[from] crate::resource::ResourceError),
    #[error("port error: {0}")]
    Port(#[from] crate::ports::PortError),
    #[error("deadline exceeded waiting for {instance_id} to reach {expected}")]
    Timeout {
        instance_id: InstanceId,
        expected: InstanceStatus,
    },
    #[error("dependency walk for {0} exceeded the maximum depth")]
    MaxDepthExceeded(InstanceId),
    #[error("SOCKS5 handshake with {0} did not succeed before the deadline")]
    Socks5HandshakeFailed(InstanceId),
}
