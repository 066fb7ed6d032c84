use thiserror::Error;

use crate::model::ids::InstanceId;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("no health state registered for instance {0}")]
    UnknownInstance(InstanceId),
    #[error("restart request channel is full, dropping request for {0}")]
    RestartQueueFull(InstanceId),
}
