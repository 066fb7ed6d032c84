use thiserror::Error;

use crate::model::ids::InstanceId;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("dependency cycle detected: {}", .0.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(" -> "))]
    Cycle(Vec<InstanceId>),
    #[error("instance {0} declares a dependency on unknown instance {1}")]
    UnknownDependency(InstanceId, InstanceId),
}
