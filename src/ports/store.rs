//! The `Store` collaborator: strongly typed CRUD plus the transactional
//! cascade-delete path, expressed as an object-safe `async_trait` over the
//! orchestrator's full relational shape: instances, dependency edges,
//! port/VLAN allocations and routing schedules.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::model::allocation::{PortAllocation, VlanAllocation};
use crate::model::instance::Instance;
use crate::model::ids::InstanceId;
use crate::model::schedule::{RoutingId, RoutingSchedule};
use crate::ports::error::PortError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub dependent: InstanceId,
    pub dependency: InstanceId,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_instance(&self, id: &InstanceId) -> Result<Option<Instance>, PortError>;
    async fn list_instances(&self) -> Result<Vec<Instance>, PortError>;
    async fn put_instance(&self, instance: &Instance) -> Result<(), PortError>;

    async fn list_dependencies(&self) -> Result<Vec<DependencyEdge>, PortError>;
    async fn put_dependency(&self, edge: &DependencyEdge) -> Result<(), PortError>;
    /// Removes a single dependency edge.
    /// A no-op, not an error, if the edge doesn't exist.
    async fn delete_dependency(&self, edge: &DependencyEdge) -> Result<(), PortError>;

    async fn list_port_allocations(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<PortAllocation>, PortError>;
    async fn list_vlan_allocations(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<VlanAllocation>, PortError>;

    async fn get_schedule(&self, id: &RoutingId) -> Result<Option<RoutingSchedule>, PortError>;
    async fn list_schedules(&self) -> Result<Vec<RoutingSchedule>, PortError>;
    async fn put_schedule(&self, schedule: &RoutingSchedule) -> Result<(), PortError>;

    /// Deletes the instance row, every dependency edge referencing it (in
    /// either direction), and every port/VLAN allocation row for it, all in
    /// a single transaction.
    async fn delete_instance_cascade(&self, id: &InstanceId) -> Result<(), PortError>;
}
