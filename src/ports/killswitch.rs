//! `KillSwitchCoordinator` collaborator. Schedule activation and
//! deactivation route through this port in a strict order: deactivation
//! suspends *before* the schedule row is updated, activation resumes
//! after.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::model::ids::InstanceId;
use crate::ports::error::PortError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KillSwitchCoordinator: Send + Sync {
    async fn suspend(&self, instance_id: &InstanceId) -> Result<Vec<InstanceId>, PortError>;
    async fn resume(&self, instance_id: &InstanceId) -> Result<Vec<InstanceId>, PortError>;
    async fn is_suspended(&self, instance_id: &InstanceId) -> Result<bool, PortError>;
    async fn get_suspended_devices(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<InstanceId>, PortError>;
}
