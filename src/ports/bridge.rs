//! `BridgeOrchestrator` collaborator: `SetupBridge`,
//! `TeardownBridge`, `ReconcileOnStartup`.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::model::ids::InstanceId;
use crate::model::instance::Instance;
use crate::model::manifest::Manifest;
use crate::ports::error::PortError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BridgeOrchestrator: Send + Sync {
    async fn setup_bridge(&self, instance: &Instance, manifest: &Manifest) -> Result<(), PortError>;
    async fn teardown_bridge(&self, instance_id: &InstanceId) -> Result<(), PortError>;
    /// Called once at orchestrator startup to reconcile bridge state with
    /// whatever instances are found to still be running.
    async fn reconcile_on_startup(&self) -> Result<(), PortError>;
}
