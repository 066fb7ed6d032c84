//! `Gateway` collaborator: `StartGateway`, `StopGateway`,
//! `NeedsGateway(manifest, mode)`.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::model::ids::InstanceId;
use crate::model::manifest::Manifest;
use crate::ports::error::PortError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn start_gateway(&self, instance_id: &InstanceId) -> Result<(), PortError>;
    async fn stop_gateway(&self, instance_id: &InstanceId) -> Result<(), PortError>;

    /// Whether `manifest` requires a gateway/VPN-style routing path under
    /// the given mode. `mode` is a deployment-specific discriminator (e.g.
    /// "bridged" vs "routed") the concrete adapter interprets; the
    /// orchestrator core treats this purely as a boolean gate.
    fn needs_gateway(&self, manifest: &Manifest, mode: &str) -> bool;
}
