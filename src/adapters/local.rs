//! No-op/local implementations of the ports that, in production, front a
//! real router device. Provisioning the router device itself is out of
//! scope; each adapter logs what a real implementation would do
//! and returns success, so `InstanceManager` can be exercised end to end
//! without a router attached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::model::ids::InstanceId;
use crate::model::instance::Instance;
use crate::model::manifest::Manifest;
use crate::ports::bridge::BridgeOrchestrator;
use crate::ports::error::PortError;
use crate::ports::gateway::Gateway;
use crate::ports::killswitch::KillSwitchCoordinator;
use crate::ports::router::RouterPort;

pub struct NullGateway;

#[async_trait]
impl Gateway for NullGateway {
    async fn start_gateway(&self, instance_id: &InstanceId) -> Result<(), PortError> {
        info!(%instance_id, "no gateway adapter configured, skipping gateway start");
        Ok(())
    }

    async fn stop_gateway(&self, instance_id: &InstanceId) -> Result<(), PortError> {
        info!(%instance_id, "no gateway adapter configured, skipping gateway stop");
        Ok(())
    }

    fn needs_gateway(&self, manifest: &Manifest, _mode: &str) -> bool {
        manifest.needs_gateway
    }
}

pub struct NullBridgeOrchestrator;

#[async_trait]
impl BridgeOrchestrator for NullBridgeOrchestrator {
    async fn setup_bridge(&self, instance: &Instance, _manifest: &Manifest) -> Result<(), PortError> {
        info!(instance_id = %instance.id, "no bridge adapter configured, skipping bridge setup");
        Ok(())
    }

    async fn teardown_bridge(&self, instance_id: &InstanceId) -> Result<(), PortError> {
        info!(%instance_id, "no bridge adapter configured, skipping bridge teardown");
        Ok(())
    }

    async fn reconcile_on_startup(&self) -> Result<(), PortError> {
        Ok(())
    }
}

/// Treats every instance as never suspended; a real coordinator persists
/// suspension state against the router's kill-switch hardware/firmware.
pub struct NullKillSwitchCoordinator;

#[async_trait]
impl KillSwitchCoordinator for NullKillSwitchCoordinator {
    async fn suspend(&self, instance_id: &InstanceId) -> Result<Vec<InstanceId>, PortError> {
        info!(%instance_id, "no kill-switch adapter configured, treating suspend as a no-op");
        Ok(vec![instance_id.clone()])
    }

    async fn resume(&self, instance_id: &InstanceId) -> Result<Vec<InstanceId>, PortError> {
        info!(%instance_id, "no kill-switch adapter configured, treating resume as a no-op");
        Ok(vec![instance_id.clone()])
    }

    async fn is_suspended(&self, _instance_id: &InstanceId) -> Result<bool, PortError> {
        Ok(false)
    }

    async fn get_suspended_devices(&self, _instance_id: &InstanceId) -> Result<Vec<InstanceId>, PortError> {
        Ok(Vec::new())
    }
}

/// Uses the orchestrator host's own system clock as the router clock.
/// The evaluator tolerates this stand-in when no router clock query is
/// wired up, logging drift rather than failing closed.
pub struct LocalRouterPort {
    router_id: String,
}

impl LocalRouterPort {
    pub fn new(router_id: String) -> Self {
        Self { router_id }
    }
}

#[async_trait]
impl RouterPort for LocalRouterPort {
    async fn current_time(&self) -> Result<DateTime<Utc>, PortError> {
        Ok(Utc::now())
    }

    async fn router_id(&self) -> Result<String, PortError> {
        Ok(self.router_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_router_port_reports_the_configured_id() {
        let router = LocalRouterPort::new("router-1".to_string());
        assert_eq!(router.router_id().await.unwrap(), "router-1");
    }

    #[tokio::test]
    async fn null_killswitch_reports_nothing_suspended() {
        let killswitch = NullKillSwitchCoordinator;
        let id = InstanceId::new("tor-1").unwrap();
        assert!(!killswitch.is_suspended(&id).await.unwrap());
    }
}
