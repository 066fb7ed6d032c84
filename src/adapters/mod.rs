//! Local/standalone implementations of the external collaborator ports.
//! Router provisioning, UI, and notification channels are all out of
//! scope here. These are the seam a real router-management backend plugs
//! concrete Gateway/Bridge/KillSwitch/Router adapters into; the host
//! binary wires these local ones so the orchestrator runs standalone for
//! development and for end-to-end scenarios that don't depend on a real
//! router.

pub mod file_registry;
pub mod local;

pub use file_registry::FileRegistry;
pub use local::{LocalRouterPort, NullBridgeOrchestrator, NullGateway, NullKillSwitchCoordinator};
