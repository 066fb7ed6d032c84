//! External collaborator ports. The orchestrator core only ever depends on
//! these traits, never on a concrete transport, database engine, or
//! router-control implementation.

pub mod bridge;
pub mod downloader;
pub mod error;
pub mod event_bus;
pub mod gateway;
pub mod killswitch;
pub mod registry;
pub mod router;
pub mod store;

pub use bridge::BridgeOrchestrator;
pub use downloader::Downloader;
pub use error::PortError;
pub use event_bus::EventBus;
pub use gateway::Gateway;
pub use killswitch::KillSwitchCoordinator;
pub use registry::Registry;
pub use router::RouterPort;
pub use store::Store;
