//! `EventBus` collaborator: `Publish`, `Subscribe`, `Close`.
//!
//! The orchestrator's own event fan-out (see [`crate::event::broadcaster`])
//! is in-process and synchronous; this port is the seam through which those
//! events reach an external bus (a message queue, a UI push channel) without
//! the core depending on any concrete transport.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::event::OrchestratorEvent;
use crate::ports::error::PortError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: OrchestratorEvent) -> Result<(), PortError>;
    async fn close(&self) -> Result<(), PortError>;
}
