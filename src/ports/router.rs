//! `RouterPort` collaborator: command/state queries against the managed
//! router device itself. Router provisioning is an explicit
//! non-goal; this port only exposes the read/command surface the
//! orchestrator needs (router clock, for schedule evaluation).

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ports::error::PortError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RouterPort: Send + Sync {
    /// The router's own view of the current time, which may drift from the
    /// orchestrator host's clock. Schedule evaluation proceeds using this
    /// value even when it looks anomalous, logging a warning rather than
    /// failing closed (see DESIGN.md, Open Question resolution).
    async fn current_time(&self) -> Result<DateTime<Utc>, PortError>;
    async fn router_id(&self) -> Result<String, PortError>;
}
