//! Data model shared across every module of the orchestrator: identifiers,
//! the `Instance`/`Manifest` records, allocation records and routing
//! schedules. None of these types own side effects; all I/O goes through
//! the `ports` traits.

pub mod allocation;
pub mod ids;
pub mod instance;
pub mod manifest;
pub mod schedule;

pub use ids::{FeatureId, InstanceId, InvalidIdentifier};
