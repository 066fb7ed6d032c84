//! Service instance lifecycle orchestrator for router-managed proxy/VPN/
//! relay binaries.
//!
//! The crate is organized as a small core (`model`, `ports`) surrounded by
//! the collaborators that drive an instance end to end: a process
//! supervisor, an isolation verifier, a resource limiter, a dependency
//! manager, an instance manager tying them together, health monitoring, a
//! boot sequencer and a schedule evaluator. Everything the core touches
//! outside the process itself (persistence, routing, health checks over
//! the network, event delivery) goes through a `ports` trait so the
//! orchestrator can be exercised against fakes in tests and wired to real
//! collaborators in `bin/main.rs`.

pub mod adapters;
pub mod boot;
pub mod config;
pub mod dependency;
pub mod event;
pub mod health;
pub mod isolation;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod ports;
pub mod resource;
pub mod schedule;
pub mod store;
pub mod supervisor;
pub mod util;
