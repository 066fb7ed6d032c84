//! Small, independently-tested shared utilities used by more than one
//! component.

pub mod cancellation;
pub mod error_group;
pub mod thread_context;
pub mod threads;
