//! Resource Limiter and Poller: applies a cgroup v2 memory ceiling at
//! start time and samples actual usage thereafter.

pub mod error;
pub mod limiter;
pub mod poller;

pub use error::ResourceError;
pub use poller::ResourcePoller;
