use thiserror::Error;

use crate::model::ids::InstanceId;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to write cgroup file {path}: {source}")]
    CgroupWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create cgroup directory {path}: {source}")]
    CgroupCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cgroup v2 is not available on this host")]
    CgroupV2Unavailable,
    #[error("no resource sample available yet for {0}")]
    NoSample(InstanceId),
}
