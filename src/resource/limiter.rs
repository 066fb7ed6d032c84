//! Linux cgroup v2 memory limiting: raw
//! `memory.max`/`memory.high`/`cgroup.procs` filesystem writes under
//! `/sys/fs/cgroup`, with a rootless fallback under the user's systemd
//! service scope.
//!
//! Only memory limiting is implemented; CPU weight/quota and pids.max are
//! out of scope (see DESIGN.md). When cgroup v2 isn't available
//! (non-Linux, or no permissions), the limiter degrades to a no-op and
//! limits are only enforced by the [`crate::resource::poller::ResourcePoller`] sampling
//! loop instead.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::model::ids::InstanceId;
use crate::resource::error::ResourceError;

const CGROUP_ROOT: &str = "/sys/fs/cgroup";
const GROUP_NAME: &str = "service-instance-orchestrator";

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn is_root() -> bool {
            unsafe { libc::getuid() == 0 }
        }

        fn user_cgroup_base() -> Option<PathBuf> {
            let uid = unsafe { libc::getuid() };
            let path = PathBuf::from(format!(
                "/sys/fs/cgroup/user.slice/user-{uid}.slice/user@{uid}.service"
            ));
            path.exists().then_some(path)
        }
    } else {
        fn is_root() -> bool {
            false
        }

        fn user_cgroup_base() -> Option<PathBuf> {
            None
        }
    }
}

fn cgroup_base() -> PathBuf {
    if is_root() {
        PathBuf::from(CGROUP_ROOT)
    } else {
        user_cgroup_base().unwrap_or_else(|| PathBuf::from(CGROUP_ROOT))
    }
}

/// Available system memory, used by the Instance Manager's pre-flight
/// memory check before starting a new process.
pub fn available_system_memory_bytes() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.available_memory()
}

pub fn is_cgroup_v2_available() -> bool {
    let root = Path::new(CGROUP_ROOT);
    root.exists() && root.join("cgroup.controllers").exists()
}

pub fn cgroup_path(instance_id: &InstanceId) -> PathBuf {
    cgroup_base().join(GROUP_NAME).join(instance_id.as_str())
}

/// Creates (or reuses) a cgroup for `instance_id` and applies
/// `memory_limit_bytes` as `memory.max`, with `memory.high` set to 90% of
/// the limit as an early throttle threshold. Returns `Ok(None)` rather than
/// erroring when cgroup v2 isn't available, so callers can fall back to
/// poller-only enforcement without treating it as a hard failure.
pub fn apply_memory_limit(
    instance_id: &InstanceId,
    memory_limit_bytes: u64,
) -> Result<Option<PathBuf>, ResourceError> {
    if !is_cgroup_v2_available() {
        warn!(%instance_id, "cgroup v2 unavailable, falling back to poller-only memory limiting");
        return Ok(None);
    }

    let group_base = cgroup_base().join(GROUP_NAME);
    if !group_base.exists() {
        create_dir(&group_base)?;
        write_file(&group_base.join("cgroup.subtree_control"), "+memory")?;
    }

    let instance_cgroup = cgroup_path(instance_id);
    if !instance_cgroup.exists() {
        create_dir(&instance_cgroup)?;
    }

    write_file(
        &instance_cgroup.join("memory.max"),
        &memory_limit_bytes.to_string(),
    )?;
    write_file(
        &instance_cgroup.join("memory.high"),
        &(memory_limit_bytes * 9 / 10).to_string(),
    )?;

    debug!(%instance_id, path = %instance_cgroup.display(), "applied cgroup memory limit");
    Ok(Some(instance_cgroup))
}

pub fn add_process(instance_id: &InstanceId, pid: u32) -> Result<(), ResourceError> {
    if !is_cgroup_v2_available() {
        return Ok(());
    }
    write_file(&cgroup_path(instance_id).join("cgroup.procs"), &pid.to_string())
}

pub fn remove_cgroup(instance_id: &InstanceId) -> Result<(), ResourceError> {
    let path = cgroup_path(instance_id);
    if path.exists() {
        fs::remove_dir(&path).map_err(|source| ResourceError::CgroupWrite {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), ResourceError> {
    fs::create_dir(path).map_err(|source| ResourceError::CgroupCreate {
        path: path.display().to_string(),
        source,
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), ResourceError> {
    fs::write(path, content).map_err(|source| ResourceError::CgroupWrite {
        path: path.display().to_string(),
        source,
    })
}
