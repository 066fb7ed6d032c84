//! The persistent `Instance` record and its lifecycle status.

use std::collections::HashMap;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::health::probe::ProbeConfig;
use crate::model::ids::{FeatureId, InstanceId};

/// Lifecycle status of an [`Instance`], driven exclusively by
/// `lifecycle::manager::InstanceManager`. See `lifecycle::transitions` for
/// the legal-transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceStatus {
    Installing,
    Installed,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
    Deleting,
}

impl Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceStatus::Installing => "installing",
            InstanceStatus::Installed => "installed",
            InstanceStatus::Starting => "starting",
            InstanceStatus::Running => "running",
            InstanceStatus::Stopping => "stopping",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Failed => "failed",
            InstanceStatus::Deleting => "deleting",
        };
        write!(f, "{s}")
    }
}

impl InstanceStatus {
    /// Statuses from which `DeleteInstance` is legal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InstanceStatus::Stopped | InstanceStatus::Installed | InstanceStatus::Failed
        )
    }

    /// Statuses for which a live [`crate::supervisor::process::ManagedProcess`]
    /// must exist.
    pub fn expects_live_process(self) -> bool {
        matches!(
            self,
            InstanceStatus::Starting | InstanceStatus::Running | InstanceStatus::Stopping
        )
    }
}

/// Verification metadata populated by the (external) download/verification
/// pipeline; the orchestrator only re-checks these fields at start time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationInfo {
    pub archive_hash: Option<String>,
    pub binary_hash: Option<String>,
    pub gpg_key_id: Option<String>,
    pub checksums_url: Option<String>,
    pub verified_at: Option<SystemTime>,
}

/// Summary of the instance's current health, mirrored into the `Instance`
/// record on every transition so it survives an orchestrator restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub state: crate::health::state::HealthStateKind,
    pub consecutive_failures: u32,
    pub last_latency_millis: Option<u64>,
    pub last_healthy_at: Option<SystemTime>,
    pub probe: ProbeConfig,
}

impl Default for HealthSummary {
    fn default() -> Self {
        Self {
            state: crate::health::state::HealthStateKind::Unknown,
            consecutive_failures: 0,
            last_latency_millis: None,
            last_healthy_at: None,
            probe: ProbeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub feature_id: FeatureId,
    pub name: String,
    pub binary_path: String,
    pub binary_version: String,
    pub config: HashMap<String, String>,
    pub allocated_ports: Vec<u16>,
    pub allocated_vlan: Option<u16>,
    pub bind_ip: Ipv4Addr,
    pub memory_limit_bytes: u64,
    pub router_id: String,
    pub status: InstanceStatus,
    pub auto_start: bool,
    /// Whether an unexpected process exit should be retried with backoff,
    /// and whether a sustained unhealthy probe should trigger a
    /// `RestartRequest`.
    pub auto_restart: bool,
    pub verification: VerificationInfo,
    pub health: HealthSummary,
    pub unavailable_reason: Option<String>,
}

impl Instance {
    /// Returns `false` for the reserved non-routable addresses the
    /// isolation verifier's IP layer rejects outright.
    pub fn has_plausible_bind_ip(&self) -> bool {
        !self.bind_ip.is_unspecified() && !self.bind_ip.is_loopback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Instance {
        Instance {
            id: InstanceId::new("tor-1").unwrap(),
            feature_id: FeatureId::new("tor").unwrap(),
            name: "tor-1".to_string(),
            binary_path: "/data/services/tor/bin/tor".to_string(),
            binary_version: "0.4.8.9".to_string(),
            config: HashMap::new(),
            allocated_ports: vec![9050],
            allocated_vlan: Some(42),
            bind_ip: "10.10.0.5".parse().unwrap(),
            memory_limit_bytes: 256 * 1024 * 1024,
            router_id: "router-1".to_string(),
            status: InstanceStatus::Stopped,
            auto_start: true,
            auto_restart: true,
            verification: VerificationInfo::default(),
            health: HealthSummary::default(),
            unavailable_reason: None,
        }
    }

    #[test]
    fn terminal_statuses_allow_delete() {
        let mut i = sample();
        for terminal in [
            InstanceStatus::Stopped,
            InstanceStatus::Installed,
            InstanceStatus::Failed,
        ] {
            i.status = terminal;
            assert!(i.status.is_terminal());
        }
        i.status = InstanceStatus::Running;
        assert!(!i.status.is_terminal());
    }

    #[test]
    fn loopback_and_unspecified_bind_ips_are_rejected() {
        let mut i = sample();
        i.bind_ip = Ipv4Addr::new(127, 0, 0, 1);
        assert!(!i.has_plausible_bind_ip());
        i.bind_ip = Ipv4Addr::new(0, 0, 0, 0);
        assert!(!i.has_plausible_bind_ip());
        i.bind_ip = Ipv4Addr::new(10, 0, 0, 1);
        assert!(i.has_plausible_bind_ip());
    }
}
