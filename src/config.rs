//! Orchestrator configuration: a `config` crate `ConfigBuilder` layering a
//! YAML file under environment variable overrides, deserialized into a
//! single typed struct. Duration fields use
//! `duration_str::deserialize_duration` so operators write `"10s"`/`"5m"`
//! in the config file rather than raw seconds.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use config::{builder::DefaultState, Config as ConfigRs, ConfigBuilder, Environment, File, FileFormat};
use duration_str::deserialize_duration;
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "ORCHESTRATOR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("loading configuration: {0}")]
    Load(#[from] config::ConfigError),
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data/services")
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("/data/orchestrator/state.db")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/orchestrator")
}

fn default_bind_ip() -> Ipv4Addr {
    Ipv4Addr::new(0, 0, 0, 0)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_stable_uptime() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_initial() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_max() -> Duration {
    Duration::from_secs(30)
}

fn default_log_rotation_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_cgroup_base_path() -> PathBuf {
    PathBuf::from("/sys/fs/cgroup/orchestrator")
}

fn default_memory_soft_cap_percent() -> u8 {
    90
}

fn default_memory_preflight_buffer_bytes() -> u64 {
    128 * 1024 * 1024
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_health_check_min_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_health_check_max_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_health_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_health_probe_concurrency() -> usize {
    16
}

fn default_health_failure_threshold() -> u32 {
    3
}

fn default_boot_layer_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_schedule_tick_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_socks5_handshake_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Top-level configuration, deserialized from a YAML file with environment
/// variable overrides of the form `ORCHESTRATOR_<FIELD>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub data_dir: PathBuf,
    pub sqlite_path: PathBuf,
    pub log_dir: PathBuf,
    pub default_bind_ip: Ipv4Addr,

    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_grace: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub stable_uptime: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub backoff_initial: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub backoff_max: Duration,

    pub log_rotation_bytes: u64,

    pub cgroup_base_path: PathBuf,
    pub memory_soft_cap_percent: u8,
    pub memory_preflight_buffer_bytes: u64,

    #[serde(deserialize_with = "deserialize_duration")]
    pub health_check_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub health_check_min_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub health_check_max_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub health_probe_timeout: Duration,
    pub health_probe_concurrency: usize,
    pub health_failure_threshold: u32,

    #[serde(deserialize_with = "deserialize_duration")]
    pub boot_layer_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub schedule_tick_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub socks5_handshake_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sqlite_path: default_sqlite_path(),
            log_dir: default_log_dir(),
            default_bind_ip: default_bind_ip(),
            shutdown_grace: default_shutdown_grace(),
            stable_uptime: default_stable_uptime(),
            backoff_initial: default_backoff_initial(),
            backoff_max: default_backoff_max(),
            log_rotation_bytes: default_log_rotation_bytes(),
            cgroup_base_path: default_cgroup_base_path(),
            memory_soft_cap_percent: default_memory_soft_cap_percent(),
            memory_preflight_buffer_bytes: default_memory_preflight_buffer_bytes(),
            health_check_interval: default_health_check_interval(),
            health_check_min_interval: default_health_check_min_interval(),
            health_check_max_interval: default_health_check_max_interval(),
            health_probe_timeout: default_health_probe_timeout(),
            health_probe_concurrency: default_health_probe_concurrency(),
            health_failure_threshold: default_health_failure_threshold(),
            boot_layer_timeout: default_boot_layer_timeout(),
            schedule_tick_interval: default_schedule_tick_interval(),
            socks5_handshake_timeout: default_socks5_handshake_timeout(),
        }
    }
}

/// Loads [`OrchestratorConfig`] from an optional YAML file layered under
/// `ORCHESTRATOR_*` environment variables. A missing file is tolerated but
/// a malformed one is reported, since silently discarding operator
/// overrides is worse than failing to start.
pub struct ConfigLoader {
    builder: ConfigBuilder<DefaultState>,
}

impl ConfigLoader {
    pub fn new(path: &std::path::Path) -> Self {
        let builder = ConfigRs::builder()
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Yaml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));
        Self { builder }
    }

    pub fn load(self) -> Result<OrchestratorConfig, ConfigError> {
        let built = self.builder.build()?;
        Ok(built.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.backoff_initial, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(30));
        assert_eq!(config.memory_soft_cap_percent, 90);
        assert_eq!(config.health_probe_concurrency, 16);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ConfigLoader::new(std::path::Path::new("/nonexistent/orchestrator.yaml"))
            .load()
            .unwrap();
        assert_eq!(config.data_dir, default_data_dir());
    }
}
