//! Feature manifest: static, version-pinned description of a service that
//! can be installed as one or more [`crate::model::instance::Instance`]s
//! for a feature.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::probe::ProbeConfig;
use crate::model::ids::FeatureId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub feature_id: FeatureId,
    pub display_name: String,
    pub version: String,
    pub binary_relpath: String,
    pub env: HashMap<String, String>,
    pub recommended_memory_bytes: u64,
    pub default_probe: ProbeConfig,
    /// When set, the feature requires a gateway/VPN-style routing path to
    /// function. Treated as the logical
    /// negation of the old `GatewayNotNeeded` flag from the boot manager's
    /// perspective; see DESIGN.md for the resolved Open Question.
    pub needs_gateway: bool,
    pub tags: Vec<String>,
    /// Dependencies expressed by feature id, consumed by
    /// [`crate::dependency::graph`] to compute instance start order.
    pub depends_on: Vec<FeatureId>,
    #[serde(with = "humantime_serde_secs")]
    pub default_health_check_interval: Duration,
    pub default_failure_threshold: u32,
}

mod humantime_serde_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_gateway_defaults_are_explicit_not_implied() {
        let manifest = Manifest {
            feature_id: FeatureId::new("wireguard").unwrap(),
            display_name: "WireGuard".to_string(),
            version: "1.0.0".to_string(),
            binary_relpath: "bin/wg-quick".to_string(),
            env: HashMap::new(),
            recommended_memory_bytes: 64 * 1024 * 1024,
            default_probe: ProbeConfig::None,
            needs_gateway: true,
            tags: vec!["vpn".to_string()],
            depends_on: vec![],
            default_health_check_interval: Duration::from_secs(10),
            default_failure_threshold: 3,
        };
        assert!(manifest.needs_gateway);
    }
}
