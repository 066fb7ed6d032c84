//! Layer 1: IP binding. Rejects instances with no declared
//! `bind_ip`, or one that is `0.0.0.0` or loopback.

use std::sync::OnceLock;

use regex::Regex;

use crate::isolation::report::{IsolationReport, Severity, Violation};
use crate::model::instance::Instance;

/// Matches a bare `0.0.0.0` or `127.x.x.x` literal inside a config value,
/// the same unroutable addresses `has_plausible_bind_ip` rejects for the
/// instance's own `bind_ip`. Catches a manifest that re-declares the
/// forbidden address inside a config string (e.g. a `listen_address`
/// override) instead of through the typed `bind_ip` field.
fn unroutable_addr_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(?:0\.0\.0\.0|127\.\d{1,3}\.\d{1,3}\.\d{1,3})\b").unwrap())
}

pub fn verify(instance: &Instance, report: &mut IsolationReport) {
    if !instance.has_plausible_bind_ip() {
        report.push(Violation {
            layer: "ip",
            severity: Severity::Error,
            affected_ports: vec![],
            message: format!(
                "bind_ip {} is unspecified or loopback, refusing to start",
                instance.bind_ip
            ),
        });
    }

    verify_config_payloads(instance, report);
}

/// Advanced validator: scans the instance's configuration values for a
/// re-declared unroutable address that would bypass the `bind_ip` check
/// above. Always a `Warning` — the config map is free-form key/value pairs
/// whose semantics this layer doesn't otherwise understand.
fn verify_config_payloads(instance: &Instance, report: &mut IsolationReport) {
    for (key, value) in &instance.config {
        if unroutable_addr_pattern().is_match(value) {
            report.push(Violation {
                layer: "ip",
                severity: Severity::Warning,
                affected_ports: vec![],
                message: format!(
                    "config key '{key}' references an unroutable address ({value}); verify this isn't meant to be bind_ip"
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{FeatureId, InstanceId};
    use crate::model::instance::{HealthSummary, InstanceStatus, VerificationInfo};
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    fn instance_with_ip(ip: Ipv4Addr) -> Instance {
        Instance {
            id: InstanceId::new("tor-1").unwrap(),
            feature_id: FeatureId::new("tor").unwrap(),
            name: "tor-1".to_string(),
            binary_path: "/data/services/tor/bin/tor".to_string(),
            binary_version: "0.4.8.9".to_string(),
            config: HashMap::new(),
            allocated_ports: vec![],
            allocated_vlan: None,
            bind_ip: ip,
            memory_limit_bytes: 0,
            router_id: "router-1".to_string(),
            status: InstanceStatus::Stopped,
            auto_start: false,
            auto_restart: false,
            verification: VerificationInfo::default(),
            health: HealthSummary::default(),
            unavailable_reason: None,
        }
    }

    #[test]
    fn valid_private_ip_passes() {
        let mut report = IsolationReport::default();
        verify(&instance_with_ip(Ipv4Addr::new(10, 0, 0, 5)), &mut report);
        assert!(!report.has_errors());
    }

    #[test]
    fn loopback_is_rejected() {
        let mut report = IsolationReport::default();
        verify(&instance_with_ip(Ipv4Addr::new(127, 0, 0, 1)), &mut report);
        assert!(report.has_errors());
    }
}
