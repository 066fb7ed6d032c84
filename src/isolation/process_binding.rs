//! Layer 4: process binding: best-effort check that no
//! other process already holds the instance's `bind_ip`. Always produces a
//! `Warning`, never blocks the start.

use std::net::{Ipv4Addr, TcpListener};

use crate::isolation::report::{IsolationReport, Severity, Violation};

pub fn verify(bind_ip: Ipv4Addr, report: &mut IsolationReport) {
    if TcpListener::bind((bind_ip, 0)).is_err() {
        report.push(Violation {
            layer: "process_binding",
            severity: Severity::Warning,
            affected_ports: vec![],
            message: format!("bind_ip {bind_ip} may already be held by another process"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindable_address_produces_no_violation() {
        let mut report = IsolationReport::default();
        verify(Ipv4Addr::new(127, 0, 0, 1), &mut report);
        assert!(report.violations.is_empty() || !report.has_errors());
    }

    #[test]
    fn violation_is_warning_not_error() {
        let mut report = IsolationReport::default();
        report.push(crate::isolation::report::Violation {
            layer: "process_binding",
            severity: Severity::Warning,
            affected_ports: vec![],
            message: "test".to_string(),
        });
        assert!(!report.has_errors());
    }
}
