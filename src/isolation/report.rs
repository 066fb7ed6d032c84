//! Isolation verification report: an ordered list of violations produced
//! by walking the four layers. Each violation is tagged
//! `Error` (aborts the start) or `Warning` (logged, never blocks).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub layer: &'static str,
    pub severity: Severity,
    pub affected_ports: Vec<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct IsolationReport {
    pub violations: Vec<Violation>,
}

impl IsolationReport {
    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn has_errors(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == Severity::Error)
    }

    pub fn first_error(&self) -> Option<&Violation> {
        self.violations
            .iter()
            .find(|v| v.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_alone_do_not_count_as_errors() {
        let mut report = IsolationReport::default();
        report.push(Violation {
            layer: "process_binding",
            severity: Severity::Warning,
            affected_ports: vec![],
            message: "another process may hold this IP".to_string(),
        });
        assert!(!report.has_errors());
        assert!(report.first_error().is_none());
    }

    #[test]
    fn an_error_is_reported_as_the_first_error() {
        let mut report = IsolationReport::default();
        report.push(Violation {
            layer: "ip",
            severity: Severity::Error,
            affected_ports: vec![],
            message: "bind_ip is loopback".to_string(),
        });
        assert!(report.has_errors());
        assert_eq!(report.first_error().unwrap().layer, "ip");
    }
}
