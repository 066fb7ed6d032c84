//! Layer 3: ports. An instance's declared ports must be a
//! subset of the allocations recorded in the Port Registry.

use std::collections::HashSet;

use crate::isolation::report::{IsolationReport, Severity, Violation};

pub fn verify(declared_ports: &[u16], allocated_ports: &[u16], report: &mut IsolationReport) {
    let allocated: HashSet<u16> = allocated_ports.iter().copied().collect();
    let unallocated: Vec<u16> = declared_ports
        .iter()
        .copied()
        .filter(|port| !allocated.contains(port))
        .collect();

    if !unallocated.is_empty() {
        report.push(Violation {
            layer: "ports",
            severity: Severity::Error,
            affected_ports: unallocated.clone(),
            message: format!("declared ports {unallocated:?} are not allocated in the port registry"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_of_allocated_ports_passes() {
        let mut report = IsolationReport::default();
        verify(&[9050], &[9050, 9051], &mut report);
        assert!(!report.has_errors());
    }

    #[test]
    fn declared_port_missing_from_allocation_is_an_error() {
        let mut report = IsolationReport::default();
        verify(&[9050, 9999], &[9050], &mut report);
        assert!(report.has_errors());
        assert_eq!(report.first_error().unwrap().affected_ports, vec![9999]);
    }
}
