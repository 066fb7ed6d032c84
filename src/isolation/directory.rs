//! Layer 2: directory/binary checks. The binary path must
//! exist, must not be a symlink, must resolve beneath an allowed base
//! directory, and its parent directory's permissions must be no looser
//! than `0o750`.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::isolation::report::{IsolationReport, Severity, Violation};

const MAX_PARENT_MODE: u32 = 0o750;

pub fn verify(binary_path: &str, allowed_base: &Path, report: &mut IsolationReport) {
    let path = Path::new(binary_path);

    let symlink_metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            report.push(Violation {
                layer: "directory",
                severity: Severity::Error,
                affected_ports: vec![],
                message: format!("binary path {binary_path} does not exist: {err}"),
            });
            return;
        }
    };

    if symlink_metadata.file_type().is_symlink() {
        report.push(Violation {
            layer: "directory",
            severity: Severity::Error,
            affected_ports: vec![],
            message: format!("binary path {binary_path} is a symlink, refusing to start"),
        });
        return;
    }

    let canonical = match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(err) => {
            report.push(Violation {
                layer: "directory",
                severity: Severity::Error,
                affected_ports: vec![],
                message: format!("could not resolve binary path {binary_path}: {err}"),
            });
            return;
        }
    };

    if !canonical.starts_with(allowed_base) {
        report.push(Violation {
            layer: "directory",
            severity: Severity::Error,
            affected_ports: vec![],
            message: format!(
                "binary path {} lies outside allowed base {}",
                canonical.display(),
                allowed_base.display()
            ),
        });
        return;
    }

    let Some(parent) = canonical.parent() else {
        return;
    };
    match std::fs::metadata(parent) {
        Ok(metadata) => {
            let mode = metadata.permissions().mode() & 0o777;
            if mode & !MAX_PARENT_MODE != 0 {
                report.push(Violation {
                    layer: "directory",
                    severity: Severity::Error,
                    affected_ports: vec![],
                    message: format!(
                        "parent directory {} has permissions {:o}, looser than required {:o}",
                        parent.display(),
                        mode,
                        MAX_PARENT_MODE
                    ),
                });
            }
        }
        Err(err) => {
            report.push(Violation {
                layer: "directory",
                severity: Severity::Error,
                affected_ports: vec![],
                message: format!("could not stat parent directory {}: {err}", parent.display()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;

    #[test]
    fn missing_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = IsolationReport::default();
        verify(
            dir.path().join("missing").to_str().unwrap(),
            dir.path(),
            &mut report,
        );
        assert!(report.has_errors());
    }

    #[test]
    fn symlinked_binary_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real-binary");
        fs::write(&real, b"#!/bin/sh\n").unwrap();
        let link = dir.path().join("linked-binary");
        symlink(&real, &link).unwrap();

        let mut report = IsolationReport::default();
        verify(link.to_str().unwrap(), dir.path(), &mut report);
        assert!(report.has_errors());
    }

    #[test]
    fn binary_outside_allowed_base_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let binary = other.path().join("binary");
        fs::write(&binary, b"#!/bin/sh\n").unwrap();

        let mut report = IsolationReport::default();
        verify(binary.to_str().unwrap(), dir.path(), &mut report);
        assert!(report.has_errors());
    }

    #[test]
    fn properly_permissioned_binary_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o750)).unwrap();
        let binary = dir.path().join("binary");
        fs::write(&binary, b"#!/bin/sh\n").unwrap();

        let mut report = IsolationReport::default();
        verify(binary.to_str().unwrap(), dir.path(), &mut report);
        assert!(!report.has_errors());
    }
}
