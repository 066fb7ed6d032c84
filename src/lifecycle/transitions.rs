//! Fixed instance-lifecycle transition table. FSMs (process, instance,
//! health) are encoded as explicit transition tables, not ad-hoc
//! conditionals; illegal transitions return a typed error:
//!
//! ```text
//! Installing -> Installed -> Starting -> Running -> Stopping -> Stopped -> Deleting -> (removed)
//!                               |           |
//!                               +-- Failed -+  (may retry Start from Failed and Stopped)
//! ```

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::model::instance::InstanceStatus;

fn transition_table() -> &'static HashSet<(InstanceStatus, InstanceStatus)> {
    static TABLE: OnceLock<HashSet<(InstanceStatus, InstanceStatus)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        use InstanceStatus::*;
        HashSet::from([
            (Installing, Installed),
            (Installed, Starting),
            (Starting, Running),
            (Starting, Failed),
            (Running, Stopping),
            (Running, Failed),
            (Stopping, Stopped),
            (Stopping, Failed),
            (Stopped, Starting),
            (Failed, Starting),
            (Stopped, Deleting),
            (Installed, Deleting),
            (Failed, Deleting),
        ])
    })
}

pub fn is_legal(from: InstanceStatus, to: InstanceStatus) -> bool {
    transition_table().contains(&(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use InstanceStatus::*;

    #[test]
    fn happy_path_is_legal() {
        assert!(is_legal(Installing, Installed));
        assert!(is_legal(Installed, Starting));
        assert!(is_legal(Starting, Running));
        assert!(is_legal(Running, Stopping));
        assert!(is_legal(Stopping, Stopped));
    }

    #[test]
    fn retry_from_failed_and_stopped_is_legal() {
        assert!(is_legal(Failed, Starting));
        assert!(is_legal(Stopped, Starting));
    }

    #[test]
    fn skipping_states_is_illegal() {
        assert!(!is_legal(Installing, Running));
        assert!(!is_legal(Running, Installed));
    }

    #[test]
    fn deleting_only_from_terminal_states() {
        assert!(is_legal(Stopped, Deleting));
        assert!(is_legal(Installed, Deleting));
        assert!(is_legal(Failed, Deleting));
        assert!(!is_legal(Running, Deleting));
    }
}
