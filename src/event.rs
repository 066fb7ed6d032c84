//! Event taxonomy published to the [`crate::ports::event_bus::EventBus`] port.
//!
//! Names are stable, documented strings
//! (`service.state_changed`, `service.crashed`, `health.changed`, ...): each
//! variant's [`OrchestratorEvent::name`] returns exactly that string so
//! collaborators and tests can match on it without reflecting over the enum.

pub mod broadcaster;
pub mod channel;

use std::collections::HashMap;

use crate::health::state::HealthStateKind;
use crate::model::ids::InstanceId;
use crate::model::instance::InstanceStatus;
use crate::model::schedule::RoutingId;

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    ServiceStateChanged {
        instance_id: InstanceId,
        previous: InstanceStatus,
        current: InstanceStatus,
    },
    ServiceCrashed {
        instance_id: InstanceId,
        exit_code: Option<i32>,
        restart_count: u32,
        next_backoff_secs: u64,
        will_restart: bool,
    },
    HealthChanged {
        instance_id: InstanceId,
        previous: HealthStateKind,
        current: HealthStateKind,
    },
    IsolationViolation {
        instance_id: InstanceId,
        violation_kind: String,
        affected_ports: Vec<u16>,
        message: String,
    },
    ResourceWarning {
        instance_id: InstanceId,
        usage_bytes: u64,
        limit_bytes: u64,
    },
    ResourceCritical {
        instance_id: InstanceId,
        usage_bytes: u64,
        limit_bytes: u64,
    },
    ResourceLimitExceeded {
        instance_id: InstanceId,
        usage_bytes: u64,
        limit_bytes: u64,
    },
    BootSequenceStarted {
        layer_count: usize,
    },
    BootSequenceLayerComplete {
        layer_index: usize,
        instance_ids: Vec<InstanceId>,
    },
    BootSequenceCompleted {
        started: Vec<InstanceId>,
    },
    BootSequenceFailed {
        layer_index: usize,
        failed_id: InstanceId,
        reason: String,
    },
    RoutingActivated {
        routing_id: RoutingId,
    },
    RoutingDeactivated {
        routing_id: RoutingId,
    },
    BinaryVerified {
        instance_id: InstanceId,
    },
    BinaryVerificationFailed {
        instance_id: InstanceId,
        reason: String,
    },
}

impl OrchestratorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::ServiceStateChanged { .. } => "service.state_changed",
            OrchestratorEvent::ServiceCrashed { .. } => "service.crashed",
            OrchestratorEvent::HealthChanged { .. } => "health.changed",
            OrchestratorEvent::IsolationViolation { .. } => "isolation.violation",
            OrchestratorEvent::ResourceWarning { .. } => "resource.warning",
            OrchestratorEvent::ResourceCritical { .. } => "resource.critical",
            OrchestratorEvent::ResourceLimitExceeded { .. } => "resource.limit_exceeded",
            OrchestratorEvent::BootSequenceStarted { .. } => "boot.sequence_started",
            OrchestratorEvent::BootSequenceLayerComplete { .. } => "boot.sequence_layer_complete",
            OrchestratorEvent::BootSequenceCompleted { .. } => "boot.sequence_completed",
            OrchestratorEvent::BootSequenceFailed { .. } => "boot.sequence_failed",
            OrchestratorEvent::RoutingActivated { .. } => "routing.activated",
            OrchestratorEvent::RoutingDeactivated { .. } => "routing.deactivated",
            OrchestratorEvent::BinaryVerified { .. } => "binary.verified",
            OrchestratorEvent::BinaryVerificationFailed { .. } => "binary.verification_failed",
        }
    }

    /// Loosely structured payload, matching the "payload dictionary" shape
    /// described for the `EventBus` port.
    pub fn payload(&self) -> HashMap<String, String> {
        let mut payload = HashMap::new();
        match self {
            OrchestratorEvent::ServiceStateChanged {
                instance_id,
                previous,
                current,
            } => {
                payload.insert("instance_id".into(), instance_id.to_string());
                payload.insert("previous".into(), previous.to_string());
                payload.insert("current".into(), current.to_string());
            }
            OrchestratorEvent::ServiceCrashed {
                instance_id,
                exit_code,
                restart_count,
                next_backoff_secs,
                will_restart,
            } => {
                payload.insert("instance_id".into(), instance_id.to_string());
                payload.insert(
                    "exit_code".into(),
                    exit_code.map(|c| c.to_string()).unwrap_or_default(),
                );
                payload.insert("restart_count".into(), restart_count.to_string());
                payload.insert("next_backoff_secs".into(), next_backoff_secs.to_string());
                payload.insert("will_restart".into(), will_restart.to_string());
            }
            OrchestratorEvent::HealthChanged {
                instance_id,
                previous,
                current,
            } => {
                payload.insert("instance_id".into(), instance_id.to_string());
                payload.insert("previous".into(), previous.to_string());
                payload.insert("current".into(), current.to_string());
            }
            OrchestratorEvent::IsolationViolation {
                instance_id,
                violation_kind,
                message,
                ..
            } => {
                payload.insert("instance_id".into(), instance_id.to_string());
                payload.insert("violation_kind".into(), violation_kind.clone());
                payload.insert("message".into(), message.clone());
            }
            OrchestratorEvent::ResourceWarning {
                instance_id,
                usage_bytes,
                limit_bytes,
            }
            | OrchestratorEvent::ResourceCritical {
                instance_id,
                usage_bytes,
                limit_bytes,
            }
            | OrchestratorEvent::ResourceLimitExceeded {
                instance_id,
                usage_bytes,
                limit_bytes,
            } => {
                payload.insert("instance_id".into(), instance_id.to_string());
                payload.insert("usage_bytes".into(), usage_bytes.to_string());
                payload.insert("limit_bytes".into(), limit_bytes.to_string());
            }
            OrchestratorEvent::BootSequenceStarted { layer_count } => {
                payload.insert("layer_count".into(), layer_count.to_string());
            }
            OrchestratorEvent::BootSequenceLayerComplete {
                layer_index,
                instance_ids,
            } => {
                payload.insert("layer_index".into(), layer_index.to_string());
                payload.insert(
                    "instance_ids".into(),
                    instance_ids
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
            OrchestratorEvent::BootSequenceCompleted { started } => {
                payload.insert(
                    "started".into(),
                    started
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
            OrchestratorEvent::BootSequenceFailed {
                layer_index,
                failed_id,
                reason,
            } => {
                payload.insert("layer_index".into(), layer_index.to_string());
                payload.insert("failed_id".into(), failed_id.to_string());
                payload.insert("reason".into(), reason.clone());
            }
            OrchestratorEvent::RoutingActivated { routing_id }
            | OrchestratorEvent::RoutingDeactivated { routing_id } => {
                payload.insert("routing_id".into(), routing_id.to_string());
            }
            OrchestratorEvent::BinaryVerified { instance_id } => {
                payload.insert("instance_id".into(), instance_id.to_string());
            }
            OrchestratorEvent::BinaryVerificationFailed {
                instance_id,
                reason,
            } => {
                payload.insert("instance_id".into(), instance_id.to_string());
                payload.insert("reason".into(), reason.clone());
            }
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_changed_event_name_and_payload_are_stable() {
        let event = OrchestratorEvent::HealthChanged {
            instance_id: InstanceId::new("tor-1").unwrap(),
            previous: HealthStateKind::Unknown,
            current: HealthStateKind::Healthy,
        };
        assert_eq!(event.name(), "health.changed");
        assert_eq!(event.payload().get("previous").unwrap(), "unknown");
    }
}
