//! Boot sequencing: collects `auto_start` instances, computes a startup
//! order via [`crate::dependency::DependencyGraph::compute_startup_order`],
//! then starts each layer concurrently with a bounded per-instance timeout,
//! cancelling the rest of the layer on the first failure
//! (`util::error_group::run_to_first_error`).

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{info, warn};

use crate::dependency::DependencyGraph;
use crate::event::channel::EventPublisher;
use crate::event::OrchestratorEvent;
use crate::lifecycle::{InstanceManager, LifecycleError};
use crate::model::ids::InstanceId;
use crate::ports::Store;
use crate::util::error_group::run_to_first_error;

const DEFAULT_PER_INSTANCE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum BootError {
    #[error("failed to load boot state: {0}")]
    Store(#[from] crate::ports::PortError),
    #[error("failed to compute startup order: {0}")]
    Dependency(#[from] crate::dependency::DependencyError),
    #[error("instance {instance_id} failed to start during boot: {message}")]
    InstanceFailed {
        instance_id: InstanceId,
        message: String,
    },
    #[error("startup reconciliation failed: {0}")]
    Reconciliation(#[from] LifecycleError),
}

pub struct BootSequencer {
    manager: Arc<InstanceManager>,
    store: Arc<dyn Store>,
    events: EventPublisher<OrchestratorEvent>,
    per_instance_timeout: Duration,
}

impl BootSequencer {
    pub fn new(
        manager: Arc<InstanceManager>,
        store: Arc<dyn Store>,
        events: EventPublisher<OrchestratorEvent>,
    ) -> Self {
        Self {
            manager,
            store,
            events,
            per_instance_timeout: DEFAULT_PER_INSTANCE_TIMEOUT,
        }
    }

    pub fn with_per_instance_timeout(mut self, timeout: Duration) -> Self {
        self.per_instance_timeout = timeout;
        self
    }

    /// Runs the full boot sequence: reconcile stale state, then start every
    /// `auto_start` instance layer by layer.
    pub async fn run(&self) -> Result<Vec<InstanceId>, BootError> {
        self.manager.reconcile_on_startup().await?;

        let instances = self.store.list_instances().await?;
        let auto_start_ids: Vec<InstanceId> = instances
            .iter()
            .filter(|instance| instance.auto_start)
            .map(|instance| instance.id.clone())
            .collect();

        let mut graph = DependencyGraph::new();
        for edge in self.store.list_dependencies().await? {
            graph.add_edge(&edge.dependent, &edge.dependency);
        }
        for id in &auto_start_ids {
            graph.ensure_known(id);
        }

        let layers = graph.compute_startup_order()?;
        let auto_start: std::collections::HashSet<InstanceId> = auto_start_ids.into_iter().collect();

        self.events
            .publish(OrchestratorEvent::BootSequenceStarted {
                layer_count: layers.len(),
            })
            .ok();

        let mut started = Vec::new();
        for (layer_index, layer) in layers.into_iter().enumerate() {
            let layer: Vec<InstanceId> = layer.into_iter().filter(|id| auto_start.contains(id)).collect();
            if layer.is_empty() {
                continue;
            }

            let futures: Vec<BoxFuture<'static, Result<InstanceId, (InstanceId, String)>>> = layer
                .iter()
                .cloned()
                .map(|instance_id| {
                    let manager = self.manager.clone();
                    let timeout = self.per_instance_timeout;
                    Box::pin(async move {
                        let start = manager.start_instance(&instance_id);
                        match tokio::time::timeout(timeout, start).await {
                            Ok(Ok(())) => Ok(instance_id),
                            Ok(Err(err)) => Err((instance_id, err.to_string())),
                            Err(_) => Err((instance_id, "timed out waiting to reach Running".to_string())),
                        }
                    }) as BoxFuture<'static, Result<InstanceId, (InstanceId, String)>>
                })
                .collect();

            match run_to_first_error(futures).await {
                Ok(layer_started) => {
                    info!(layer = layer_index, count = layer_started.len(), "boot layer started");
                    self.events
                        .publish(OrchestratorEvent::BootSequenceLayerComplete {
                            layer_index,
                            instance_ids: layer_started.clone(),
                        })
                        .ok();
                    started.extend(layer_started);
                }
                Err((failed_id, message)) => {
                    warn!(layer = layer_index, instance_id = %failed_id, %message, "boot layer aborted");
                    self.events
                        .publish(OrchestratorEvent::BootSequenceFailed {
                            layer_index,
                            failed_id: failed_id.clone(),
                            reason: message.clone(),
                        })
                        .ok();
                    return Err(BootError::InstanceFailed {
                        instance_id: failed_id,
                        message,
                    });
                }
            }
        }

        self.events
            .publish(OrchestratorEvent::BootSequenceCompleted {
                started: started.clone(),
            })
            .ok();
        Ok(started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_per_instance_timeout_is_sixty_seconds() {
        assert_eq!(DEFAULT_PER_INSTANCE_TIMEOUT, Duration::from_secs(60));
    }
}
