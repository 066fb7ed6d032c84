//! Bounded channel feeding restart requests from the health checker to
//! [`crate::lifecycle::manager::InstanceManager`]. Bounded rather than
//! unbounded so a pathological instance
//! that flaps rapidly cannot grow memory without bound; when full, the
//! oldest-style backpressure is resolved by simply dropping the newest
//! request and logging a warning, since a restart is already queued.

use tokio::sync::mpsc::{channel, Receiver, Sender};
use tracing::warn;

use crate::model::ids::InstanceId;

const RESTART_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct RestartRequest {
    pub instance_id: InstanceId,
    pub reason: String,
}

#[derive(Clone)]
pub struct RestartRequestSender(Sender<RestartRequest>);

pub struct RestartRequestReceiver(Receiver<RestartRequest>);

pub fn restart_request_channel() -> (RestartRequestSender, RestartRequestReceiver) {
    let (tx, rx) = channel(RESTART_QUEUE_CAPACITY);
    (RestartRequestSender(tx), RestartRequestReceiver(rx))
}

impl RestartRequestSender {
    /// Never blocks: if the queue is full the request is dropped and a
    /// warning is logged, since the instance already has a pending restart.
    pub fn request(&self, instance_id: InstanceId, reason: String) {
        let request = RestartRequest {
            instance_id: instance_id.clone(),
            reason,
        };
        if let Err(err) = self.0.try_send(request) {
            warn!(%instance_id, %err, "restart request queue full, dropping request");
        }
    }
}

impl RestartRequestReceiver {
    pub async fn recv(&mut self) -> Option<RestartRequest> {
        self.0.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_is_delivered_to_receiver() {
        let (sender, mut receiver) = restart_request_channel();
        sender.request(InstanceId::new("tor-1").unwrap(), "unhealthy".to_string());
        let request = receiver.recv().await.unwrap();
        assert_eq!(request.instance_id.as_str(), "tor-1");
        assert_eq!(request.reason, "unhealthy");
    }

    #[tokio::test]
    async fn excess_requests_are_dropped_not_blocked() {
        let (sender, mut receiver) = restart_request_channel();
        for _ in 0..(RESTART_QUEUE_CAPACITY + 10) {
            sender.request(InstanceId::new("tor-1").unwrap(), "unhealthy".to_string());
        }
        let mut drained = 0;
        while receiver.0.try_recv().is_ok() {
            drained += 1;
        }
        assert!(drained <= RESTART_QUEUE_CAPACITY);
    }
}
