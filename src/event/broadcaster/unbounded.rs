use crossbeam::channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
/// A simple, unbounded broadcast channel for low-throughput use cases.
///
/// Every subscriber gets its own channel, so all subscribers receive every
/// message published through the broadcaster. Used to fan out
/// [`crate::event::OrchestratorEvent`]s to the event bus adapter and to any
/// in-process test subscribers.
///
/// # Notes
/// - Not optimized for high-throughput scenarios.
/// - Broadcasters aren't notified when a subscriber disconnects; a send to a
///   disconnected subscriber just drops that subscriber from the list.
pub struct UnboundedBroadcast<T> {
    subscribed_senders: Arc<Mutex<Vec<Sender<T>>>>,
}

impl<T> UnboundedBroadcast<T>
where
    T: Clone,
{
    pub fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        self.subscribed_senders
            .lock()
            .expect("failed to acquire the lock")
            .push(tx);
        rx
    }

    /// Sends `message` to all registered, still-connected subscribers.
    /// Never blocks (the channel is unbounded) and never fails: disconnected
    /// subscribers are silently dropped from the subscriber list.
    pub fn broadcast(&self, message: T) {
        self.subscribed_senders
            .lock()
            .expect("failed to acquire the lock")
            .retain(|s| s.send(message.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_subscribers_all_receive() {
        let mut broadcaster = UnboundedBroadcast::default();
        let subs1 = broadcaster.subscribe();
        let subs2 = broadcaster.subscribe();

        broadcaster.broadcast("message");

        assert_eq!(subs1.recv().unwrap(), "message");
        assert_eq!(subs2.recv().unwrap(), "message");
    }

    #[test]
    fn clones_share_subscribers() {
        let mut broadcaster = UnboundedBroadcast::default();
        let cloned = broadcaster.clone();
        let subs1 = broadcaster.subscribe();

        broadcaster.broadcast("foo");
        cloned.broadcast("bar");

        assert_eq!(subs1.recv().unwrap(), "foo");
        assert_eq!(subs1.recv().unwrap(), "bar");
    }

    #[test]
    fn dropped_subscriber_is_pruned_on_next_broadcast() {
        let mut broadcaster = UnboundedBroadcast::default();
        let subs1 = broadcaster.subscribe();
        let subs2 = broadcaster.subscribe();
        drop(subs2);

        broadcaster.broadcast("message");

        assert_eq!(subs1.recv().unwrap(), "message");
    }

    #[test]
    fn queued_messages_survive_broadcaster_drop() {
        let mut broadcaster = UnboundedBroadcast::default();
        let subs1 = broadcaster.subscribe();

        broadcaster.broadcast("message");
        drop(broadcaster);

        assert_eq!(subs1.recv().unwrap(), "message");
        assert!(subs1.recv().is_err());
    }
}
