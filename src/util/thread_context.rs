//! Thread lifecycle helper shared by every background loop in the
//! orchestrator (health scheduler consumer, log tailers, supervisor process
//! threads). A `NotStartedThreadContext` spawns the OS thread and hands the
//! callback a stop-signal consumer; stopping publishes on that channel and
//! joins the handle.

use std::thread::JoinHandle;

use thiserror::Error;

use crate::event::channel::{pub_sub, EventConsumer, EventPublisher, EventPublisherError};
use crate::util::threads::spawn_named_thread;

/// Marker type for the stop signal; carries no payload.
pub type CancellationMessage = ();

pub struct NotStartedThreadContext<F>
where
    F: FnOnce(EventConsumer<CancellationMessage>) + Send + 'static,
{
    thread_name: String,
    callback: F,
}

impl<F> NotStartedThreadContext<F>
where
    F: FnOnce(EventConsumer<CancellationMessage>) + Send + 'static,
{
    pub fn new<S: Into<String>>(thread_name: S, callback: F) -> Self {
        Self {
            thread_name: thread_name.into(),
            callback,
        }
    }

    pub fn start(self) -> StartedThreadContext {
        let (stop_publisher, stop_consumer) = pub_sub::<CancellationMessage>();
        let thread_name = self.thread_name;
        let callback = self.callback;
        let join_handle = spawn_named_thread(&thread_name, move || {
            callback(stop_consumer);
        });
        StartedThreadContext::new(thread_name, stop_publisher, join_handle)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ThreadContextStopperError {
    #[error("error sending stop signal to '{0}' thread: {1}")]
    EventPublisherError(String, String),
    #[error("error joining '{0}' thread")]
    JoinError(String),
}

pub struct StartedThreadContext {
    thread_name: String,
    stop_publisher: EventPublisher<CancellationMessage>,
    join_handle: JoinHandle<()>,
}

impl StartedThreadContext {
    pub fn new(
        thread_name: String,
        stop_publisher: EventPublisher<CancellationMessage>,
        join_handle: JoinHandle<()>,
    ) -> Self {
        Self {
            thread_name,
            stop_publisher,
            join_handle,
        }
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Publishes the stop signal and blocks until the thread has joined.
    pub fn stop_blocking(self) -> Result<(), ThreadContextStopperError> {
        if let Err(err) = self.stop_publisher.publish(()) {
            return Err(ThreadContextStopperError::EventPublisherError(
                self.thread_name.clone(),
                err.to_string(),
            ));
        }
        self.join_handle.join().map_err(|err| {
            ThreadContextStopperError::JoinError(
                err.downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown panic".to_string()),
            )
        })
    }
}

impl From<EventPublisherError> for ThreadContextStopperError {
    fn from(err: EventPublisherError) -> Self {
        ThreadContextStopperError::EventPublisherError("unknown".to_string(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn stop_blocking_joins_the_thread() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let ctx = NotStartedThreadContext::new("counter", move |stop| {
            loop {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                if stop.as_ref().recv_timeout(Duration::from_millis(5)).is_ok() {
                    break;
                }
            }
        })
        .start();

        std::thread::sleep(Duration::from_millis(20));
        ctx.stop_blocking().unwrap();
        assert!(counter.load(Ordering::SeqCst) > 0);
    }
}
