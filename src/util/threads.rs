use std::thread::{self, JoinHandle};

/// Spawns an OS thread with a human readable name, matching the naming
/// convention used throughout the supervisor and health checker so that
/// `jstack`-style dumps and panics are easy to attribute.
pub fn spawn_named_thread<F>(name: &str, f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .unwrap_or_else(|err| panic!("failed to spawn thread '{name}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn spawned_thread_runs_and_is_named() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        let handle = spawn_named_thread("test-thread", move || {
            ran_clone.store(true, Ordering::SeqCst);
        });
        assert_eq!(handle.thread().name(), Some("test-thread"));
        handle.join().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
