//! Crash-detection background loop: a dedicated thread per managed process
//! that notices an unexpected exit, decides whether to retry via
//! [`Backoff`], and either respawns the process or leaves it in the
//! terminal `Crashed` state.
//!
//! The monitor polls non-blockingly rather than parking in `Child::wait()`,
//! so a concurrent `Stop` can still acquire the process's own mutex to
//! request a graceful shutdown without deadlocking against a thread parked
//! inside a blocking wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::event::channel::EventPublisher;
use crate::event::OrchestratorEvent;
use crate::model::ids::InstanceId;
use crate::supervisor::command_os::ExecutableSpec;
use crate::supervisor::log_capture::LogCapture;
use crate::supervisor::process::{ManagedProcess, ProcessState};
use crate::util::threads::spawn_named_thread;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Handle returned by [`spawn`]. Dropping it leaves the monitor thread
/// running; call [`CrashMonitor::stop`] explicitly before removing an
/// instance so the thread retires instead of outliving its process.
pub struct CrashMonitor {
    stop_requested: Arc<AtomicBool>,
}

impl CrashMonitor {
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}

/// Spawns the monitor thread for `instance_id`. `auto_restart` mirrors the
/// manifest's restart policy: when false, a crash lands in `Crashed` and the
/// thread exits without retrying.
pub fn spawn(
    instance_id: InstanceId,
    process: Arc<Mutex<ManagedProcess>>,
    spec: ExecutableSpec,
    log_capture: Option<LogCapture>,
    events: EventPublisher<OrchestratorEvent>,
    auto_restart: bool,
) -> CrashMonitor {
    let stop_requested = Arc::new(AtomicBool::new(false));
    let stop_flag = stop_requested.clone();

    spawn_named_thread(&format!("crash-monitor-{instance_id}"), move || {
        loop {
            std::thread::sleep(POLL_INTERVAL);
            if stop_flag.load(Ordering::SeqCst) {
                return;
            }

            let exit_status = {
                let mut guard = process.lock().expect("process mutex poisoned");
                match guard.state() {
                    ProcessState::Crashed | ProcessState::Stopped => return,
                    ProcessState::Running => guard.poll_unexpected_exit(),
                    _ => None,
                }
            };

            let Some(exit_status) = exit_status else {
                continue;
            };

            let exit_code = exit_status.code();
            let will_restart = auto_restart && {
                let mut guard = process.lock().expect("process mutex poisoned");
                guard.backoff.should_retry()
            };
            let next_backoff_secs = {
                let mut guard = process.lock().expect("process mutex poisoned");
                guard.backoff.next_delay().as_secs()
            };
            let restart_count = {
                let guard = process.lock().expect("process mutex poisoned");
                guard.backoff.tries() as u32
            };

            warn!(%instance_id, ?exit_code, will_restart, "process exited unexpectedly");
            events
                .publish(OrchestratorEvent::ServiceCrashed {
                    instance_id: instance_id.clone(),
                    exit_code,
                    restart_count,
                    next_backoff_secs,
                    will_restart,
                })
                .ok();

            {
                let mut guard = process.lock().expect("process mutex poisoned");
                if guard.mark_crashed(will_restart).is_err() {
                    return;
                }
            }

            if !will_restart {
                return;
            }

            std::thread::sleep(Duration::from_secs(next_backoff_secs));
            if stop_flag.load(Ordering::SeqCst) {
                return;
            }

            let mut guard = process.lock().expect("process mutex poisoned");
            if guard.begin_restart().is_err() {
                return;
            }
            match guard.start(&spec, log_capture.clone()) {
                Ok(()) => info!(%instance_id, "process respawned after crash"),
                Err(err) => {
                    warn!(%instance_id, %err, "respawn after crash failed");
                    return;
                }
            }
        }
    });

    CrashMonitor { stop_requested }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::restart_policy::Backoff;
    use std::time::Duration as StdDuration;

    fn spec() -> ExecutableSpec {
        ExecutableSpec {
            binary_path: "/bin/true".into(),
            args: vec![],
            env: Default::default(),
            working_dir: None,
            shutdown_timeout: StdDuration::from_secs(1),
        }
    }

    #[test]
    fn monitor_retires_once_process_reaches_stopped() {
        let instance_id = InstanceId::new("tor-1").unwrap();
        let process = Arc::new(Mutex::new(ManagedProcess::new(
            instance_id.clone(),
            Backoff::default(),
        )));
        {
            let mut guard = process.lock().unwrap();
            guard.mark_stopped().unwrap();
        }
        let (publisher, _consumer) = crate::event::channel::pub_sub::<OrchestratorEvent>();
        let monitor = spawn(instance_id, process, spec(), None, publisher, true);
        std::thread::sleep(Duration::from_millis(500));
        monitor.stop();
    }
}
