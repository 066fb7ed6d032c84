//! Host binary wiring the orchestrator's collaborators together and
//! running the boot sequence. The CLI surface here is intentionally thin:
//! a host binary may expose administrative actions, but the orchestrator
//! itself is invoked via its in-process API.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use service_instance_orchestrator::adapters::{
    FileRegistry, LocalRouterPort, NullBridgeOrchestrator, NullGateway, NullKillSwitchCoordinator,
};
use service_instance_orchestrator::boot::BootSequencer;
use service_instance_orchestrator::config::{ConfigLoader, OrchestratorConfig};
use service_instance_orchestrator::dependency::DependencyGraph;
use service_instance_orchestrator::event::channel::pub_sub;
use service_instance_orchestrator::event::OrchestratorEvent;
use service_instance_orchestrator::health::checker::HealthChecker;
use service_instance_orchestrator::health::restart_request::restart_request_channel;
use service_instance_orchestrator::lifecycle::InstanceManager;
use service_instance_orchestrator::logging;
use service_instance_orchestrator::ports::Store;
use service_instance_orchestrator::resource::ResourcePoller;
use service_instance_orchestrator::schedule::ScheduleEvaluator;
use service_instance_orchestrator::store::SqliteStore;
use service_instance_orchestrator::supervisor::log_capture::LogCapture;
use service_instance_orchestrator::supervisor::ProcessSupervisor;

#[derive(Debug, Parser)]
#[command(about = "Service instance lifecycle orchestrator")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "/etc/orchestrator/config.yaml")]
    config: PathBuf,

    /// Directory of per-feature manifest YAML files.
    #[arg(long, default_value = "/etc/orchestrator/manifests")]
    manifests: PathBuf,

    /// Identifier of the router this orchestrator instance runs on.
    #[arg(long, default_value = "local-router")]
    router_id: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::new(&cli.config).load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration, using defaults: {err}");
            OrchestratorConfig::default()
        }
    };

    let _logging_guard = match logging::try_init(&config.log_dir) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            None
        }
    };

    info!(config_path = %cli.config.display(), "starting service instance orchestrator");

    if let Err(err) = run(cli, config).await {
        error!(%err, "orchestrator exited with an error");
        std::process::exit(1);
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("collaborator port error: {0}")]
    Port(#[from] service_instance_orchestrator::ports::PortError),
    #[error("opening state store: {0}")]
    Store(String),
    #[error("boot sequence failed: {0}")]
    Boot(#[from] service_instance_orchestrator::boot::BootError),
}

async fn run(cli: Cli, config: OrchestratorConfig) -> Result<(), RunError> {
    let (events, event_consumer) = pub_sub::<OrchestratorEvent>();
    // Logged for visibility; a production deployment would forward these
    // onto an `EventBus` adapter. Notification channels are an external
    // collaborator this crate doesn't implement.
    tokio::task::spawn_blocking(move || log_events(event_consumer));

    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&config.sqlite_path)
            .map_err(|e| RunError::Store(e.to_string()))?,
    );

    let registry = Arc::new(FileRegistry::load(&cli.manifests)?);
    let gateway = Arc::new(NullGateway);
    let bridge = Arc::new(NullBridgeOrchestrator);
    let kill_switch = Arc::new(NullKillSwitchCoordinator);
    let router = Arc::new(LocalRouterPort::new(cli.router_id));

    let log_capture = LogCapture::new(config.log_dir.join("services"));
    let supervisor = ProcessSupervisor::new(Some(log_capture), events.clone());
    let resource_poller = ResourcePoller::new(events.clone());
    let (restart_sender, mut restart_receiver) = restart_request_channel();
    let health_checker = HealthChecker::new(events.clone(), restart_sender);

    let mut dependencies = DependencyGraph::new();
    for edge in store.list_dependencies().await? {
        dependencies.add_edge(&edge.dependent, &edge.dependency);
    }

    let manager = Arc::new(InstanceManager::new(
        Arc::clone(&store),
        registry,
        gateway,
        bridge,
        supervisor,
        resource_poller.clone(),
        health_checker.clone(),
        events.clone(),
        dependencies,
        config.data_dir.clone(),
    ));

    tokio::spawn(resource_poller.run());
    tokio::spawn(health_checker.run());
    tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            while let Some(request) = restart_receiver.recv().await {
                info!(instance_id = %request.instance_id, reason = %request.reason, "restarting unhealthy instance");
                if let Err(err) = manager.restart_instance(&request.instance_id).await {
                    warn!(instance_id = %request.instance_id, %err, "failed to restart unhealthy instance");
                }
            }
        }
    });
    tokio::spawn(
        ScheduleEvaluator::new(Arc::clone(&store), router, kill_switch, events.clone()).run(),
    );

    let boot = BootSequencer::new(Arc::clone(&manager), store, events);
    match boot.run().await {
        Ok(started) => info!(count = started.len(), "boot sequence completed"),
        Err(err) => warn!(%err, "boot sequence did not complete cleanly"),
    }

    info!("orchestrator is running, waiting for shutdown signal");
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received, exiting");
    Ok(())
}

fn log_events(consumer: service_instance_orchestrator::event::channel::EventConsumer<OrchestratorEvent>) {
    for event in consumer.as_ref().iter() {
        info!(name = event.name(), payload = ?event.payload(), "orchestrator event");
    }
}
