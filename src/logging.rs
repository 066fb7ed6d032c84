//! Logging initialization: an `EnvFilter`/`fmt` subscriber with a rolling
//! file layer built from `tracing_appender`.

use std::path::Path;

use thiserror::Error;
use tracing::metadata::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::PrettyFields;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unable to set the global tracing subscriber")]
    AlreadyInit,
}

/// Installs a stdout layer plus a size-rotated file layer under `log_dir`.
/// The returned [`WorkerGuard`] must be held for the process lifetime;
/// dropping it stops flushing the non-blocking file writer.
pub fn try_init(log_dir: &Path) -> Result<WorkerGuard, LoggingError> {
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::never(log_dir, "orchestrator.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = || {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .fmt_fields(PrettyFields::new())
        .with_filter(env_filter());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .fmt_fields(PrettyFields::new())
        .with_filter(env_filter());

    let subscriber = tracing_subscriber::registry().with(stdout_layer).with(file_layer);

    tracing::subscriber::set_global_default(subscriber).map_err(|_| LoggingError::AlreadyInit)?;
    Ok(guard)
}
