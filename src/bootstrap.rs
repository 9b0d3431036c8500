//! Process startup: logging and one-time collaborator construction.

use crate::config::Config;
use crate::digest::DigestReporter;
use crate::directory::DirectoryClient;
use crate::engine::ReconciliationEngine;
use crate::error::Result;
use crate::metrics::{InfluxMetricsSink, MetricsSink, NoopMetricsSink};
use crate::notify::PushoverNotifier;
use crate::store::SqliteStateStore;
use std::sync::Arc;
use tracing::info;

/// Installs the global tracing subscriber (`RUST_LOG`, default `sensorwatch=info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensorwatch=info".into()),
        )
        .init();
}

/// Loads `.env` if present, then the configuration.
pub fn load_config() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "Loaded environment file");
    }
    Config::load()
}

/// Builds the engine and all of its collaborators from configuration.
pub fn build_engine(config: &Config) -> Result<ReconciliationEngine> {
    let directory = Arc::new(DirectoryClient::new(&config.directory)?);
    let store = Arc::new(SqliteStateStore::new(&config.store.path)?);
    let notifier = Arc::new(PushoverNotifier::new(&config.notify)?);

    let metrics: Arc<dyn MetricsSink> = if config.metrics.is_enabled() {
        Arc::new(InfluxMetricsSink::new(&config.metrics)?)
    } else {
        info!("Metrics emission disabled");
        Arc::new(NoopMetricsSink)
    };

    info!(
        base_url = %config.directory.base_url,
        paging = ?config.directory.paging,
        store = %config.store.path,
        metrics = config.metrics.is_enabled(),
        timezone = %config.metrics.timezone,
        "Collaborators initialized"
    );

    Ok(ReconciliationEngine::new(
        directory,
        store,
        notifier,
        metrics,
        config.metrics.tz()?,
    ))
}

/// Builds the digest reporter from configuration.
pub fn build_digest(config: &Config) -> Result<DigestReporter> {
    let store = Arc::new(SqliteStateStore::new(&config.store.path)?);
    let notifier = Arc::new(PushoverNotifier::new(&config.notify)?);
    Ok(DigestReporter::new(store, notifier, config.metrics.tz()?))
}
