use anyhow::{Context, Result};
use sensorwatch::bootstrap;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    info!("Sensorwatch reconciliation starting...");

    let config = bootstrap::load_config().context("Failed to load configuration")?;
    let engine = bootstrap::build_engine(&config).context("Failed to initialize collaborators")?;

    let summary = engine.run().await.context("Reconciliation pass failed")?;

    println!("{}", summary.status_line());
    Ok(())
}
