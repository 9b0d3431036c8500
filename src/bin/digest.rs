use anyhow::{Context, Result};
use sensorwatch::bootstrap;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    info!("Sensorwatch morning digest starting...");

    let config = bootstrap::load_config().context("Failed to load configuration")?;
    let reporter = bootstrap::build_digest(&config).context("Failed to initialize collaborators")?;

    let summary = reporter.run().await.context("Morning digest failed")?;

    println!("{}", summary.status_line());
    Ok(())
}
