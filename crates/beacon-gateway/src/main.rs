//! Beacon gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p beacon-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use anyhow::Context;
use beacon_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = format!("{e:#}"), "Gateway failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(
        config.app.env,
        config.app.log_format,
    )) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        address = %config.server.address(),
        node_id = %config.gossip.node_id,
        "Starting Beacon Gateway..."
    );

    beacon_gateway::run(config).await.context("Gateway server error")?;

    Ok(())
}
