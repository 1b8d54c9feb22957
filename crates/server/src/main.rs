mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use wayfarer_core::config::{AppConfig, LoadOptions, LoggingConfig};

fn init_logging(logging: &LoggingConfig) {
    use wayfarer_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    match logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config.logging);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(app.sessions.clone(), &app.config.llm),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport_mode = if app.runner.is_noop_transport() { "noop" } else { "telegram" },
        "wayfarer-server started"
    );

    tokio::select! {
        result = app.runner.start() => {
            result?;
            tracing::info!(event_name = "system.server.runner_finished", "chat runner finished");
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(event_name = "system.server.stopping", correlation_id = "shutdown", "shutdown signal received");
        }
    }

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.runner.stop()).await.is_err() {
        tracing::warn!(event_name = "system.server.shutdown_timeout", grace_secs = grace.as_secs());
    }
    tracing::info!(event_name = "system.server.stopped", correlation_id = "shutdown", "wayfarer-server stopped");

    Ok(())
}
