use std::time::Duration;

use anyhow::Result;
use expensey_core::config::{AppConfig, LoadOptions};
use expensey_server::{bootstrap, health, routes};

fn init_logging(config: &AppConfig) {
    use expensey_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let publisher = app.state.workflow().publisher().clone();
    let service = routes::router(app.state)
        .merge(health::router(app.db_pool.clone(), publisher));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "expensey-server started"
    );

    axum::serve(listener, service).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "expensey-server stopping, draining notification queue"
    );

    // The router held the last publisher; once it is gone the dispatcher
    // drains what is queued and exits.
    if tokio::time::timeout(grace, app.dispatcher).await.is_err() {
        tracing::warn!(
            event_name = "system.server.dispatcher_timeout",
            correlation_id = "shutdown",
            "notification queue not drained before shutdown deadline"
        );
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
