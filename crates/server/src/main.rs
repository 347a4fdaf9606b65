mod bootstrap;
mod health;
mod webhook;

use std::sync::Arc;

use anyhow::Result;
use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_db::repositories::SqlLeadRepository;

fn init_logging(config: &AppConfig) {
    use leadflow_core::config::LogFormat::*;
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

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other work.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    match app.gateway.instance_status().await {
        Ok(status) if status.connected => {
            tracing::info!(
                event_name = "system.server.gateway_connected",
                user = status.user.as_deref().unwrap_or("unknown"),
                "messaging gateway connected"
            );
        }
        Ok(_) => {
            tracing::warn!(
                event_name = "system.server.gateway_disconnected",
                "messaging gateway instance is not connected"
            );
        }
        Err(error) => {
            tracing::warn!(
                event_name = "system.server.gateway_unreachable",
                error = %error,
                "messaging gateway status check failed"
            );
        }
    }

    let router = health::router(app.db_pool.clone()).merge(webhook::router(webhook::WebhookState {
        orchestrator: app.orchestrator.clone(),
        leads: Arc::new(SqlLeadRepository::new(app.db_pool.clone())),
        ignore_own_messages: true,
    }));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "leadflow-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopped", "leadflow-server stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
