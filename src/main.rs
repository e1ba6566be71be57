use anyhow::{Context, Result};
use freight_broker::api::{create_router, AppState};
use freight_broker::config::BrokerConfig;
use freight_broker::fms::FmsClient;
use freight_broker::tms::TmsClient;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freight_broker=info".into()),
        )
        .init();

    info!("Freight broker starting...");

    let config = BrokerConfig::from_env().context("Failed to load broker configuration")?;
    config
        .validate()
        .context("Upstream account settings are incomplete")?;

    info!(
        fms_base_url = %config.fms.base_url,
        tms_base_url = %config.tms.base_url,
        fms_token_mode = ?config.fms.token_mode,
        bind = %config.server.bind,
        port = config.server.port,
        "Configuration loaded"
    );

    let fms = Arc::new(
        FmsClient::new(config.fms.clone(), &config.http)
            .context("Failed to initialize FMS client")?,
    );
    let tms = Arc::new(
        TmsClient::new(config.tms.clone(), &config.http)
            .context("Failed to initialize TMS client")?,
    );

    let router = create_router(AppState { fms, tms });
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Command API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Command API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Freight broker stopped");

    Ok(())
}
