// Main entry point for the spatial API server

use std::sync::Arc;

use anyhow::{Context, Result};
use spatial_core::domains::location::IpApiLocator;
use spatial_core::{server::build_app, server::AppState, Config};
use supabase_client::{RetryPolicy, SupabaseClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,spatial_core=debug,supabase_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Kindr spatial API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let client = SupabaseClient::new(&config.supabase_url, &config.supabase_anon_key)
        .with_timeout(config.request_timeout)
        .with_retry_policy(RetryPolicy::new(
            config.retry_max_attempts,
            config.retry_base_delay,
        ));

    if client.check_connection().await {
        tracing::info!(url = %client.base_url(), "Backend reachable");
    } else {
        tracing::warn!(url = %client.base_url(), "Backend not reachable yet, continuing");
    }

    let cluster_options = config.cluster_options()?;
    let locator = IpApiLocator::new(config.ip_geolocation_url.clone());
    let state = AppState::new(Arc::new(client), Arc::new(locator), cluster_options);

    // Build application
    let app = build_app(state, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
