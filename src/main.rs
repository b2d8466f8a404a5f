// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use chiller_analytics::application::aggregation_service::PlantPerformanceService;
use chiller_analytics::application::chart_session::ChartSessionService;
use chiller_analytics::application::tradeoff_service::TradeoffService;
use chiller_analytics::infrastructure::config::load_analytics_config;
use chiller_analytics::infrastructure::http_client::AnalyticsApiClient;
use chiller_analytics::presentation::app_state::AppState;
use chiller_analytics::presentation::build_router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_analytics_config()?;

    // Create API client (infrastructure layer)
    let client = Arc::new(AnalyticsApiClient::new(
        &config.upstream.base_url,
        config.upstream.timeout(),
    )?);

    // Create services (application layer)
    let plant_performance = PlantPerformanceService::new(client.clone(), config.binning);
    let tradeoff = TradeoffService::new(client.clone(), config.binning.cds);
    let chart_sessions = ChartSessionService::new(client);

    let state = Arc::new(AppState {
        plant_performance,
        tradeoff,
        chart_sessions,
    });

    // Build router (presentation layer)
    let router = build_router(state);

    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!(
        "Starting chiller-analytics service on {} (upstream {})",
        addr,
        config.upstream.base_url
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
