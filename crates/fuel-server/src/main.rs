//! Fuel planner server: route resolution and fuel stop planning over HTTP.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fuel_server::config::Config;
use fuel_server::state::AppState;
use fuel_server::{api, persistence};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fuel_server=debug".parse()?)
                .add_directive("fuel_core=info".parse()?),
        )
        .init();

    tracing::info!("Starting fuel planner server...");

    let config = Config::from_env();
    let problems = config.validate();
    if !problems.is_empty() {
        anyhow::bail!("invalid configuration: {}", problems.join("; "));
    }
    if config.open_route_api_key.is_none() {
        tracing::warn!("OPEN_ROUTE_API_KEY not set; only cached routes can be optimized");
    }

    let db = persistence::init_database(&config.database_path, config.database_max_connections)
        .await?;
    let state = Arc::new(AppState::new(config.clone(), db)?);
    let snapshot = state.reload_pricing().await?;
    if snapshot.stations().is_empty() {
        tracing::warn!("No stations loaded; run load_fuel_prices to import a price feed");
    }

    let app = api::routes(&config)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!(
        strategy = config.price_strategy.as_str(),
        "Listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
