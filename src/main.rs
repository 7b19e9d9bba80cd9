mod api;
mod auth;
mod config;
mod error;
mod market;
mod portfolio;
mod store;
mod websocket;

use std::time::Duration;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::interval;
use log::{info, error};
use tower_http::cors::CorsLayer;

use crate::config::{Config, BROADCAST_CHANNEL_SIZE, DEFAULT_LOG_LEVEL, STATS_INTERVAL_SECS};
use crate::api::{ApiState, create_api_router};
use crate::auth::{JwtGenerator, SessionManager};
use crate::market::{PriceFeed, PriceSnapshot};
use crate::portfolio::PortfolioService;
use crate::store::{JsonFileStore, MemoryStore, UserStore};
use crate::websocket::run_websocket_server;

fn open_store(config: &Config) -> Result<Arc<dyn UserStore>, Box<dyn std::error::Error>> {
    match &config.store_path {
        Some(path) => {
            info!("Using JSON file store at {}", path);
            Ok(Arc::new(JsonFileStore::open(path)?))
        }
        None => {
            info!("Using in-memory store; accounts are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logger first so warnings raised while reading the environment are shown
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(DEFAULT_LOG_LEVEL));

    // Load configuration
    let config = Config::from_env();

    config.log_config();

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e.into());
    }

    // Initialize managers
    let store = open_store(&config)?;
    let session_manager = SessionManager::new(&config.jwt_secret);
    let portfolio_service = Arc::new(PortfolioService::new(
        store,
        JwtGenerator::new(&config.jwt_secret, config.token_ttl()),
        BROADCAST_CHANNEL_SIZE,
    ));

    // Price feed runs for the lifetime of the process, subscribers or not
    let (prices_tx, _) = broadcast::channel::<Arc<PriceSnapshot>>(BROADCAST_CHANNEL_SIZE);
    let price_feed = PriceFeed::default();
    price_feed.clone().spawn(prices_tx.clone(), config.feed_interval());

    start_background_tasks(session_manager.clone(), portfolio_service.clone());

    // Start API server
    let api_state = ApiState {
        portfolio_service: portfolio_service.clone(),
        price_feed,
    };

    let api_router = create_api_router(api_state)
        .layer(CorsLayer::permissive()); // Enable CORS for web clients

    let api_listener = TcpListener::bind(&config.api_bind_address).await?;
    info!("HTTP API server running at http://{}", config.api_bind_address);

    let api_server = axum::serve(api_listener, api_router);

    // Start WebSocket server
    let ws_listener = TcpListener::bind(&config.ws_bind_address).await?;
    info!("WebSocket price feed at ws://{}/ws (append ?token=<jwt> for portfolio updates)",
          config.ws_bind_address);

    let websocket_server = run_websocket_server(
        ws_listener,
        prices_tx,
        session_manager,
        portfolio_service,
    );

    tokio::select! {
        result = api_server => {
            error!("API server stopped: {:?}", result);
        }
        _ = websocket_server => {
            error!("WebSocket server stopped");
        }
    }

    Ok(())
}

fn start_background_tasks(session_manager: SessionManager, portfolio_service: Arc<PortfolioService>) {
    tokio::spawn(async move {
        let mut interval_timer = interval(Duration::from_secs(STATS_INTERVAL_SECS));

        loop {
            interval_timer.tick().await;
            session_manager.log_session_stats();
            info!("Registered users: {}", portfolio_service.user_count());
        }
    });

    info!("Started stats monitoring task (every {} seconds)", STATS_INTERVAL_SECS);
}
