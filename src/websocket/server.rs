use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use log::{info, error};

use crate::auth::SessionManager;
use crate::market::PriceSnapshot;
use crate::portfolio::PortfolioService;
use crate::websocket::WebSocketHandler;

/// Accept loop: one task per connection, each with its own receiver on the
/// price channel.
pub async fn run_websocket_server(
    listener: TcpListener,
    prices_tx: broadcast::Sender<Arc<PriceSnapshot>>,
    session_manager: SessionManager,
    portfolio_service: Arc<PortfolioService>,
) {
    info!("Ready to accept WebSocket connections");

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept WebSocket connection: {}", e);
                continue;
            }
        };

        let prices_rx = prices_tx.subscribe();
        let handler = WebSocketHandler::new(
            session_manager.clone(),
            portfolio_service.clone(),
            addr.to_string(),
        );

        tokio::spawn(async move {
            handler.handle_connection(stream, prices_rx).await;
        });
    }
}
