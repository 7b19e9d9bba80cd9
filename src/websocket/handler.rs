use std::sync::Arc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::{RecvError, TryRecvError}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response, ErrorResponse};
use tokio_tungstenite::tungstenite::http::StatusCode;
use log::{info, warn, error};

use crate::auth::{extract_jwt_from_request, Claims, SessionManager};
use crate::market::PriceSnapshot;
use crate::portfolio::{HoldingsChanged, PortfolioService};
use crate::websocket::session::ClientSession;

pub const WEBSOCKET_PATH: &str = "/ws";

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

pub struct WebSocketHandler {
    session_manager: SessionManager,
    portfolio_service: Arc<PortfolioService>,
    peer_addr: String,
}

fn error_response(status: StatusCode, message: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(message.to_string()));
    *response.status_mut() = status;
    response
}

impl WebSocketHandler {
    pub fn new(
        session_manager: SessionManager,
        portfolio_service: Arc<PortfolioService>,
        peer_addr: String,
    ) -> Self {
        Self {
            session_manager,
            portfolio_service,
            peer_addr,
        }
    }

    pub async fn handle_connection(
        self,
        stream: TcpStream,
        prices_rx: broadcast::Receiver<Arc<PriceSnapshot>>,
    ) {
        let mut accepted: Option<(String, Option<Claims>)> = None;

        let handshake = accept_hdr_async(stream, |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let (session_id, claims) = self.authenticate_request(req)?;
            accepted = Some((session_id, claims));
            Ok(response)
        }).await;

        let ws_stream = match handshake {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake failed for {}: {:?}", self.peer_addr, e);
                // The session may have been registered before the upgrade failed
                if let Some((session_id, _)) = accepted {
                    if let Err(e) = self.session_manager.release_session(&session_id) {
                        error!("Failed to release session {}: {}", session_id, e);
                    }
                }
                return;
            }
        };

        let Some((session_id, claims)) = accepted else {
            error!("Handshake completed without a session for {}", self.peer_addr);
            return;
        };

        // Subscribe before loading holdings so no mutation slips in between
        let holdings_rx = self.portfolio_service.subscribe();
        let session = self.open_session(claims);
        self.run_connection(ws_stream, prices_rx, holdings_rx, session, &session_id).await;

        if let Err(e) = self.session_manager.release_session(&session_id) {
            error!("Failed to release session {}: {}", session_id, e);
        }
        info!("WebSocket connection closed - Session: {} from {} ({} still open)",
              session_id, self.peer_addr, self.session_manager.get_session_count());
    }

    // Runs inside the handshake callback: path check, optional token, slot
    fn authenticate_request(&self, req: &Request) -> Result<(String, Option<Claims>), ErrorResponse> {
        let path = req.uri().path();
        if path != WEBSOCKET_PATH {
            warn!("Unknown WebSocket path '{}' from {}", path, self.peer_addr);
            return Err(error_response(StatusCode::NOT_FOUND, "Invalid WebSocket path"));
        }

        let claims = match extract_jwt_from_request(req) {
            Some(token) => match self.session_manager.validate_jwt(&token) {
                Ok(claims) => Some(claims),
                Err(e) => {
                    warn!("WebSocket authentication failed for {}: {}", self.peer_addr, e);
                    return Err(error_response(StatusCode::UNAUTHORIZED, &e));
                }
            },
            None => None,
        };

        match self.session_manager.try_acquire_session(&self.peer_addr, claims.as_ref()) {
            Ok(session_id) => {
                info!("Accepted WebSocket session {} ({}) from {}",
                      session_id,
                      claims.as_ref().map(|c| c.sub.as_str()).unwrap_or("anonymous"),
                      self.peer_addr);
                Ok((session_id, claims))
            }
            Err(e) => {
                warn!("Rejecting WebSocket from {}: {}", self.peer_addr, e);
                Err(error_response(StatusCode::SERVICE_UNAVAILABLE, &e))
            }
        }
    }

    fn open_session(&self, claims: Option<Claims>) -> ClientSession {
        let Some(claims) = claims else {
            return ClientSession::anonymous();
        };

        match self.portfolio_service.holdings(&claims.sub) {
            Ok(holdings) => ClientSession::authenticated(claims.sub, holdings),
            Err(e) => {
                // Valid token for an account the store no longer knows
                warn!("Falling back to price-only feed for {}: {}", claims.sub, e);
                ClientSession::anonymous()
            }
        }
    }

    async fn run_connection(
        &self,
        ws_stream: WebSocketStream<TcpStream>,
        prices_rx: broadcast::Receiver<Arc<PriceSnapshot>>,
        holdings_rx: broadcast::Receiver<HoldingsChanged>,
        session: ClientSession,
        session_id: &str,
    ) {
        let (write, read) = ws_stream.split();
        let (close_tx, close_rx) = mpsc::channel::<()>(1);

        info!("WebSocket connection established - Session: {} from {}", session_id, self.peer_addr);

        let mut write_task = spawn_write_task(write, session, prices_rx, holdings_rx, close_rx);
        let mut read_task = spawn_read_task(read, close_tx, session_id.to_string());

        tokio::select! {
            _ = &mut write_task => {
                info!("Write task completed for session {}", session_id);
                read_task.abort();
            }
            _ = &mut read_task => {
                info!("Read task completed for session {}", session_id);
                // Give the writer a chance to see the close signal before aborting
                if tokio::time::timeout(std::time::Duration::from_secs(1), &mut write_task).await.is_err() {
                    write_task.abort();
                }
            }
        }
    }
}

/// Single consumer per connection: snapshots and holdings changes are
/// applied one at a time, in arrival order.
fn spawn_write_task(
    mut write: WsSink,
    mut session: ClientSession,
    mut prices_rx: broadcast::Receiver<Arc<PriceSnapshot>>,
    mut holdings_rx: broadcast::Receiver<HoldingsChanged>,
    mut close_rx: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let frames = tokio::select! {
                snapshot = prices_rx.recv() => match snapshot {
                    Ok(snapshot) => session.on_snapshot(snapshot),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection lagging, skipped {} price ticks", skipped);
                        match newest_buffered(&mut prices_rx) {
                            Some(snapshot) => session.on_snapshot(snapshot),
                            None => continue,
                        }
                    }
                    Err(RecvError::Closed) => {
                        info!("Price feed closed");
                        break;
                    }
                },
                change = holdings_rx.recv() => match change {
                    Ok(change) => session.on_holdings_changed(&change).into_iter().collect(),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection lagging, skipped {} holdings events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        info!("Holdings event channel closed");
                        break;
                    }
                },
                _ = close_rx.recv() => {
                    info!("Received close signal from read task");
                    let _ = write.close().await;
                    break;
                }
            };

            for frame in frames {
                if let Err(e) = write.send(Message::Text(frame)).await {
                    error!("Error sending message{}: {:?}",
                           session.email().map(|e| format!(" to {}", e)).unwrap_or_default(), e);
                    return;
                }
            }
        }
    })
}

/// Drains whatever is still queued and returns only the last value, so a
/// lagging receiver resumes at the newest tick instead of the oldest one
/// left in the ring buffer.
fn newest_buffered<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<T> {
    let mut newest = None;
    loop {
        match rx.try_recv() {
            Ok(value) => newest = Some(value),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return newest,
        }
    }
}

fn spawn_read_task(
    mut read: WsSource,
    close_tx: mpsc::Sender<()>,
    session_id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Close(close_frame)) => {
                    info!("Received close frame from session {}: {:?}", session_id, close_frame);
                    break;
                }
                Ok(Message::Text(text)) => {
                    // Push-only protocol; inbound text is ignored
                    info!("Ignoring text message from session {}: {}", session_id, text);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Error reading message from session {}: {:?}", session_id, e);
                    break;
                }
            }
        }

        if close_tx.send(()).await.is_err() {
            warn!("Failed to send close signal for session {}", session_id);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lagging_receiver_jumps_to_newest() {
        let (tx, mut rx) = broadcast::channel(4);
        for tick in 0..10 {
            tx.send(tick).unwrap();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(6))));
        assert_eq!(newest_buffered(&mut rx), Some(9));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        tx.send(10).unwrap();
        assert_eq!(rx.recv().await.unwrap(), 10);
    }

    #[test]
    fn test_newest_buffered_on_empty_channel() {
        let (tx, mut rx) = broadcast::channel::<u32>(4);
        assert_eq!(newest_buffered(&mut rx), None);
        drop(tx);
        assert_eq!(newest_buffered(&mut rx), None);
    }
}
