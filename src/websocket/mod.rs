pub mod events;
pub mod handler;
pub mod server;
pub mod session;

pub use handler::WebSocketHandler;
pub use server::run_websocket_server;
