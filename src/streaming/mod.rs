//! Network surface: WebSocket frame stream plus health check.

mod ws_server;

pub use ws_server::{router, serve, AppState, WsTransport};
