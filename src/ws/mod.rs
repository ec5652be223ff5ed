//! WebSocket client library
//!
//! Thin connection wrapper with handshake and read timeouts and ping/pong
//! handling. Reconnection policy lives in the feed supervisor.

mod client;
mod types;

pub use client::{WsClient, WsConnection};
pub(crate) use client::redact;
pub use types::{WsConfig, WsError, WsMessage};
