//! Market data feed
//!
//! Streaming ticks from the Kite Ticker into the tick cache and the rolling
//! window store, with a supervisor that owns reconnection.

mod cache;
mod kite;
mod supervisor;
mod types;

pub use cache::TickCache;
pub use kite::{parse_frame, parse_packet, subscription_messages, KiteFeed, KiteFeedConfig, KITE_WS_URL};
pub use supervisor::{BackoffConfig, ConnectionSupervisor};
pub use types::{Depth, DepthLevel, Tick};

#[cfg(test)]
pub(crate) use supervisor::tests as supervisor_tests;

use crate::error::FeedError;
use crate::instrument::InstrumentToken;
use async_trait::async_trait;
use serde::Serialize;

/// Streaming mode requested per token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Ltp,
    Quote,
    /// Quote plus OI and five-level depth
    Full,
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Ltp => "ltp",
            FeedMode::Quote => "quote",
            FeedMode::Full => "full",
        }
    }
}

/// Supervisor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    Disconnected,
    Connecting,
    Subscribed,
}

impl FeedState {
    pub(crate) fn gauge_value(&self) -> f64 {
        match self {
            FeedState::Disconnected => 0.0,
            FeedState::Connecting => 1.0,
            FeedState::Subscribed => 2.0,
        }
    }
}

/// Opens feed sessions
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn FeedSession>, FeedError>;
}

/// One live upstream connection
#[async_trait]
pub trait FeedSession: Send {
    /// Subscribe `tokens` in `mode`
    async fn subscribe(&mut self, tokens: &[InstrumentToken], mode: FeedMode)
        -> Result<(), FeedError>;

    /// Next non-empty tick batch; `None` when upstream closed cleanly
    async fn next_batch(&mut self) -> Option<Result<Vec<Tick>, FeedError>>;

    /// Close from our side on shutdown
    async fn close(&mut self) {}
}
