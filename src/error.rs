//! Error taxonomy
//!
//! Each enum maps to one recovery policy:
//! - [`FeedError`] is retried by the connection supervisor
//! - [`WindowError`] and [`ScoreError`] skip one instrument for one cycle
//! - [`SinkError`] is logged and dropped
//! - [`CatalogError`] and [`ConfigError`] are fatal at startup

use crate::ws::WsError;
use std::time::Duration;
use thiserror::Error;

/// Transient feed failure (disconnect, socket error, protocol violation)
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    Ws(#[from] WsError),

    #[error("feed protocol error: {0}")]
    Protocol(String),

    /// Socket silent for longer than the read timeout
    #[error("no frame received for {0:?}")]
    Stale(Duration),
}

/// Tracked universe could not be resolved
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("instrument dump could not be parsed: {0}")]
    Csv(#[from] csv::Error),

    #[error("spot price unavailable for {0}")]
    SpotUnavailable(String),

    #[error("no contracts matched index {index} within {strike_range} of spot")]
    Empty { index: String, strike_range: String },
}

/// Windowed volume lookup failed for one instrument
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("sample history backend failed: {0}")]
    Backend(String),
}

/// Scoring failed for one instrument
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Persistence failure; never affects the published snapshot
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("sink write timed out after {0:?}")]
    Timeout(Duration),

    #[error("sink worker failed: {0}")]
    Worker(String),
}

/// Configuration rejected at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Scanner could not start
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
