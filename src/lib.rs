//! options-scanner: real-time liquidity/momentum ranking for index options
//!
//! This library provides the core components for:
//! - Tracked universe resolution from the Kite instrument dump
//! - Streaming ticks from the Kite Ticker with supervised reconnects
//! - Rolling time-windowed volume aggregation
//! - Periodic scoring, filtering and atomic snapshot publication
//! - Best-effort persistence of volume history and snapshots to Parquet
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod feed;
pub mod instrument;
pub mod ranking;
pub mod scanner;
pub mod telemetry;
pub mod window;
pub mod ws;

pub use scanner::{Health, ScanResponse, Scanner, ScannerBuilder};
