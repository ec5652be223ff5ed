//! Liquidity/momentum ranking
//!
//! Each cycle reads the tick cache and window store for every tracked
//! instrument, filters and scores them, and publishes a sorted
//! [`RankedSnapshot`] to the [`SnapshotBoard`] in one swap.

mod board;
mod engine;
mod filter;
mod scoring;
mod session;
mod types;

pub use board::SnapshotBoard;
pub use engine::{CycleReport, EngineConfig, RankingEngine};
pub use filter::{FilterResult, LiquidityFilter, RejectReason};
pub use scoring::{CompositeScorer, ScoreContext, Scorer};
pub use session::{AlwaysOpen, NseSession, SessionGate};
pub use types::{ContractMetrics, RankedContract, RankedSnapshot, WindowVolumes};
