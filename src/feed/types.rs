//! Tick schema
//!
//! Defaulting policy: every field except `token` and `observed_at` is
//! optional on the wire. A field the packet does not carry is zero
//! (prices, volume, OI, change) or empty (depth); `exchange_ts` is the only
//! field kept as `Option` because zero is not a meaningful time.

use crate::instrument::InstrumentToken;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One level of market depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: u64,
    pub orders: u32,
}

/// Five-level market depth, best first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depth {
    pub buy: Vec<DepthLevel>,
    pub sell: Vec<DepthLevel>,
}

/// A single market-data update for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub token: InstrumentToken,
    /// Local receive time; the ordering key for volume samples
    pub observed_at: DateTime<Utc>,
    /// Exchange timestamp, when the packet carries one
    pub exchange_ts: Option<DateTime<Utc>>,
    pub last_price: Decimal,
    /// Session-total traded quantity, not a delta
    pub cumulative_volume: u64,
    pub open_interest: u64,
    /// Percent change versus the previous close
    pub change: Decimal,
    pub depth: Depth,
}

impl Tick {
    /// Tick with every optional field at its default
    pub fn empty(token: InstrumentToken, observed_at: DateTime<Utc>) -> Self {
        Self {
            token,
            observed_at,
            exchange_ts: None,
            last_price: Decimal::ZERO,
            cumulative_volume: 0,
            open_interest: 0,
            change: Decimal::ZERO,
            depth: Depth::default(),
        }
    }

    /// Best bid price, zero when the book side is empty
    pub fn best_bid(&self) -> Decimal {
        self.depth.buy.first().map(|l| l.price).unwrap_or_default()
    }

    /// Best ask price, zero when the book side is empty
    pub fn best_ask(&self) -> Decimal {
        self.depth.sell.first().map(|l| l.price).unwrap_or_default()
    }

    /// `ask - bid` when both sides are quoted, zero otherwise
    pub fn spread(&self) -> Decimal {
        let bid = self.best_bid();
        let ask = self.best_ask();
        if bid.is_zero() || ask.is_zero() {
            Decimal::ZERO
        } else {
            ask - bid
        }
    }
}
