//! Ranking data types

use crate::feed::Tick;
use crate::instrument::{InstrumentToken, InstrumentType, TrackedInstrument};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Volume traded inside each configured window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowVolumes {
    pub vol_10s: u64,
    pub vol_30s: u64,
    pub vol_1m: u64,
    pub vol_3m: u64,
    pub vol_5m: u64,
}

impl WindowVolumes {
    /// Build from deltas ordered shortest window first
    pub fn from_deltas(deltas: [u64; 5]) -> Self {
        Self {
            vol_10s: deltas[0],
            vol_30s: deltas[1],
            vol_1m: deltas[2],
            vol_3m: deltas[3],
            vol_5m: deltas[4],
        }
    }

    pub fn as_array(&self) -> [u64; 5] {
        [self.vol_10s, self.vol_30s, self.vol_1m, self.vol_3m, self.vol_5m]
    }
}

/// Everything known about one contract at the start of a cycle
#[derive(Debug, Clone)]
pub struct ContractMetrics {
    pub token: InstrumentToken,
    pub symbol: String,
    pub strike: Decimal,
    pub instrument_type: InstrumentType,
    pub last_price: Decimal,
    pub volume: u64,
    pub open_interest: u64,
    pub change: Decimal,
    pub spread: Decimal,
    pub windows: WindowVolumes,
}

impl ContractMetrics {
    pub fn new(instrument: &TrackedInstrument, tick: &Tick, windows: WindowVolumes) -> Self {
        Self {
            token: instrument.token,
            symbol: instrument.tradingsymbol.clone(),
            strike: instrument.strike,
            instrument_type: instrument.instrument_type,
            last_price: tick.last_price,
            volume: tick.cumulative_volume,
            open_interest: tick.open_interest,
            change: tick.change,
            spread: tick.spread(),
            windows,
        }
    }
}

/// One row of a published ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedContract {
    pub token: InstrumentToken,
    pub symbol: String,
    pub strike: Decimal,
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    pub ltp: Decimal,
    pub volume: u64,
    pub oi: u64,
    pub change: Decimal,
    pub spread: Decimal,
    pub vol_10s: u64,
    pub vol_30s: u64,
    pub vol_1m: u64,
    pub vol_3m: u64,
    pub vol_5m: u64,
    pub score: Decimal,
    /// Score scaled to 0..=100
    pub confidence: Decimal,
}

impl RankedContract {
    pub fn new(metrics: &ContractMetrics, score: Decimal, confidence: Decimal) -> Self {
        let w = metrics.windows;
        Self {
            token: metrics.token,
            symbol: metrics.symbol.clone(),
            strike: metrics.strike,
            instrument_type: metrics.instrument_type,
            ltp: metrics.last_price,
            volume: metrics.volume,
            oi: metrics.open_interest,
            change: metrics.change,
            spread: metrics.spread,
            vol_10s: w.vol_10s,
            vol_30s: w.vol_30s,
            vol_1m: w.vol_1m,
            vol_3m: w.vol_3m,
            vol_5m: w.vol_5m,
            score,
            confidence,
        }
    }
}

/// An immutable, fully ordered ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSnapshot {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Best first
    pub contracts: Vec<RankedContract>,
}

impl RankedSnapshot {
    pub fn new(generated_at: DateTime<Utc>, contracts: Vec<RankedContract>) -> Self {
        Self {
            id: Uuid::new_v4(),
            generated_at,
            contracts,
        }
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}
