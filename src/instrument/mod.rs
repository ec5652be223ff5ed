//! Tracked instrument universe
//!
//! The universe is resolved once per session by an [`InstrumentCatalog`] and
//! never changes afterwards. Catalog order is the tie-break order used by the
//! ranking engine.

mod kite;

pub use kite::{
    parse_instrument_dump, select_universe, KiteCatalog, KiteCatalogConfig, KiteInstrumentRow,
    KITE_API_URL,
};

use crate::error::CatalogError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque upstream instrument identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentToken(pub u32);

impl fmt::Display for InstrumentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Option leg type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentType {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
    #[serde(rename = "FUT")]
    Future,
}

impl InstrumentType {
    /// Exchange code (CE / PE / FUT)
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Call => "CE",
            InstrumentType::Put => "PE",
            InstrumentType::Future => "FUT",
        }
    }
}

impl std::str::FromStr for InstrumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CE" => Ok(InstrumentType::Call),
            "PE" => Ok(InstrumentType::Put),
            "FUT" => Ok(InstrumentType::Future),
            other => Err(format!("unknown instrument type {other}")),
        }
    }
}

/// A contract tracked for the whole session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedInstrument {
    pub token: InstrumentToken,
    pub tradingsymbol: String,
    pub strike: Decimal,
    pub instrument_type: InstrumentType,
    pub expiry: NaiveDate,
}

/// Immutable, ordered set of tracked instruments
#[derive(Debug, Clone, Default)]
pub struct Universe {
    instruments: Vec<TrackedInstrument>,
}

impl Universe {
    /// Build a universe, dropping repeated tokens after their first occurrence
    pub fn new(instruments: Vec<TrackedInstrument>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let instruments = instruments
            .into_iter()
            .filter(|i| seen.insert(i.token))
            .collect();
        Self { instruments }
    }

    /// Instruments in catalog order
    pub fn instruments(&self) -> &[TrackedInstrument] {
        &self.instruments
    }

    /// Subscription set in catalog order
    pub fn tokens(&self) -> Vec<InstrumentToken> {
        self.instruments.iter().map(|i| i.token).collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

/// Resolves the tracked universe at startup
#[async_trait]
pub trait InstrumentCatalog: Send + Sync {
    async fn resolve(&self) -> Result<Universe, CatalogError>;
}

/// Fixed universe, for replays and tests
pub struct StaticCatalog {
    instruments: Vec<TrackedInstrument>,
}

impl StaticCatalog {
    pub fn new(instruments: Vec<TrackedInstrument>) -> Self {
        Self { instruments }
    }
}

#[async_trait]
impl InstrumentCatalog for StaticCatalog {
    async fn resolve(&self) -> Result<Universe, CatalogError> {
        if self.instruments.is_empty() {
            return Err(CatalogError::Empty {
                index: "static".into(),
                strike_range: "n/a".into(),
            });
        }
        Ok(Universe::new(self.instruments.clone()))
    }
}
