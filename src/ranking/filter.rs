//! Liquidity filtering

use super::ContractMetrics;
use crate::config::FilterConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of applying the filter to a contract
#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult {
    /// Contract passed all thresholds
    Pass,
    /// Contract excluded from the snapshot
    Reject(RejectReason),
}

impl FilterResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, FilterResult::Pass)
    }
}

/// Reason for rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Session volume not above the minimum
    LowVolume(u64),
    /// Open interest not above the minimum
    LowOpenInterest(u64),
    /// Bid/ask spread not below the maximum
    WideSpread(Decimal),
}

/// Excludes illiquid contracts before scoring
#[derive(Debug, Clone)]
pub struct LiquidityFilter {
    config: FilterConfig,
}

impl LiquidityFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Filter that passes everything
    pub fn disabled() -> Self {
        Self::new(FilterConfig {
            enabled: false,
            ..Default::default()
        })
    }

    pub fn apply(&self, metrics: &ContractMetrics) -> FilterResult {
        if !self.config.enabled {
            return FilterResult::Pass;
        }

        if metrics.volume <= self.config.min_volume {
            return FilterResult::Reject(RejectReason::LowVolume(metrics.volume));
        }
        if metrics.open_interest <= self.config.min_oi {
            return FilterResult::Reject(RejectReason::LowOpenInterest(metrics.open_interest));
        }
        if metrics.spread >= self.config.max_spread {
            return FilterResult::Reject(RejectReason::WideSpread(metrics.spread));
        }

        FilterResult::Pass
    }
}
