//! Windowed volume aggregation
//!
//! Two strategies answer "volume traded in the last N seconds":
//! - [`RollingWindowStore`]: in-memory, fed by streaming ticks
//! - [`HistoryWindows`]: queries an external sample history
//!
//! Both compute `last - first` over the samples inside the window and
//! return 0 for fewer than two samples or for a negative difference.

mod history;
mod rolling;

pub use history::{HistoryWindows, SampleHistory};
pub use rolling::{RollingWindowConfig, RollingWindowStore};

use crate::error::WindowError;
use crate::instrument::InstrumentToken;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One cumulative-volume observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSample {
    pub token: InstrumentToken,
    pub timestamp: DateTime<Utc>,
    pub cumulative_volume: u64,
}

/// Result of offering a sample to a rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Appended,
    /// Timestamp not after the last recorded one; dropped
    Stale,
    /// Appended, but the volume is below the previous sample's
    Reset,
}

/// Source of windowed volume deltas for the ranking engine
#[async_trait]
pub trait VolumeWindows: Send + Sync {
    /// Volume traded in `[now - window, now]`
    async fn windowed_delta(
        &self,
        token: InstrumentToken,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<u64, WindowError>;

    /// Most recent sample, for forwarding to persistence
    ///
    /// Backends that already persist their samples return `None`.
    fn latest_sample(&self, _token: InstrumentToken) -> Option<VolumeSample> {
        None
    }
}

/// `last - first`, clamped to zero across an upstream counter reset
///
/// Resets are reported once, when the sample is recorded, not per query.
pub(crate) fn clamped_delta(first: u64, last: u64) -> u64 {
    last.saturating_sub(first)
}
