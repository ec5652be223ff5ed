//! Store-backed windowing
//!
//! For deployments that poll quotes and persist every observation to a
//! shared time-series store, the window delta is a range query over that
//! store instead of an in-memory deque.

use super::{clamped_delta, VolumeSample, VolumeWindows};
use crate::error::WindowError;
use crate::instrument::InstrumentToken;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Range query over persisted volume samples
#[async_trait]
pub trait SampleHistory: Send + Sync {
    /// Samples of `token` with `from <= timestamp <= to`, any order
    async fn samples_between(
        &self,
        token: InstrumentToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VolumeSample>, WindowError>;
}

/// [`VolumeWindows`] backed by a [`SampleHistory`]
pub struct HistoryWindows<H> {
    history: H,
}

impl<H: SampleHistory> HistoryWindows<H> {
    pub fn new(history: H) -> Self {
        Self { history }
    }
}

#[async_trait]
impl<H: SampleHistory> VolumeWindows for HistoryWindows<H> {
    async fn windowed_delta(
        &self,
        token: InstrumentToken,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<u64, WindowError> {
        let samples = self
            .history
            .samples_between(token, now - window, now)
            .await?;

        if samples.len() < 2 {
            return Ok(0);
        }

        let first = samples.iter().min_by_key(|s| s.timestamp);
        let last = samples.iter().max_by_key(|s| s.timestamp);
        match (first, last) {
            (Some(first), Some(last)) if first.timestamp < last.timestamp => {
                Ok(clamped_delta(first.cumulative_volume, last.cumulative_volume))
            }
            _ => Ok(0),
        }
    }
}
