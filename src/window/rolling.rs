//! In-memory rolling window store
//!
//! Per-token sample deques behind per-token mutexes. The outer map is
//! write-locked only when a token is seen for the first time, so producers
//! for different tokens and the periodic reader never contend on a
//! universe-wide lock.

use super::{clamped_delta, RecordOutcome, VolumeSample, VolumeWindows};
use crate::error::WindowError;
use crate::instrument::InstrumentToken;
use crate::telemetry::{increment_counter, CounterMetric};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Retention bounds; whichever triggers first evicts
#[derive(Debug, Clone)]
pub struct RollingWindowConfig {
    /// Samples older than `latest - retention` are evicted
    pub retention: Duration,
    /// Hard ceiling on samples kept per token
    pub max_samples: usize,
}

impl Default for RollingWindowConfig {
    fn default() -> Self {
        Self {
            retention: Duration::minutes(5),
            max_samples: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Point {
    timestamp: DateTime<Utc>,
    cumulative_volume: u64,
}

type TokenWindow = Arc<Mutex<VecDeque<Point>>>;

/// Bounded, strictly time-ordered volume samples per token
#[derive(Debug)]
pub struct RollingWindowStore {
    config: RollingWindowConfig,
    windows: RwLock<HashMap<InstrumentToken, TokenWindow>>,
    stale_samples: AtomicU64,
    counter_resets: AtomicU64,
}

impl RollingWindowStore {
    pub fn new(config: RollingWindowConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
            stale_samples: AtomicU64::new(0),
            counter_resets: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RollingWindowConfig::default())
    }

    fn window(&self, token: InstrumentToken) -> Option<TokenWindow> {
        self.windows.read().get(&token).cloned()
    }

    fn window_or_insert(&self, token: InstrumentToken) -> TokenWindow {
        if let Some(window) = self.window(token) {
            return window;
        }
        let capacity = self.config.max_samples.min(1024);
        self.windows
            .write()
            .entry(token)
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::with_capacity(capacity))))
            .clone()
    }

    /// Append a sample if it is strictly newer than the last one
    ///
    /// Evicts by age and then by count on every append; each sample is
    /// evicted at most once, so the cost is amortized O(1).
    pub fn record(
        &self,
        token: InstrumentToken,
        timestamp: DateTime<Utc>,
        cumulative_volume: u64,
    ) -> RecordOutcome {
        let window = self.window_or_insert(token);
        let mut samples = window.lock();

        if let Some(last) = samples.back() {
            if timestamp <= last.timestamp {
                drop(samples);
                self.stale_samples.fetch_add(1, Ordering::Relaxed);
                increment_counter(CounterMetric::StaleSamples, 1);
                tracing::trace!(%token, %timestamp, "Dropping stale volume sample");
                return RecordOutcome::Stale;
            }
        }

        let previous = samples.back().map(|p| p.cumulative_volume);
        let reset = previous.is_some_and(|v| cumulative_volume < v);

        samples.push_back(Point {
            timestamp,
            cumulative_volume,
        });

        let cutoff = timestamp - self.config.retention;
        while samples.front().is_some_and(|p| p.timestamp < cutoff) {
            samples.pop_front();
        }
        while samples.len() > self.config.max_samples {
            samples.pop_front();
        }

        drop(samples);

        if reset {
            self.counter_resets.fetch_add(1, Ordering::Relaxed);
            increment_counter(CounterMetric::CounterResets, 1);
            tracing::warn!(
                %token,
                previous = previous.unwrap_or_default(),
                cumulative_volume,
                "Cumulative volume went backwards, window deltas across it clamp to zero"
            );
            return RecordOutcome::Reset;
        }

        RecordOutcome::Appended
    }

    /// Volume traded in `[now - window, now]`
    pub fn windowed_delta(&self, token: InstrumentToken, window: Duration, now: DateTime<Utc>) -> u64 {
        let Some(entry) = self.window(token) else {
            return 0;
        };

        let (first, last) = {
            let samples = entry.lock();
            let cutoff = now - window;
            let start = samples.partition_point(|p| p.timestamp < cutoff);
            if samples.len() - start < 2 {
                return 0;
            }
            match (samples.get(start), samples.back()) {
                (Some(first), Some(last)) => (first.cumulative_volume, last.cumulative_volume),
                _ => return 0,
            }
        };

        clamped_delta(first, last)
    }

    /// Most recent sample of a token
    pub fn latest(&self, token: InstrumentToken) -> Option<VolumeSample> {
        let entry = self.window(token)?;
        let samples = entry.lock();
        samples.back().map(|p| VolumeSample {
            token,
            timestamp: p.timestamp,
            cumulative_volume: p.cumulative_volume,
        })
    }

    /// Copy of every retained sample of a token, oldest first
    pub fn samples(&self, token: InstrumentToken) -> Vec<VolumeSample> {
        let Some(entry) = self.window(token) else {
            return Vec::new();
        };
        let samples = entry.lock();
        samples
            .iter()
            .map(|p| VolumeSample {
                token,
                timestamp: p.timestamp,
                cumulative_volume: p.cumulative_volume,
            })
            .collect()
    }

    /// Samples dropped as stale or duplicate since creation
    pub fn stale_count(&self) -> u64 {
        self.stale_samples.load(Ordering::Relaxed)
    }

    /// Upstream counter resets observed since creation
    pub fn reset_count(&self) -> u64 {
        self.counter_resets.load(Ordering::Relaxed)
    }

    /// Number of tokens with at least one sample
    pub fn token_count(&self) -> usize {
        self.windows.read().len()
    }
}

#[async_trait]
impl VolumeWindows for RollingWindowStore {
    async fn windowed_delta(
        &self,
        token: InstrumentToken,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<u64, WindowError> {
        Ok(RollingWindowStore::windowed_delta(self, token, window, now))
    }

    fn latest_sample(&self, token: InstrumentToken) -> Option<VolumeSample> {
        self.latest(token)
    }
}
