//! Periodic ranking cycle

use super::{
    ContractMetrics, LiquidityFilter, RankedContract, RankedSnapshot, ScoreContext, Scorer,
    SessionGate, SnapshotBoard, WindowVolumes,
};
use crate::config::{RankingConfig, WindowConfig};
use crate::data::SnapshotRecorder;
use crate::error::ScoreError;
use crate::feed::TickCache;
use crate::instrument::{InstrumentToken, TrackedInstrument, Universe};
use crate::telemetry::{
    increment_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use crate::window::{VolumeSample, VolumeWindows};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Schedule and output shape of the ranking cycle
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub interval: Duration,
    /// Sleep used instead of `interval` while the session is closed
    pub closed_interval: Duration,
    /// Window sizes, shortest first
    pub windows: [chrono::Duration; 5],
    pub top_n: Option<usize>,
}

impl EngineConfig {
    pub fn new(ranking: &RankingConfig, windows: &WindowConfig) -> Self {
        Self {
            interval: ranking.interval(),
            closed_interval: ranking.closed_interval(),
            windows: windows.sizes().map(chrono::Duration::seconds),
            top_n: ranking.top_n,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(&RankingConfig::default(), &WindowConfig::default())
    }
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Session gate closed; nothing computed
    MarketClosed,
    Published {
        ranked: usize,
        /// No tick received yet
        missing: usize,
        filtered: usize,
        failed: usize,
    },
}

/// Scores the tracked universe and publishes snapshots
pub struct RankingEngine {
    universe: Arc<Universe>,
    ticks: Arc<TickCache>,
    windows: Arc<dyn VolumeWindows>,
    scorer: Arc<dyn Scorer>,
    filter: LiquidityFilter,
    gate: Arc<dyn SessionGate>,
    board: Arc<SnapshotBoard>,
    recorder: Option<SnapshotRecorder>,
    config: EngineConfig,
    /// Timestamp of the last sample forwarded to the recorder, per token
    forwarded: HashMap<InstrumentToken, DateTime<Utc>>,
}

impl RankingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        universe: Arc<Universe>,
        ticks: Arc<TickCache>,
        windows: Arc<dyn VolumeWindows>,
        scorer: Arc<dyn Scorer>,
        filter: LiquidityFilter,
        gate: Arc<dyn SessionGate>,
        board: Arc<SnapshotBoard>,
        config: EngineConfig,
    ) -> Self {
        Self {
            universe,
            ticks,
            windows,
            scorer,
            filter,
            gate,
            board,
            recorder: None,
            config,
            forwarded: HashMap::new(),
        }
    }

    /// Forward samples and snapshots to a recorder after each cycle
    pub fn with_recorder(mut self, recorder: SnapshotRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Run cycles until cancelled; cycles never overlap
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            instruments = self.universe.len(),
            interval_ms = self.config.interval.as_millis() as u64,
            "Ranking engine started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.run_cycle(Utc::now()).await {
                CycleReport::MarketClosed => {
                    tracing::debug!(
                        sleep_secs = self.config.closed_interval.as_secs(),
                        "Market closed, skipping ranking"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.closed_interval) => {}
                    }
                    interval.reset();
                }
                CycleReport::Published {
                    ranked,
                    missing,
                    filtered,
                    failed,
                } => {
                    tracing::debug!(ranked, missing, filtered, failed, "Ranking cycle complete");
                }
            }
        }

        tracing::info!("Ranking engine stopped");
    }

    /// One gate check, scoring pass and publication at `now`
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        if !self.gate.is_open(now) {
            return CycleReport::MarketClosed;
        }
        let started = Instant::now();

        let mut candidates = Vec::with_capacity(self.universe.len());
        let mut missing = 0;
        let mut filtered = 0;
        let mut failed = 0;

        for instrument in self.universe.instruments() {
            let Some(tick) = self.ticks.get(instrument.token) else {
                missing += 1;
                continue;
            };

            let windows = match self.window_volumes(instrument, now).await {
                Ok(windows) => windows,
                Err(e) => {
                    failed += 1;
                    increment_counter(CounterMetric::ScoringErrors, 1);
                    tracing::warn!(token = %instrument.token, error = %e, "Skipping instrument this cycle");
                    continue;
                }
            };

            let metrics = ContractMetrics::new(instrument, &tick, windows);
            let verdict = self.filter.apply(&metrics);
            if !verdict.is_pass() {
                filtered += 1;
                tracing::trace!(token = %instrument.token, ?verdict, "Filtered out");
                continue;
            }
            candidates.push(metrics);
        }
        if missing > 0 {
            increment_counter(CounterMetric::MissingTicks, missing as u64);
        }

        let ctx = ScoreContext::from_metrics(&candidates);
        let mut scored: Vec<(ContractMetrics, Decimal)> = Vec::with_capacity(candidates.len());
        for metrics in candidates {
            match self.scorer.score(&metrics, &ctx) {
                Ok(score) => scored.push((metrics, score)),
                Err(e) => {
                    failed += 1;
                    increment_counter(CounterMetric::ScoringErrors, 1);
                    tracing::warn!(token = %metrics.token, error = %e, "Skipping instrument this cycle");
                }
            }
        }

        // Stable: equal scores keep catalog order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(n) = self.config.top_n {
            scored.truncate(n);
        }

        let top_score = scored.first().map(|(_, s)| *s).unwrap_or_default();
        let contracts: Vec<RankedContract> = scored
            .iter()
            .map(|(m, score)| RankedContract::new(m, *score, self.scorer.confidence(*score, top_score)))
            .collect();

        let ranked = contracts.len();
        let snapshot = self.board.publish(RankedSnapshot::new(now, contracts));
        set_gauge(GaugeMetric::RankedContracts, ranked as f64);
        record_latency(LatencyMetric::RankingCycle, started.elapsed());

        self.forward(snapshot);

        CycleReport::Published {
            ranked,
            missing,
            filtered,
            failed,
        }
    }

    async fn window_volumes(
        &self,
        instrument: &TrackedInstrument,
        now: DateTime<Utc>,
    ) -> Result<WindowVolumes, ScoreError> {
        let mut deltas = [0u64; 5];
        for (delta, window) in deltas.iter_mut().zip(self.config.windows) {
            *delta = self
                .windows
                .windowed_delta(instrument.token, window, now)
                .await?;
        }
        Ok(WindowVolumes::from_deltas(deltas))
    }

    /// Hand new samples and the snapshot to the recorder without waiting
    fn forward(&mut self, snapshot: Arc<RankedSnapshot>) {
        let Some(recorder) = &self.recorder else {
            return;
        };

        let mut samples: Vec<VolumeSample> = Vec::new();
        for instrument in self.universe.instruments() {
            let Some(sample) = self.windows.latest_sample(instrument.token) else {
                continue;
            };
            let newer = self
                .forwarded
                .get(&instrument.token)
                .map_or(true, |last| sample.timestamp > *last);
            if newer {
                self.forwarded.insert(instrument.token, sample.timestamp);
                samples.push(sample);
            }
        }

        recorder.record_volumes(samples);
        recorder.record_snapshot(snapshot);
    }
}
