//! Prometheus metrics

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Monotonic counters
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Ticks applied to the cache and window store
    TicksIngested,
    /// Volume samples dropped as out-of-order or duplicate
    StaleSamples,
    /// Negative window deltas clamped to zero
    CounterResets,
    /// Tracked instruments skipped for lack of a tick
    MissingTicks,
    /// Instruments skipped after a scoring error
    ScoringErrors,
    /// Sink writes that failed or timed out
    SinkFailures,
    /// Records dropped because the sink queue was full
    SinkDropped,
    /// Reconnect attempts scheduled by the supervisor
    Reconnects,
}

/// Point-in-time values
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Contracts in the latest snapshot
    RankedContracts,
    /// 0 = disconnected, 1 = connecting, 2 = subscribed
    FeedState,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One ranking cycle, gate to publication
    RankingCycle,
    /// One sink flush
    SinkWrite,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::TicksIngested => "scanner_ticks_ingested_total",
        CounterMetric::StaleSamples => "scanner_stale_samples_total",
        CounterMetric::CounterResets => "scanner_volume_counter_resets_total",
        CounterMetric::MissingTicks => "scanner_missing_ticks_total",
        CounterMetric::ScoringErrors => "scanner_scoring_errors_total",
        CounterMetric::SinkFailures => "scanner_sink_failures_total",
        CounterMetric::SinkDropped => "scanner_sink_dropped_total",
        CounterMetric::Reconnects => "scanner_feed_reconnects_total",
    }
}

/// Increment a counter
pub fn increment_counter(metric: CounterMetric, value: u64) {
    counter!(counter_name(metric)).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::RankedContracts => "scanner_ranked_contracts",
        GaugeMetric::FeedState => "scanner_feed_state",
    };
    gauge!(metric_name).set(value);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::RankingCycle => "scanner_ranking_cycle_ms",
        LatencyMetric::SinkWrite => "scanner_sink_write_ms",
    };
    histogram!(metric_name).record(duration.as_secs_f64() * 1_000.0);
}
