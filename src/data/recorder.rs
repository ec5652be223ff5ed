//! Buffered, non-blocking sink writer

use super::SnapshotSink;
use crate::config::DataConfig;
use crate::error::SinkError;
use crate::ranking::RankedSnapshot;
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use crate::window::VolumeSample;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Configuration for the recorder worker
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Rows buffered per table before flushing
    pub buffer_size: usize,
    /// Maximum time between flushes
    pub flush_interval: Duration,
    /// Upper bound on a single sink call
    pub write_timeout: Duration,
    /// Queue depth between producers and the worker
    pub channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::from(&DataConfig::default())
    }
}

impl From<&DataConfig> for RecorderConfig {
    fn from(config: &DataConfig) -> Self {
        Self {
            buffer_size: config.buffer_size.max(1),
            flush_interval: Duration::from_secs(config.flush_interval_secs.max(1)),
            write_timeout: Duration::from_secs(config.write_timeout_secs.max(1)),
            channel_capacity: config.channel_capacity.max(1),
        }
    }
}

/// Recording statistics
#[derive(Debug, Default, Clone)]
pub struct RecorderStats {
    pub volumes_received: u64,
    pub volumes_written: u64,
    pub snapshots_received: u64,
    pub snapshots_written: u64,
    /// Records rejected because the queue was full
    pub dropped: u64,
    /// Flushes that failed or timed out
    pub failures: u64,
    pub last_flush: Option<DateTime<Utc>>,
}

enum SinkRecord {
    Volumes(Vec<VolumeSample>),
    Snapshot(Arc<RankedSnapshot>),
}

/// Producer handle; enqueueing never waits
#[derive(Clone)]
pub struct SnapshotRecorder {
    tx: mpsc::Sender<SinkRecord>,
    stats: Arc<RwLock<RecorderStats>>,
}

impl SnapshotRecorder {
    /// Spawn the worker; it flushes once and exits when `cancel` fires
    pub fn spawn(
        sink: Arc<dyn SnapshotSink>,
        config: RecorderConfig,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let stats = Arc::new(RwLock::new(RecorderStats::default()));

        let worker = Worker {
            sink,
            config,
            stats: stats.clone(),
            volumes: Vec::new(),
            snapshots: Vec::new(),
            snapshot_rows: 0,
        };
        let handle = tokio::spawn(worker.run(rx, cancel));

        (Self { tx, stats }, handle)
    }

    /// Queue raw volume samples
    pub fn record_volumes(&self, samples: Vec<VolumeSample>) {
        if samples.is_empty() {
            return;
        }
        let count = samples.len() as u64;
        if self.enqueue(SinkRecord::Volumes(samples)) {
            self.stats.write().volumes_received += count;
        }
    }

    /// Queue a published snapshot
    pub fn record_snapshot(&self, snapshot: Arc<RankedSnapshot>) {
        if self.enqueue(SinkRecord::Snapshot(snapshot)) {
            self.stats.write().snapshots_received += 1;
        }
    }

    fn enqueue(&self, record: SinkRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.stats.write().dropped += 1;
                increment_counter(CounterMetric::SinkDropped, 1);
                tracing::warn!("Sink queue full, dropping record");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Sink worker stopped, dropping record");
                false
            }
        }
    }

    /// Get current statistics
    pub fn stats(&self) -> RecorderStats {
        self.stats.read().clone()
    }
}

struct Worker {
    sink: Arc<dyn SnapshotSink>,
    config: RecorderConfig,
    stats: Arc<RwLock<RecorderStats>>,
    volumes: Vec<VolumeSample>,
    snapshots: Vec<Arc<RankedSnapshot>>,
    snapshot_rows: usize,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<SinkRecord>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    while let Ok(record) = rx.try_recv() {
                        self.buffer(record);
                    }
                    break;
                }

                record = rx.recv() => match record {
                    Some(record) => {
                        self.buffer(record);
                        if self.volumes.len() >= self.config.buffer_size {
                            self.flush_volumes().await;
                        }
                        if self.snapshot_rows >= self.config.buffer_size {
                            self.flush_snapshots().await;
                        }
                    }
                    None => break,
                },

                _ = ticker.tick() => {
                    self.flush_volumes().await;
                    self.flush_snapshots().await;
                }
            }
        }

        self.flush_volumes().await;
        self.flush_snapshots().await;
        tracing::info!(stats = ?*self.stats.read(), "Snapshot recorder shutting down");
    }

    fn buffer(&mut self, record: SinkRecord) {
        match record {
            SinkRecord::Volumes(samples) => self.volumes.extend(samples),
            SinkRecord::Snapshot(snapshot) => {
                self.snapshot_rows += snapshot.len();
                self.snapshots.push(snapshot);
            }
        }
    }

    async fn flush_volumes(&mut self) {
        if self.volumes.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.volumes);
        let count = batch.len() as u64;

        let write = self.sink.write_volumes(batch);
        if self.write("volume history", write).await {
            self.stats.write().volumes_written += count;
        }
    }

    async fn flush_snapshots(&mut self) {
        if self.snapshots.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.snapshots);
        let count = batch.len() as u64;
        self.snapshot_rows = 0;

        let write = self.sink.write_snapshots(batch);
        if self.write("snapshots", write).await {
            self.stats.write().snapshots_written += count;
        }
    }

    /// Run one bounded sink call; failures are logged and the batch dropped
    async fn write(
        &self,
        table: &'static str,
        write: impl Future<Output = Result<(), SinkError>>,
    ) -> bool {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(self.config.write_timeout)),
        };
        record_latency(LatencyMetric::SinkWrite, started.elapsed());

        match result {
            Ok(()) => {
                self.stats.write().last_flush = Some(Utc::now());
                tracing::debug!(table, "Flushed to sink");
                true
            }
            Err(e) => {
                self.stats.write().failures += 1;
                increment_counter(CounterMetric::SinkFailures, 1);
                tracing::warn!(table, error = %e, "Sink write failed, dropping batch");
                false
            }
        }
    }
}
