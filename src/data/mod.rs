//! Persistence of volume history and ranked snapshots
//!
//! Writes are best-effort: the ranking cycle enqueues records without
//! waiting, and a worker flushes them to a [`SnapshotSink`].

mod parquet;
mod recorder;

pub use parquet::{snapshot_schema, volume_history_schema, ParquetSink};
pub use recorder::{RecorderConfig, RecorderStats, SnapshotRecorder};

#[cfg(test)]
pub(crate) use recorder::tests::MemorySink;

use crate::error::SinkError;
use crate::ranking::RankedSnapshot;
use crate::window::VolumeSample;
use async_trait::async_trait;
use std::sync::Arc;

/// Append-only store for volume samples and snapshots
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn write_volumes(&self, samples: Vec<VolumeSample>) -> Result<(), SinkError>;

    async fn write_snapshots(&self, snapshots: Vec<Arc<RankedSnapshot>>) -> Result<(), SinkError>;
}
