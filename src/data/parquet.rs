//! Parquet snapshot sink
//!
//! Each flush writes one new file per table, so files are never rewritten.

use super::SnapshotSink;
use crate::error::SinkError;
use crate::ranking::RankedSnapshot;
use crate::window::VolumeSample;
use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const VOLUME_PREFIX: &str = "volume_history";
const SNAPSHOT_PREFIX: &str = "snapshots";

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Volume history fields
pub fn volume_history_schema() -> Schema {
    Schema::new(vec![
        Field::new("token", DataType::UInt32, false),
        Field::new("volume", DataType::UInt64, false),
        Field::new("timestamp", timestamp_type(), false),
    ])
}

/// Snapshot fields, one row per ranked contract
pub fn snapshot_schema() -> Schema {
    let mut fields = vec![
        Field::new("snapshot_id", DataType::Utf8, false),
        Field::new("timestamp", timestamp_type(), false),
        Field::new("rank", DataType::UInt32, false),
        Field::new("token", DataType::UInt32, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("strike", DataType::Utf8, false), // Decimal as string
        Field::new("type", DataType::Utf8, false),
        Field::new("ltp", DataType::Utf8, false),
        Field::new("volume", DataType::UInt64, false),
        Field::new("oi", DataType::UInt64, false),
        Field::new("change", DataType::Utf8, false),
        Field::new("spread", DataType::Utf8, false),
    ];
    for name in ["vol_10s", "vol_30s", "vol_1m", "vol_3m", "vol_5m"] {
        fields.push(Field::new(name, DataType::UInt64, false));
    }
    fields.push(Field::new("score", DataType::Utf8, false));
    fields.push(Field::new("confidence", DataType::Utf8, false));

    Schema::new(fields)
}

/// Writes append-only Parquet files into one directory
pub struct ParquetSink {
    output_dir: PathBuf,
    sequence: AtomicU64,
}

impl ParquetSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{prefix}_{YYYYmmdd_HHMMSS}_{seq}.parquet`
    fn file_path(&self, prefix: &str, timestamp: DateTime<Utc>) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let filename = format!(
            "{}_{}_{:04}.parquet",
            prefix,
            timestamp.format("%Y%m%d_%H%M%S"),
            seq
        );
        self.output_dir.join(filename)
    }
}

#[async_trait]
impl SnapshotSink for ParquetSink {
    async fn write_volumes(&self, samples: Vec<VolumeSample>) -> Result<(), SinkError> {
        if samples.is_empty() {
            return Ok(());
        }
        let path = self.file_path(VOLUME_PREFIX, Utc::now());
        let dir = self.output_dir.clone();
        tokio::task::spawn_blocking(move || {
            fs::create_dir_all(&dir)?;
            write_volume_file(&path, &samples)
        })
        .await
        .map_err(|e| SinkError::Worker(e.to_string()))?
    }

    async fn write_snapshots(&self, snapshots: Vec<Arc<RankedSnapshot>>) -> Result<(), SinkError> {
        if snapshots.iter().all(|s| s.is_empty()) {
            return Ok(());
        }
        let path = self.file_path(SNAPSHOT_PREFIX, Utc::now());
        let dir = self.output_dir.clone();
        tokio::task::spawn_blocking(move || {
            fs::create_dir_all(&dir)?;
            write_snapshot_file(&path, &snapshots)
        })
        .await
        .map_err(|e| SinkError::Worker(e.to_string()))?
    }
}

fn write_batch(path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<(), SinkError> {
    let started = Instant::now();
    let file = File::create(path)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
    let batch = RecordBatch::try_new(schema, columns)?;
    let rows = batch.num_rows();

    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, rows, elapsed_ms = started.elapsed().as_millis() as u64, "Wrote Parquet file");
    Ok(())
}

fn write_volume_file(path: &Path, samples: &[VolumeSample]) -> Result<(), SinkError> {
    let tokens: Vec<u32> = samples.iter().map(|s| s.token.0).collect();
    let volumes: Vec<u64> = samples.iter().map(|s| s.cumulative_volume).collect();
    let timestamps: Vec<i64> = samples
        .iter()
        .map(|s| s.timestamp.timestamp_micros())
        .collect();

    write_batch(
        path,
        Arc::new(volume_history_schema()),
        vec![
            Arc::new(UInt32Array::from(tokens)) as ArrayRef,
            Arc::new(UInt64Array::from(volumes)) as ArrayRef,
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")) as ArrayRef,
        ],
    )
}

fn write_snapshot_file(path: &Path, snapshots: &[Arc<RankedSnapshot>]) -> Result<(), SinkError> {
    let rows: Vec<(&RankedSnapshot, u32, &crate::ranking::RankedContract)> = snapshots
        .iter()
        .flat_map(|s| {
            s.contracts
                .iter()
                .enumerate()
                .map(move |(i, c)| (s.as_ref(), i as u32 + 1, c))
        })
        .collect();

    let strings = |f: &dyn Fn(&crate::ranking::RankedContract) -> String| -> ArrayRef {
        Arc::new(StringArray::from(
            rows.iter().map(|(_, _, c)| f(c)).collect::<Vec<_>>(),
        ))
    };
    let counts = |f: &dyn Fn(&crate::ranking::RankedContract) -> u64| -> ArrayRef {
        Arc::new(UInt64Array::from(
            rows.iter().map(|(_, _, c)| f(c)).collect::<Vec<_>>(),
        ))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            rows.iter().map(|(s, _, _)| s.id.to_string()).collect::<Vec<_>>(),
        )),
        Arc::new(
            TimestampMicrosecondArray::from(
                rows.iter()
                    .map(|(s, _, _)| s.generated_at.timestamp_micros())
                    .collect::<Vec<_>>(),
            )
            .with_timezone("UTC"),
        ),
        Arc::new(UInt32Array::from(
            rows.iter().map(|(_, rank, _)| *rank).collect::<Vec<_>>(),
        )),
        Arc::new(UInt32Array::from(
            rows.iter().map(|(_, _, c)| c.token.0).collect::<Vec<_>>(),
        )),
        strings(&|c| c.symbol.clone()),
        strings(&|c| c.strike.to_string()),
        strings(&|c| c.instrument_type.as_str().to_string()),
        strings(&|c| c.ltp.to_string()),
        counts(&|c| c.volume),
        counts(&|c| c.oi),
        strings(&|c| c.change.to_string()),
        strings(&|c| c.spread.to_string()),
        counts(&|c| c.vol_10s),
        counts(&|c| c.vol_30s),
        counts(&|c| c.vol_1m),
        counts(&|c| c.vol_3m),
        counts(&|c| c.vol_5m),
        strings(&|c| c.score.to_string()),
        strings(&|c| c.confidence.to_string()),
    ];

    write_batch(path, Arc::new(snapshot_schema()), columns)
}
