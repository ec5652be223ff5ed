//! Scanner wiring and query surface
//!
//! [`ScannerBuilder::start`] resolves the universe once, then spawns three
//! tasks sharing one cancellation token: the connection supervisor, the
//! ranking engine and (when a sink is configured) the snapshot recorder.

use crate::config::Config;
use crate::data::{ParquetSink, RecorderConfig, SnapshotRecorder, SnapshotSink};
use crate::error::{CatalogError, StartError};
use crate::feed::{ConnectionSupervisor, FeedState, FeedTransport, KiteFeed, TickCache};
use crate::instrument::{InstrumentCatalog, KiteCatalog, Universe};
use crate::ranking::{
    CompositeScorer, EngineConfig, LiquidityFilter, NseSession, RankedSnapshot, RankingEngine,
    SessionGate, SnapshotBoard,
};
use crate::window::RollingWindowStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Answer to a ranking query; none of these is an error
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanResponse {
    MarketClosed,
    /// No non-empty snapshot published yet
    CollectingData,
    #[serde(rename = "ok")]
    Ranked(Arc<RankedSnapshot>),
}

/// Process liveness, independent of market state
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub feed_state: FeedState,
    pub uptime_secs: u64,
    pub tracked_instruments: usize,
    pub last_snapshot_at: Option<DateTime<Utc>>,
}

/// Collaborators default to the Kite implementations built from [`Config`]
pub struct ScannerBuilder {
    config: Config,
    catalog: Option<Arc<dyn InstrumentCatalog>>,
    transport: Option<Arc<dyn FeedTransport>>,
    sink: Option<Arc<dyn SnapshotSink>>,
    gate: Option<Arc<dyn SessionGate>>,
}

impl ScannerBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            catalog: None,
            transport: None,
            sink: None,
            gate: None,
        }
    }

    pub fn catalog(mut self, catalog: Arc<dyn InstrumentCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn FeedTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist to `sink` instead of the configured Parquet directory
    pub fn sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn gate(mut self, gate: Arc<dyn SessionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Resolve the universe and spawn the scanner tasks
    ///
    /// Must be called inside a tokio runtime. A catalog failure is fatal.
    pub async fn start(self) -> Result<Scanner, StartError> {
        let config = self.config;
        config.validate()?;

        let catalog: Arc<dyn InstrumentCatalog> = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(KiteCatalog::new(config.catalog_config())?),
        };
        let gate: Arc<dyn SessionGate> = match self.gate {
            Some(gate) => gate,
            None => Arc::new(NseSession::from_config(&config.session)?),
        };
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(KiteFeed::new(config.feed_config())) as Arc<dyn FeedTransport>
        });
        let sink = self.sink.or_else(|| {
            config.data.capture_enabled.then(|| {
                Arc::new(ParquetSink::new(config.data.output_dir.clone())) as Arc<dyn SnapshotSink>
            })
        });

        let universe = catalog.resolve().await?;
        if universe.is_empty() {
            return Err(CatalogError::Empty {
                index: config.universe.index.clone(),
                strike_range: config.universe.strike_range.to_string(),
            }
            .into());
        }
        let universe = Arc::new(universe);
        tracing::info!(contracts = universe.len(), "Tracked universe resolved");

        let cancel = CancellationToken::new();
        let ticks = Arc::new(TickCache::new());
        let store = Arc::new(RollingWindowStore::new(config.window_config()));
        let board = Arc::new(SnapshotBoard::new());
        let mut tasks = Vec::with_capacity(3);

        let supervisor = ConnectionSupervisor::new(
            transport,
            &universe,
            ticks.clone(),
            store.clone(),
            config.backoff_config(),
        );
        let feed_state = supervisor.state();
        let feed_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            supervisor.run(feed_cancel.clone()).await;
            // A supervisor that gave up leaves nothing to rank
            feed_cancel.cancel();
        }));

        let mut engine = RankingEngine::new(
            universe.clone(),
            ticks,
            store,
            Arc::new(CompositeScorer::from_config(&config.scoring)),
            LiquidityFilter::new(config.filter.clone()),
            gate.clone(),
            board.clone(),
            EngineConfig::new(&config.ranking, &config.windows),
        );
        if let Some(sink) = sink {
            let (recorder, handle) =
                SnapshotRecorder::spawn(sink, RecorderConfig::from(&config.data), cancel.clone());
            engine = engine.with_recorder(recorder);
            tasks.push(handle);
        }
        tasks.push(tokio::spawn(engine.run(cancel.clone())));

        Ok(Scanner {
            universe,
            board,
            gate,
            feed_state,
            started_at: Instant::now(),
            cancel,
            tasks,
        })
    }
}

/// A running scanner
pub struct Scanner {
    universe: Arc<Universe>,
    board: Arc<SnapshotBoard>,
    gate: Arc<dyn SessionGate>,
    feed_state: watch::Receiver<FeedState>,
    started_at: Instant,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Scanner {
    pub fn builder(config: Config) -> ScannerBuilder {
        ScannerBuilder::new(config)
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Current ranking
    pub fn scan(&self) -> ScanResponse {
        self.scan_at(Utc::now())
    }

    pub fn scan_at(&self, now: DateTime<Utc>) -> ScanResponse {
        if !self.gate.is_open(now) {
            return ScanResponse::MarketClosed;
        }
        match self.board.latest() {
            Some(snapshot) if !snapshot.is_empty() => ScanResponse::Ranked(snapshot),
            _ => ScanResponse::CollectingData,
        }
    }

    pub fn health(&self) -> Health {
        Health {
            status: "running",
            feed_state: *self.feed_state.borrow(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            tracked_instruments: self.universe.len(),
            last_snapshot_at: self.board.latest().map(|s| s.generated_at),
        }
    }

    /// Resolves once shutdown has been requested, or the feed gave up
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }

    /// Stop every task and wait for the recorder to flush
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Scanner task ended abnormally");
            }
        }
        tracing::info!("Scanner stopped");
    }
}
