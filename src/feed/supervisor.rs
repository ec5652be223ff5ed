//! Feed connection supervisor
//!
//! `Disconnected -> Connecting -> Subscribed`, back to `Disconnected` on any
//! socket error or close, then `Connecting` again after an exponential,
//! capped backoff. Every session subscribes the same token set, so a
//! reconnect never needs the instrument catalog.

use super::{FeedMode, FeedState, FeedTransport, Tick, TickCache};
use crate::error::FeedError;
use crate::instrument::{InstrumentToken, Universe};
use crate::telemetry::{increment_counter, set_gauge, CounterMetric, GaugeMetric};
use crate::window::RollingWindowStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Reconnect delay policy
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnect after a loss
    pub initial_delay: Duration,
    /// Ceiling for the doubled delay
    pub max_delay: Duration,
    /// Consecutive failed sessions before giving up (0 = never)
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 0,
        }
    }
}

impl BackoffConfig {
    /// Delay that follows `current`
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

enum SessionEnd {
    Cancelled,
    Lost {
        subscribed: bool,
        error: Option<FeedError>,
    },
}

/// Owns the feed session lifecycle and the ingestion path
pub struct ConnectionSupervisor {
    transport: Arc<dyn FeedTransport>,
    tokens: Vec<InstrumentToken>,
    tracked: HashSet<InstrumentToken>,
    mode: FeedMode,
    backoff: BackoffConfig,
    ticks: Arc<TickCache>,
    windows: Arc<RollingWindowStore>,
    state_tx: watch::Sender<FeedState>,
}

impl ConnectionSupervisor {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        universe: &Universe,
        ticks: Arc<TickCache>,
        windows: Arc<RollingWindowStore>,
        backoff: BackoffConfig,
    ) -> Self {
        let tokens = universe.tokens();
        let tracked = tokens.iter().copied().collect();
        let (state_tx, _) = watch::channel(FeedState::Disconnected);

        Self {
            transport,
            tokens,
            tracked,
            mode: FeedMode::Full,
            backoff,
            ticks,
            windows,
            state_tx,
        }
    }

    /// Observe lifecycle transitions
    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: FeedState) {
        self.state_tx.send_replace(state);
        set_gauge(GaugeMetric::FeedState, state.gauge_value());
    }

    /// Apply one tick batch to the cache and the window store
    ///
    /// Ticks for untracked tokens are ignored. Zero volume means the packet
    /// carried no volume field, so no sample is recorded for it.
    pub fn ingest(&self, batch: &[Tick]) {
        let tracked: Vec<Tick> = batch
            .iter()
            .filter(|t| self.tracked.contains(&t.token))
            .cloned()
            .collect();
        if tracked.is_empty() {
            return;
        }

        self.ticks.update_batch(&tracked);
        for tick in &tracked {
            if tick.cumulative_volume > 0 {
                self.windows
                    .record(tick.token, tick.observed_at, tick.cumulative_volume);
            }
        }
        increment_counter(CounterMetric::TicksIngested, tracked.len() as u64);
    }

    /// Run until cancelled or until `max_attempts` consecutive sessions fail
    pub async fn run(self, cancel: CancellationToken) {
        let mut delay = self.backoff.initial_delay;
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.set_state(FeedState::Connecting);
            let (subscribed, error) = match self.run_session(&cancel).await {
                SessionEnd::Cancelled => break,
                SessionEnd::Lost { subscribed, error } => (subscribed, error),
            };
            self.set_state(FeedState::Disconnected);

            // only sessions that never subscribed count towards max_attempts
            if subscribed {
                delay = self.backoff.initial_delay;
                attempts = 0;
            } else {
                attempts += 1;
            }

            match error {
                Some(e) => tracing::warn!(error = %e, attempt = attempts, "Feed session lost"),
                None => tracing::info!(attempt = attempts, "Feed session closed by upstream"),
            }

            if self.backoff.max_attempts > 0 && attempts >= self.backoff.max_attempts {
                tracing::error!(attempts, "Max reconnection attempts reached");
                break;
            }

            increment_counter(CounterMetric::Reconnects, 1);
            tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting feed");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = self.backoff.next_delay(delay);
        }

        self.set_state(FeedState::Disconnected);
        tracing::info!("Feed supervisor stopped");
    }

    async fn run_session(&self, cancel: &CancellationToken) -> SessionEnd {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            result = self.transport.connect() => result,
        };
        let mut session = match connected {
            Ok(session) => session,
            Err(e) => {
                return SessionEnd::Lost {
                    subscribed: false,
                    error: Some(e),
                }
            }
        };

        let subscribed = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            result = session.subscribe(&self.tokens, self.mode) => result,
        };
        if let Err(e) = subscribed {
            return SessionEnd::Lost {
                subscribed: false,
                error: Some(e),
            };
        }

        self.set_state(FeedState::Subscribed);
        tracing::info!(
            tokens = self.tokens.len(),
            mode = self.mode.as_str(),
            "Feed subscribed"
        );

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => None,
                batch = session.next_batch() => Some(batch),
            };
            match batch {
                None => {
                    session.close().await;
                    return SessionEnd::Cancelled;
                }
                Some(Some(Ok(ticks))) => self.ingest(&ticks),
                Some(Some(Err(e))) => return SessionEnd::Lost { subscribed: true, error: Some(e) },
                Some(None) => return SessionEnd::Lost { subscribed: true, error: None },
            }
        }
    }
}
