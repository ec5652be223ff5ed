//! Configuration types for options-scanner
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! Credentials are normally supplied through `KITE_API_KEY` and
//! `KITE_ACCESS_TOKEN` rather than the file.

use crate::error::ConfigError;
use crate::feed::{BackoffConfig, KiteFeedConfig};
use crate::instrument::KiteCatalogConfig;
use crate::telemetry::LogFormat;
use crate::window::RollingWindowConfig;
use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub kite: KiteConfig,
    pub universe: UniverseConfig,
    pub ranking: RankingConfig,
    pub windows: WindowConfig,
    pub scoring: ScoringConfig,
    pub filter: FilterConfig,
    pub session: SessionConfig,
    pub reconnect: ReconnectConfig,
    pub data: DataConfig,
    pub telemetry: TelemetryConfig,
}

/// Upstream credentials and endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KiteConfig {
    pub api_key: String,
    pub access_token: String,
    pub ws_url: String,
    pub api_url: String,
    pub connect_timeout_secs: u64,
    /// Kite sends a heartbeat every second; silence this long is a dead socket
    pub read_timeout_secs: u64,
}

impl Default for KiteConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            access_token: String::new(),
            ws_url: crate::feed::KITE_WS_URL.to_string(),
            api_url: crate::instrument::KITE_API_URL.to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
        }
    }
}

/// Tracked universe selection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub index: String,
    pub spot_symbol: String,
    pub exchange: String,
    pub strike_range: Decimal,
    pub max_contracts: usize,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            index: "NIFTY".to_string(),
            spot_symbol: "NSE:NIFTY 50".to_string(),
            exchange: "NFO".to_string(),
            strike_range: dec!(800),
            max_contracts: 80,
        }
    }
}

/// Ranking cycle schedule
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub interval_ms: u64,
    /// Sleep between gate checks while the market is closed
    pub closed_interval_secs: u64,
    /// Keep only the best N contracts
    pub top_n: Option<usize>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            closed_interval_secs: 30,
            top_n: None,
        }
    }
}

impl RankingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn closed_interval(&self) -> Duration {
        Duration::from_secs(self.closed_interval_secs)
    }
}

/// Window sizes and retention bounds of the rolling store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub vol_10s_secs: i64,
    pub vol_30s_secs: i64,
    pub vol_1m_secs: i64,
    pub vol_3m_secs: i64,
    pub vol_5m_secs: i64,
    pub retention_secs: i64,
    pub max_samples: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            vol_10s_secs: 10,
            vol_30s_secs: 30,
            vol_1m_secs: 60,
            vol_3m_secs: 180,
            vol_5m_secs: 300,
            retention_secs: 300,
            max_samples: 4_096,
        }
    }
}

impl WindowConfig {
    /// Window sizes, shortest first
    pub fn sizes(&self) -> [i64; 5] {
        [
            self.vol_10s_secs,
            self.vol_30s_secs,
            self.vol_1m_secs,
            self.vol_3m_secs,
            self.vol_5m_secs,
        ]
    }
}

/// How score terms are scaled before weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Each term divided by its maximum across the cycle
    #[default]
    Relative,
    /// Terms used as-is
    Raw,
}

/// Weight of each score term; absent terms weigh zero
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub volume: Decimal,
    pub vol_10s: Decimal,
    pub vol_30s: Decimal,
    pub vol_1m: Decimal,
    pub vol_3m: Decimal,
    pub vol_5m: Decimal,
    pub oi: Decimal,
    pub change: Decimal,
}

impl ScoreWeights {
    /// 0.4 session volume, 0.3 OI, 0.3 absolute change
    pub fn relative_blend() -> Self {
        Self {
            volume: dec!(0.4),
            oi: dec!(0.3),
            change: dec!(0.3),
            ..Default::default()
        }
    }

    /// 0.3 / 0.25 / 0.2 / 0.15 / 0.1 over the five windows
    pub fn window_sum() -> Self {
        Self {
            vol_10s: dec!(0.3),
            vol_30s: dec!(0.25),
            vol_1m: dec!(0.2),
            vol_3m: dec!(0.15),
            vol_5m: dec!(0.1),
            ..Default::default()
        }
    }

    pub fn all(&self) -> [Decimal; 8] {
        [
            self.volume,
            self.vol_10s,
            self.vol_30s,
            self.vol_1m,
            self.vol_3m,
            self.vol_5m,
            self.oi,
            self.change,
        ]
    }

    pub fn sum(&self) -> Decimal {
        self.all().iter().sum()
    }
}

/// Composite score policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub normalization: Normalization,
    pub weights: ScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            normalization: Normalization::Relative,
            weights: ScoreWeights::relative_blend(),
        }
    }
}

/// Liquidity filter thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub enabled: bool,
    pub min_volume: u64,
    pub min_oi: u64,
    pub max_spread: Decimal,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_volume: 10_000,
            min_oi: 50_000,
            max_spread: dec!(5),
        }
    }
}

/// Exchange trading session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Exchange local time offset from UTC
    pub utc_offset_minutes: i32,
    pub open: NaiveTime,
    /// Last minute of trading; the whole minute counts as open
    pub close: NaiveTime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 330,
            open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
        }
    }
}

/// Feed reconnect backoff
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// 0 = retry forever
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 0,
        }
    }
}

/// Persistence of volume history and snapshots
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub capture_enabled: bool,
    pub output_dir: PathBuf,
    /// Rows buffered per table before a flush
    pub buffer_size: usize,
    pub flush_interval_secs: u64,
    /// Upper bound on one sink write
    pub write_timeout_secs: u64,
    /// Records queued between the ranking cycle and the sink worker
    pub channel_capacity: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            capture_enabled: false,
            output_dir: PathBuf::from("./data"),
            buffer_size: 5_000,
            flush_interval_secs: 60,
            write_timeout_secs: 5,
            channel_capacity: 1_024,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Prometheus exporter port; disabled when absent
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Override credentials from `KITE_API_KEY` / `KITE_ACCESS_TOKEN`
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("KITE_API_KEY").ok(),
            std::env::var("KITE_ACCESS_TOKEN").ok(),
        );
    }

    fn apply_overrides(&mut self, api_key: Option<String>, access_token: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.kite.api_key = key;
        }
        if let Some(token) = access_token.filter(|t| !t.is_empty()) {
            self.kite.access_token = token;
        }
    }

    /// Reject configurations the scanner cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.kite.connect_timeout_secs == 0 {
            return invalid("kite.connect_timeout_secs must be positive".into());
        }
        if self.kite.read_timeout_secs == 0 {
            return invalid("kite.read_timeout_secs must be positive".into());
        }

        if self.ranking.interval_ms == 0 {
            return invalid("ranking.interval_ms must be positive".into());
        }
        if self.ranking.closed_interval_secs == 0 {
            return invalid("ranking.closed_interval_secs must be positive".into());
        }

        let sizes = self.windows.sizes();
        if sizes[0] <= 0 || sizes.windows(2).any(|w| w[0] >= w[1]) {
            return invalid(format!(
                "window sizes must be positive and strictly increasing: {sizes:?}"
            ));
        }
        if self.windows.retention_secs < sizes[4] {
            return invalid(format!(
                "windows.retention_secs ({}) is shorter than the largest window ({})",
                self.windows.retention_secs, sizes[4]
            ));
        }
        if self.windows.max_samples < 2 {
            return invalid("windows.max_samples must be at least 2".into());
        }

        let weights = self.scoring.weights.all();
        if weights.iter().any(|w| w.is_sign_negative() && !w.is_zero()) {
            return invalid("scoring weights must not be negative".into());
        }
        if weights.iter().all(|w| w.is_zero()) {
            return invalid("at least one scoring weight must be positive".into());
        }

        if self.reconnect.initial_delay_ms == 0 {
            return invalid("reconnect.initial_delay_ms must be positive".into());
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return invalid("reconnect.initial_delay_ms exceeds reconnect.max_delay_ms".into());
        }

        if self.universe.max_contracts == 0 {
            return invalid("universe.max_contracts must be positive".into());
        }
        if self.session.open >= self.session.close {
            return invalid("session.open must be before session.close".into());
        }
        if self.session.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
            return invalid(format!(
                "session.utc_offset_minutes out of range: {}",
                self.session.utc_offset_minutes
            ));
        }
        if self.data.capture_enabled && self.data.channel_capacity == 0 {
            return invalid("data.channel_capacity must be positive".into());
        }

        Ok(())
    }

    pub fn catalog_config(&self) -> KiteCatalogConfig {
        KiteCatalogConfig {
            api_url: self.kite.api_url.clone(),
            api_key: self.kite.api_key.clone(),
            access_token: self.kite.access_token.clone(),
            exchange: self.universe.exchange.clone(),
            index: self.universe.index.clone(),
            spot_symbol: self.universe.spot_symbol.clone(),
            strike_range: self.universe.strike_range,
            max_contracts: self.universe.max_contracts,
            timeout: Duration::from_secs(self.kite.connect_timeout_secs),
        }
    }

    pub fn feed_config(&self) -> KiteFeedConfig {
        KiteFeedConfig {
            ws_url: self.kite.ws_url.clone(),
            api_key: self.kite.api_key.clone(),
            access_token: self.kite.access_token.clone(),
            connect_timeout: Duration::from_secs(self.kite.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.kite.read_timeout_secs),
        }
    }

    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    pub fn window_config(&self) -> RollingWindowConfig {
        RollingWindowConfig {
            retention: chrono::Duration::seconds(self.windows.retention_secs),
            max_samples: self.windows.max_samples,
        }
    }

    /// Fail early when the feed cannot authenticate
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.kite.api_key.is_empty() || self.kite.access_token.is_empty() {
            return Err(ConfigError::Invalid(
                "Kite credentials missing: set KITE_API_KEY and KITE_ACCESS_TOKEN".into(),
            ));
        }
        Ok(())
    }
}
