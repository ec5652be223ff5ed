//! Market session gate

use crate::config::SessionConfig;
use crate::error::ConfigError;
use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike, Utc, Weekday};

/// Whether ranking should run at `now`
///
/// Evaluated on every cycle; implementations must not cache.
pub trait SessionGate: Send + Sync {
    fn is_open(&self, now: DateTime<Utc>) -> bool;
}

/// Weekday trading hours in exchange local time
///
/// The closing minute is inclusive: a 15:30 close stays open until 15:30:59.
#[derive(Debug, Clone)]
pub struct NseSession {
    offset: FixedOffset,
    open: NaiveTime,
    close: NaiveTime,
}

impl NseSession {
    pub fn new(offset: FixedOffset, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            offset,
            open,
            close,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        let seconds = config.utc_offset_minutes.checked_mul(60);
        let offset = seconds.and_then(FixedOffset::east_opt).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "invalid UTC offset {} minutes",
                config.utc_offset_minutes
            ))
        })?;
        Ok(Self::new(offset, config.open, config.close))
    }
}

impl SessionGate for NseSession {
    fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let time = local.time();
        time >= self.open && (time.hour(), time.minute()) <= (self.close.hour(), self.close.minute())
    }
}

/// Gate that never closes
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl SessionGate for AlwaysOpen {
    fn is_open(&self, _now: DateTime<Utc>) -> bool {
        true
    }
}
