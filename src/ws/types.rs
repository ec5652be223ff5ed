//! WebSocket types and configuration

use std::time::Duration;
use thiserror::Error;

/// WebSocket connection configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Upper bound on the TCP + TLS + upgrade handshake
    pub connect_timeout: Duration,
    /// A connection with no inbound frame for this long is considered dead
    pub read_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl WsConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set handshake timeout
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Set inbound silence timeout
    pub fn read_timeout(mut self, d: Duration) -> Self {
        self.read_timeout = d;
        self
    }
}

/// Data frames surfaced to the feed layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// Text message
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
}

/// WebSocket errors
#[derive(Debug, Clone, Error)]
pub enum WsError {
    /// Handshake or socket failure
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Handshake did not finish in time
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// No inbound frame within the read timeout
    #[error("No frame within {0:?}")]
    ReadTimeout(Duration),
    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_ws_config_builder() {
        let config = WsConfig::new("wss://example.com")
            .connect_timeout(Duration::from_secs(3))
            .read_timeout(Duration::from_millis(500));

        assert_eq!(config.url, "wss://example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.read_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_ws_error_display() {
        let err = WsError::ConnectionFailed("timeout".to_string());
        assert_eq!(err.to_string(), "Connection failed: timeout");

        let err = WsError::ReadTimeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "No frame within 10s");
    }
}
