//! Single WebSocket connection with keepalive handling

use super::types::{WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

/// Connects WebSocket sessions; reconnection is owned by the caller
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Perform the handshake, bounded by `connect_timeout`
    pub async fn connect(&self) -> Result<WsConnection, WsError> {
        tracing::debug!(url = %redact(&self.config.url), "Connecting to WebSocket");

        let handshake = connect_async(self.config.url.as_str());
        let (stream, _response) = tokio::time::timeout(self.config.connect_timeout, handshake)
            .await
            .map_err(|_| WsError::ConnectTimeout(self.config.connect_timeout))?
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        tracing::info!("WebSocket connected");

        Ok(WsConnection {
            stream,
            read_timeout: self.config.read_timeout,
        })
    }
}

/// An established connection
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    read_timeout: std::time::Duration,
}

impl WsConnection {
    /// Send a text frame
    pub async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }

    /// Next data frame
    ///
    /// Returns `None` on a clean close. Pings are answered inline and never
    /// surfaced; any inbound frame, control frames included, resets the
    /// read timeout.
    pub async fn next_message(&mut self) -> Option<Result<WsMessage, WsError>> {
        loop {
            let frame = match tokio::time::timeout(self.read_timeout, self.stream.next()).await {
                Ok(frame) => frame,
                Err(_) => return Some(Err(WsError::ReadTimeout(self.read_timeout))),
            };

            match frame {
                Some(Ok(Message::Text(text))) => return Some(Ok(WsMessage::Text(text))),
                Some(Ok(Message::Binary(data))) => return Some(Ok(WsMessage::Binary(data))),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        return Some(Err(WsError::SendFailed(e.to_string())));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Received close frame");
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Some(Err(WsError::ConnectionFailed(e.to_string()))),
                None => {
                    return Some(Err(WsError::ConnectionFailed(
                        "Stream ended unexpectedly".into(),
                    )))
                }
            }
        }
    }

    /// Send a close frame; errors are irrelevant at this point
    pub async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Strip the query string so credentials never reach the logs
pub(crate) fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
