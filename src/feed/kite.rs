//! Kite Ticker WebSocket feed
//!
//! Binary frame layout (big-endian):
//! `u16 packet_count` then, per packet, `u16 length` + payload. A frame
//! shorter than two bytes is a heartbeat. Payload length selects the mode:
//! 8 = LTP, 28/32 = index quote/full, 44 = quote, 184 = full with depth.

use super::{Depth, DepthLevel, FeedMode, FeedSession, FeedTransport, Tick};
use crate::error::FeedError;
use crate::instrument::InstrumentToken;
use crate::ws::{redact, WsClient, WsConfig, WsConnection, WsError, WsMessage};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Kite Ticker WebSocket base URL
pub const KITE_WS_URL: &str = "wss://ws.kite.trade";

const SEGMENT_CDS: u32 = 3;
const SEGMENT_BCD: u32 = 6;
const SEGMENT_INDICES: u32 = 9;

const LTP_PACKET: usize = 8;
const INDEX_QUOTE_PACKET: usize = 28;
const INDEX_FULL_PACKET: usize = 32;
const QUOTE_PACKET: usize = 44;
const FULL_PACKET: usize = 184;
const DEPTH_OFFSET: usize = 64;
const DEPTH_ENTRY: usize = 12;
const DEPTH_LEVELS: usize = 5;

/// Connection parameters for the Kite Ticker
#[derive(Debug, Clone)]
pub struct KiteFeedConfig {
    pub ws_url: String,
    pub api_key: String,
    pub access_token: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// [`FeedTransport`] for the Kite Ticker
pub struct KiteFeed {
    config: KiteFeedConfig,
}

impl KiteFeed {
    pub fn new(config: KiteFeedConfig) -> Self {
        Self { config }
    }

    /// Build the authenticated WebSocket URL
    fn build_ws_url(&self) -> String {
        format!(
            "{}?api_key={}&access_token={}",
            self.config.ws_url, self.config.api_key, self.config.access_token
        )
    }
}

#[async_trait]
impl FeedTransport for KiteFeed {
    async fn connect(&self) -> Result<Box<dyn FeedSession>, FeedError> {
        let url = self.build_ws_url();
        tracing::info!(url = %redact(&url), "Connecting to Kite Ticker");

        let config = WsConfig::new(url)
            .connect_timeout(self.config.connect_timeout)
            .read_timeout(self.config.read_timeout);
        let connection = WsClient::new(config).connect().await?;

        Ok(Box::new(KiteSession { connection }))
    }
}

/// One live Kite Ticker connection
pub struct KiteSession {
    connection: WsConnection,
}

#[async_trait]
impl FeedSession for KiteSession {
    async fn subscribe(
        &mut self,
        tokens: &[InstrumentToken],
        mode: FeedMode,
    ) -> Result<(), FeedError> {
        for message in subscription_messages(tokens, mode) {
            self.connection.send_text(message).await?;
        }
        Ok(())
    }

    async fn next_batch(&mut self) -> Option<Result<Vec<Tick>, FeedError>> {
        loop {
            match self.connection.next_message().await? {
                Ok(WsMessage::Binary(frame)) => match parse_frame(&frame, Utc::now()) {
                    Ok(ticks) if ticks.is_empty() => continue,
                    other => return Some(other),
                },
                Ok(WsMessage::Text(text)) => handle_text(&text),
                Err(WsError::ReadTimeout(silence)) => return Some(Err(FeedError::Stale(silence))),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        self.connection.close().await;
    }
}

/// Subscribe then set the streaming mode for the same tokens
pub fn subscription_messages(tokens: &[InstrumentToken], mode: FeedMode) -> Vec<String> {
    let ids: Vec<u32> = tokens.iter().map(|t| t.0).collect();
    vec![
        serde_json::json!({ "a": "subscribe", "v": ids }).to_string(),
        serde_json::json!({ "a": "mode", "v": [mode.as_str(), ids] }).to_string(),
    ]
}

#[derive(Debug, Deserialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

fn handle_text(text: &str) {
    match serde_json::from_str::<TextMessage>(text) {
        Ok(msg) if msg.kind == "error" => {
            tracing::warn!(message = %msg.data, "Kite Ticker reported an error");
        }
        Ok(msg) => tracing::debug!(kind = %msg.kind, "Ignoring text message"),
        Err(_) => tracing::debug!("Ignoring unparseable text message"),
    }
}

/// Split a binary frame into ticks
///
/// Packets of unknown length are skipped; a frame whose declared lengths
/// overrun the buffer is a protocol error.
pub fn parse_frame(frame: &[u8], observed_at: DateTime<Utc>) -> Result<Vec<Tick>, FeedError> {
    if frame.len() < 2 {
        return Ok(Vec::new());
    }

    let count = read_u16(frame, 0) as usize;
    let mut ticks = Vec::with_capacity(count);
    let mut offset = 2;

    for index in 0..count {
        if offset + 2 > frame.len() {
            return Err(FeedError::Protocol(format!(
                "frame truncated before packet {index} header"
            )));
        }
        let length = read_u16(frame, offset) as usize;
        offset += 2;

        let end = offset + length;
        if end > frame.len() {
            return Err(FeedError::Protocol(format!(
                "packet {index} declares {length} bytes, {} available",
                frame.len() - offset
            )));
        }

        match parse_packet(&frame[offset..end], observed_at) {
            Some(tick) => ticks.push(tick),
            None => tracing::debug!(length, "Skipping packet of unknown length"),
        }
        offset = end;
    }

    Ok(ticks)
}

/// Decode a single packet
pub fn parse_packet(packet: &[u8], observed_at: DateTime<Utc>) -> Option<Tick> {
    if packet.len() < LTP_PACKET {
        return None;
    }

    let token = read_u32(packet, 0);
    let segment = token & 0xff;
    let scale = price_scale(segment);
    let price = |offset: usize| Decimal::new(read_i32(packet, offset) as i64, scale);

    let mut tick = Tick::empty(InstrumentToken(token), observed_at);
    tick.last_price = price(4);

    match packet.len() {
        LTP_PACKET => {}
        INDEX_QUOTE_PACKET | INDEX_FULL_PACKET if segment == SEGMENT_INDICES => {
            let close = price(20);
            tick.change = percent_change(tick.last_price, close);
            if packet.len() == INDEX_FULL_PACKET {
                tick.exchange_ts = epoch(read_u32(packet, 28));
            }
        }
        QUOTE_PACKET | FULL_PACKET => {
            tick.cumulative_volume = read_u32(packet, 16) as u64;
            let close = price(40);
            tick.change = percent_change(tick.last_price, close);

            if packet.len() == FULL_PACKET {
                tick.open_interest = read_u32(packet, 48) as u64;
                tick.exchange_ts = epoch(read_u32(packet, 60));
                tick.depth = parse_depth(packet, scale);
            }
        }
        _ => return None,
    }

    Some(tick)
}

fn parse_depth(packet: &[u8], scale: u32) -> Depth {
    let mut depth = Depth::default();

    for i in 0..DEPTH_LEVELS * 2 {
        let at = DEPTH_OFFSET + i * DEPTH_ENTRY;
        let level = DepthLevel {
            quantity: read_u32(packet, at) as u64,
            price: Decimal::new(read_i32(packet, at + 4) as i64, scale),
            orders: read_u16(packet, at + 8) as u32,
        };
        // Unquoted levels arrive as zeroes
        if level.price.is_zero() && level.quantity == 0 {
            continue;
        }
        if i < DEPTH_LEVELS {
            depth.buy.push(level);
        } else {
            depth.sell.push(level);
        }
    }

    depth
}

fn price_scale(segment: u32) -> u32 {
    match segment {
        SEGMENT_CDS => 7,
        SEGMENT_BCD => 4,
        _ => 2,
    }
}

fn percent_change(last: Decimal, close: Decimal) -> Decimal {
    if close.is_zero() {
        return Decimal::ZERO;
    }
    ((last - close) * Decimal::ONE_HUNDRED / close).round_dp(4)
}

fn epoch(seconds: u32) -> Option<DateTime<Utc>> {
    if seconds == 0 {
        return None;
    }
    Utc.timestamp_opt(seconds as i64, 0).single()
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
