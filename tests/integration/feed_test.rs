//! Kite feed against a local WebSocket server

use futures_util::{SinkExt, StreamExt};
use options_scanner::feed::{FeedMode, FeedSession, FeedTransport, KiteFeed, KiteFeedConfig};
use options_scanner::error::FeedError;
use options_scanner::instrument::InstrumentToken;
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

// Low byte 2 = NFO options segment, prices in paise
const TOKEN: u32 = 0x00BC_6102;

fn full_packet(token: u32, ltp: i32, close: i32, volume: u32, oi: u32) -> Vec<u8> {
    let mut p = vec![0u8; 184];
    p[0..4].copy_from_slice(&token.to_be_bytes());
    p[4..8].copy_from_slice(&ltp.to_be_bytes());
    p[16..20].copy_from_slice(&volume.to_be_bytes());
    p[40..44].copy_from_slice(&close.to_be_bytes());
    p[48..52].copy_from_slice(&oi.to_be_bytes());
    p[60..64].copy_from_slice(&1_733_900_000u32.to_be_bytes());
    // best bid at 64, best ask five levels later
    p[64..68].copy_from_slice(&150u32.to_be_bytes());
    p[68..72].copy_from_slice(&(ltp - 5).to_be_bytes());
    p[124..128].copy_from_slice(&75u32.to_be_bytes());
    p[128..132].copy_from_slice(&(ltp + 5).to_be_bytes());
    p
}

fn frame(packets: &[Vec<u8>]) -> Vec<u8> {
    let mut out = (packets.len() as u16).to_be_bytes().to_vec();
    for packet in packets {
        out.extend_from_slice(&(packet.len() as u16).to_be_bytes());
        out.extend_from_slice(packet);
    }
    out
}

/// Accept one client, collect its two subscription messages, replay
/// `frames`, then close
async fn serve_once(frames: Vec<Message>) -> (String, oneshot::Receiver<(String, Vec<String>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut query = String::new();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            query = req.uri().query().unwrap_or_default().to_string();
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        let mut received = Vec::new();
        while received.len() < 2 {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => received.push(text),
                Some(Ok(_)) => {}
                _ => break,
            }
        }
        let _ = tx.send((query, received));

        for message in frames {
            ws.send(message).await.unwrap();
        }
        let _ = ws.close(None).await;
    });

    (format!("ws://{addr}/"), rx)
}

/// Accept one client and never send anything; resolves once the client
/// sends a close frame
async fn serve_silent() -> (String, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                let _ = tx.send(());
                break;
            }
        }
    });

    (format!("ws://{addr}/"), rx)
}

fn feed_with_read_timeout(url: String, read_timeout: Duration) -> KiteFeed {
    KiteFeed::new(KiteFeedConfig {
        ws_url: url,
        api_key: "key".into(),
        access_token: "secret".into(),
        connect_timeout: Duration::from_secs(2),
        read_timeout,
    })
}

fn feed(url: String) -> KiteFeed {
    feed_with_read_timeout(url, Duration::from_secs(2))
}

#[tokio::test]
async fn test_kite_session_subscribes_and_decodes_ticks() {
    let frames = vec![
        // heartbeat
        Message::Binary(vec![0]),
        Message::Text(r#"{"type":"order","data":{}}"#.into()),
        Message::Binary(frame(&[full_packet(TOKEN, 15_235, 14_000, 1_200_000, 3_400_000)])),
    ];
    let (url, handshake) = serve_once(frames).await;

    let mut session = feed(url).connect().await.unwrap();
    session
        .subscribe(&[InstrumentToken(TOKEN)], FeedMode::Full)
        .await
        .unwrap();

    let ticks = session.next_batch().await.unwrap().unwrap();
    assert_eq!(ticks.len(), 1);
    let tick = &ticks[0];
    assert_eq!(tick.token, InstrumentToken(TOKEN));
    assert_eq!(tick.last_price, dec!(152.35));
    assert_eq!(tick.cumulative_volume, 1_200_000);
    assert_eq!(tick.open_interest, 3_400_000);
    assert_eq!(tick.change, dec!(8.8214));
    assert_eq!(tick.best_bid(), dec!(152.30));
    assert_eq!(tick.best_ask(), dec!(152.40));
    assert_eq!(tick.spread(), dec!(0.10));

    let (query, messages) = handshake.await.unwrap();
    assert_eq!(query, "api_key=key&access_token=secret");
    let subscribe: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
    assert_eq!(subscribe, serde_json::json!({"a": "subscribe", "v": [TOKEN]}));
    let mode: serde_json::Value = serde_json::from_str(&messages[1]).unwrap();
    assert_eq!(mode, serde_json::json!({"a": "mode", "v": ["full", [TOKEN]]}));

    // Server closes after the replay
    assert!(session.next_batch().await.is_none());
}

#[tokio::test]
async fn test_connect_refused_is_transient_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = feed(format!("ws://{addr}/")).connect().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_silent_socket_is_stale_and_close_reaches_server() {
    let (url, closed) = serve_silent().await;

    let mut session = feed_with_read_timeout(url, Duration::from_millis(200))
        .connect()
        .await
        .unwrap();
    session
        .subscribe(&[InstrumentToken(TOKEN)], FeedMode::Full)
        .await
        .unwrap();

    match session.next_batch().await {
        Some(Err(FeedError::Stale(silence))) => assert_eq!(silence, Duration::from_millis(200)),
        other => panic!("expected a stale feed error, got {other:?}"),
    }

    session.close().await;
    tokio::time::timeout(Duration::from_secs(2), closed)
        .await
        .expect("server never saw the close frame")
        .unwrap();
}
