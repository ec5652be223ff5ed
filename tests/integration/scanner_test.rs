//! End-to-end scanner tests over a scripted feed

use crate::common::{instruments, tick, ScriptedTransport};
use options_scanner::config::Config;
use options_scanner::error::FeedError;
use options_scanner::feed::{FeedMode, FeedState};
use options_scanner::instrument::{InstrumentToken, StaticCatalog};
use options_scanner::ranking::AlwaysOpen;
use options_scanner::{ScanResponse, Scanner};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config() -> Config {
    let mut config = Config::default();
    config.ranking.interval_ms = 25;
    config.reconnect.initial_delay_ms = 20;
    config.reconnect.max_delay_ms = 100;
    config
}

async fn wait_for_ranking(scanner: &Scanner) -> Arc<options_scanner::ranking::RankedSnapshot> {
    for _ in 0..100 {
        if let ScanResponse::Ranked(snapshot) = scanner.scan() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no ranking published");
}

#[tokio::test]
async fn test_ranks_liquid_contracts_and_drops_illiquid() {
    let transport = Arc::new(ScriptedTransport::default());
    let session = transport.push_session();

    let scanner = Scanner::builder(config())
        .catalog(Arc::new(StaticCatalog::new(instruments(&[101, 102, 103, 104]))))
        .transport(transport.clone())
        .gate(Arc::new(AlwaysOpen))
        .start()
        .await
        .unwrap();

    assert!(matches!(scanner.scan(), ScanResponse::CollectingData));

    session
        .send(Ok(vec![
            tick(101, 40_000, 200_000, dec!(2.5)),
            tick(102, 90_000, 400_000, dec!(-6)),
            // below the volume floor despite the largest move
            tick(103, 9_000, 900_000, dec!(25)),
            tick(104, 60_000, 100_000, dec!(1)),
        ]))
        .await
        .unwrap();

    let snapshot = wait_for_ranking(&scanner).await;
    let tokens: Vec<u32> = snapshot.contracts.iter().map(|c| c.token.0).collect();
    assert_eq!(tokens, vec![102, 101, 104]);
    assert_eq!(snapshot.contracts[0].confidence, dec!(100));
    assert!(snapshot
        .contracts
        .iter()
        .all(|c| c.confidence >= dec!(0) && c.confidence <= dec!(100)));

    let subscriptions = transport.subscriptions();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].1, FeedMode::Full);

    let json = serde_json::to_value(scanner.scan()).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["contracts"][0]["type"], "PE");

    scanner.shutdown().await;
}

#[tokio::test]
async fn test_resubscribes_same_universe_after_disconnect() {
    let transport = Arc::new(ScriptedTransport::default());
    let first = transport.push_session();
    let second = transport.push_session();

    let scanner = Scanner::builder(config())
        .catalog(Arc::new(StaticCatalog::new(instruments(&[7, 3, 5]))))
        .transport(transport.clone())
        .gate(Arc::new(AlwaysOpen))
        .start()
        .await
        .unwrap();

    first
        .send(Ok(vec![tick(7, 20_000, 80_000, dec!(1))]))
        .await
        .unwrap();
    first
        .send(Err(FeedError::Protocol("socket reset".into())))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    second
        .send(Ok(vec![tick(3, 30_000, 90_000, dec!(2))]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let subscriptions = transport.subscriptions();
    assert_eq!(subscriptions.len(), 2);
    assert_eq!(subscriptions[0].0, subscriptions[1].0);
    assert_eq!(
        subscriptions[1].0,
        vec![InstrumentToken(7), InstrumentToken(3), InstrumentToken(5)]
    );

    // Cache survives the reconnect: both sessions' ticks are ranked
    let snapshot = wait_for_ranking(&scanner).await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(scanner.health().feed_state, FeedState::Subscribed);

    scanner.shutdown().await;
}

#[tokio::test]
async fn test_capture_writes_parquet_on_shutdown() {
    let dir = TempDir::new().unwrap();
    let mut config = config();
    config.data.capture_enabled = true;
    config.data.output_dir = dir.path().to_path_buf();

    let transport = Arc::new(ScriptedTransport::default());
    let session = transport.push_session();

    let scanner = Scanner::builder(config)
        .catalog(Arc::new(StaticCatalog::new(instruments(&[1, 2]))))
        .transport(transport)
        .gate(Arc::new(AlwaysOpen))
        .start()
        .await
        .unwrap();

    session
        .send(Ok(vec![
            tick(1, 20_000, 80_000, dec!(1)),
            tick(2, 30_000, 90_000, dec!(2)),
        ]))
        .await
        .unwrap();
    wait_for_ranking(&scanner).await;
    scanner.shutdown().await;

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("volume_history_")));
    assert!(names.iter().any(|n| n.starts_with("snapshots_")));
}

#[tokio::test]
async fn test_supervisor_giving_up_stops_scanner() {
    let mut config = config();
    config.reconnect.max_attempts = 2;

    // No scripted sessions: every connect fails
    let scanner = Scanner::builder(config)
        .catalog(Arc::new(StaticCatalog::new(instruments(&[1]))))
        .transport(Arc::new(ScriptedTransport::default()))
        .gate(Arc::new(AlwaysOpen))
        .start()
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), scanner.stopped())
        .await
        .expect("scanner should stop after the feed gives up");
    assert_eq!(scanner.health().feed_state, FeedState::Disconnected);

    scanner.shutdown().await;
}
