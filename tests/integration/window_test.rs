//! Push and pull windowing answer the same question the same way

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use options_scanner::error::WindowError;
use options_scanner::instrument::InstrumentToken;
use options_scanner::window::{
    HistoryWindows, RecordOutcome, RollingWindowConfig, RollingWindowStore, SampleHistory,
    VolumeSample, VolumeWindows,
};
use std::sync::Arc;

const TOKEN: InstrumentToken = InstrumentToken(9_001);

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_733_900_000 + secs, 0).unwrap()
}

struct StoreHistory(Vec<VolumeSample>);

#[async_trait]
impl SampleHistory for StoreHistory {
    async fn samples_between(
        &self,
        token: InstrumentToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VolumeSample>, WindowError> {
        Ok(self
            .0
            .iter()
            .filter(|s| s.token == token && s.timestamp >= from && s.timestamp <= to)
            .copied()
            .collect())
    }
}

#[tokio::test]
async fn test_push_and_pull_strategies_agree() {
    let store = RollingWindowStore::new(RollingWindowConfig {
        retention: Duration::minutes(10),
        max_samples: 10_000,
    });

    // Irregular tick spacing with a quiet stretch
    let mut volume = 1_000u64;
    let mut offsets = Vec::new();
    for i in 0..200i64 {
        let secs = i * 2 + if i > 120 { 40 } else { 0 };
        volume += (i as u64 % 7) * 25;
        assert_eq!(store.record(TOKEN, at(secs), volume), RecordOutcome::Appended);
        offsets.push(secs);
    }

    let history = HistoryWindows::new(StoreHistory(store.samples(TOKEN)));
    let now = at(*offsets.last().unwrap());

    for secs in [10, 30, 60, 180, 300] {
        let window = Duration::seconds(secs);
        let push = VolumeWindows::windowed_delta(&store, TOKEN, window, now)
            .await
            .unwrap();
        let pull = history.windowed_delta(TOKEN, window, now).await.unwrap();
        assert_eq!(push, pull, "window {secs}s");
    }
}

#[tokio::test]
async fn test_concurrent_producers_and_reader() {
    let store = Arc::new(RollingWindowStore::with_defaults());
    let tokens: Vec<InstrumentToken> = (1..=8).map(InstrumentToken).collect();

    let mut writers = Vec::new();
    for &token in &tokens {
        let store = store.clone();
        writers.push(tokio::spawn(async move {
            for i in 0..500i64 {
                store.record(token, at(i), 10 * i as u64);
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    let reader = {
        let store = store.clone();
        let tokens = tokens.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                for &token in &tokens {
                    let samples = store.samples(token);
                    assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
                    // every sample is whole: volume = 10 * offset
                    for sample in &samples {
                        let offset = (sample.timestamp - at(0)).num_seconds() as u64;
                        assert_eq!(sample.cumulative_volume, 10 * offset);
                    }
                    let delta = store.windowed_delta(token, Duration::minutes(5), Utc::now());
                    assert_eq!(delta % 10, 0);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    for &token in &tokens {
        // retention of five minutes keeps offsets 199..=499
        assert_eq!(store.windowed_delta(token, Duration::minutes(5), at(499)), 3_000);
        assert_eq!(store.samples(token).first().unwrap().timestamp, at(199));
    }
}
