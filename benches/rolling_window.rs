//! Benchmarks for the rolling volume window store

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use options_scanner::instrument::InstrumentToken;
use options_scanner::window::RollingWindowStore;

fn benchmark_record(c: &mut Criterion) {
    let store = RollingWindowStore::with_defaults();
    let token = InstrumentToken(12_345_602);
    let base = Utc.with_ymd_and_hms(2024, 12, 11, 4, 0, 0).unwrap();
    let mut i = 0i64;

    c.bench_function("rolling_window_record", |b| {
        b.iter(|| {
            i += 1;
            store.record(
                black_box(token),
                base + Duration::milliseconds(i * 250),
                black_box(i as u64 * 100),
            )
        })
    });
}

fn benchmark_windowed_delta(c: &mut Criterion) {
    let store = RollingWindowStore::with_defaults();
    let token = InstrumentToken(12_345_602);
    let base = Utc.with_ymd_and_hms(2024, 12, 11, 4, 0, 0).unwrap();
    for i in 0..1200i64 {
        store.record(token, base + Duration::milliseconds(i * 250), i as u64 * 100);
    }
    let now = base + Duration::seconds(300);

    c.bench_function("rolling_window_delta_5m", |b| {
        b.iter(|| store.windowed_delta(black_box(token), Duration::minutes(5), now))
    });

    c.bench_function("rolling_window_delta_10s", |b| {
        b.iter(|| store.windowed_delta(black_box(token), Duration::seconds(10), now))
    });
}

criterion_group!(benches, benchmark_record, benchmark_windowed_delta);
criterion_main!(benches);
