//! Shared fixtures: an in-memory feed transport and a small universe

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use options_scanner::error::FeedError;
use options_scanner::feed::{FeedMode, FeedSession, FeedTransport, Tick};
use options_scanner::instrument::{InstrumentToken, InstrumentType, TrackedInstrument};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub type Batch = Result<Vec<Tick>, FeedError>;

/// Hands out scripted sessions in order; connects fail once they run out
#[derive(Default)]
pub struct ScriptedTransport {
    sessions: Mutex<VecDeque<mpsc::Receiver<Batch>>>,
    pub subscriptions: Arc<Mutex<Vec<(Vec<InstrumentToken>, FeedMode)>>>,
}

impl ScriptedTransport {
    pub fn push_session(&self) -> mpsc::Sender<Batch> {
        let (tx, rx) = mpsc::channel(64);
        self.sessions.lock().unwrap().push_back(rx);
        tx
    }

    pub fn subscriptions(&self) -> Vec<(Vec<InstrumentToken>, FeedMode)> {
        self.subscriptions.lock().unwrap().clone()
    }
}

struct ScriptedSession {
    batches: mpsc::Receiver<Batch>,
    subscriptions: Arc<Mutex<Vec<(Vec<InstrumentToken>, FeedMode)>>>,
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn connect(&self) -> Result<Box<dyn FeedSession>, FeedError> {
        let next = self.sessions.lock().unwrap().pop_front();
        match next {
            Some(batches) => Ok(Box::new(ScriptedSession {
                batches,
                subscriptions: self.subscriptions.clone(),
            })),
            None => Err(FeedError::Protocol("no scripted session left".into())),
        }
    }
}

#[async_trait]
impl FeedSession for ScriptedSession {
    async fn subscribe(
        &mut self,
        tokens: &[InstrumentToken],
        mode: FeedMode,
    ) -> Result<(), FeedError> {
        self.subscriptions.lock().unwrap().push((tokens.to_vec(), mode));
        Ok(())
    }

    async fn next_batch(&mut self) -> Option<Result<Vec<Tick>, FeedError>> {
        self.batches.recv().await
    }
}

/// Calls and puts around 24000, catalog order = argument order
pub fn instruments(tokens: &[u32]) -> Vec<TrackedInstrument> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, &token)| {
            let strike = Decimal::from(23_900 + 50 * i as u32);
            let (suffix, instrument_type) = if i % 2 == 0 {
                ("CE", InstrumentType::Call)
            } else {
                ("PE", InstrumentType::Put)
            };
            TrackedInstrument {
                token: InstrumentToken(token),
                tradingsymbol: format!("NIFTY24DEC{strike}{suffix}"),
                strike,
                instrument_type,
                expiry: NaiveDate::from_ymd_opt(2024, 12, 26).unwrap(),
            }
        })
        .collect()
}

pub fn tick(token: u32, volume: u64, oi: u64, change: Decimal) -> Tick {
    let mut tick = Tick::empty(InstrumentToken(token), Utc::now());
    tick.last_price = dec!(120.5);
    tick.cumulative_volume = volume;
    tick.open_interest = oi;
    tick.change = change;
    tick
}
