//! Latest-tick cache

use super::Tick;
use crate::instrument::InstrumentToken;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Latest known tick per instrument, overwritten on every update
///
/// Entries are created on the first tick of a token and live until the
/// cache is dropped with its session. Readers clone the tick out, so the
/// read lock is held only for the lookup.
#[derive(Debug, Default)]
pub struct TickCache {
    ticks: RwLock<HashMap<InstrumentToken, Tick>>,
}

impl TickCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached tick for `tick.token`
    pub fn update(&self, tick: Tick) {
        self.ticks.write().insert(tick.token, tick);
    }

    /// Overwrite every tick of a batch under one write lock
    pub fn update_batch(&self, ticks: &[Tick]) {
        let mut guard = self.ticks.write();
        for tick in ticks {
            guard.insert(tick.token, tick.clone());
        }
    }

    /// Latest tick, `None` if nothing has arrived this session
    pub fn get(&self, token: InstrumentToken) -> Option<Tick> {
        self.ticks.read().get(&token).cloned()
    }

    pub fn len(&self) -> usize {
        self.ticks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.read().is_empty()
    }
}
