//! Atomically published ranking

use super::RankedSnapshot;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Holds the latest [`RankedSnapshot`]
///
/// Publication swaps the whole snapshot; readers hold an `Arc` to a complete
/// ranking and never see a partial one.
#[derive(Debug, Default)]
pub struct SnapshotBoard {
    current: ArcSwapOption<RankedSnapshot>,
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: RankedSnapshot) -> Arc<RankedSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    pub fn latest(&self) -> Option<Arc<RankedSnapshot>> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_empty_board() {
        assert!(SnapshotBoard::new().latest().is_none());
    }

    #[test]
    fn test_publish_replaces_whole_snapshot() {
        let board = SnapshotBoard::new();
        let first = board.publish(RankedSnapshot::new(Utc::now(), Vec::new()));
        let held = board.latest().unwrap();

        let second = board.publish(RankedSnapshot::new(Utc::now(), Vec::new()));

        assert_eq!(held.id, first.id);
        assert_eq!(board.latest().unwrap().id, second.id);
        assert_ne!(first.id, second.id);
    }
}
