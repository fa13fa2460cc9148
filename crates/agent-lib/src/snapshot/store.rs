//! Single-slot holder for the latest snapshot

use crate::models::Snapshot;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds the most recent successful snapshot
#[derive(Debug, Default)]
pub struct SnapshotStore {
    latest: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held snapshot
    pub async fn update(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.latest.write().await = Some(snapshot.clone());
        snapshot
    }

    /// Latest snapshot, or `None` until the first update
    pub async fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceSnapshot;
    use chrono::{TimeZone, Utc};

    fn snapshot(secs: i64) -> Snapshot {
        Snapshot {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            namespaces: vec![],
            nodes: vec![],
            resources: ResourceSnapshot::default(),
            network: None,
        }
    }

    #[tokio::test]
    async fn test_empty_store_has_no_snapshot() {
        let store = SnapshotStore::new();
        assert!(store.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_latest() {
        let store = SnapshotStore::new();
        store.update(snapshot(1)).await;
        store.update(snapshot(2)).await;

        let latest = store.latest().await.unwrap();
        assert_eq!(latest.timestamp.timestamp(), 2);
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot_after_update() {
        let store = SnapshotStore::new();
        store.update(snapshot(1)).await;
        let held = store.latest().await.unwrap();

        store.update(snapshot(2)).await;
        assert_eq!(held.timestamp.timestamp(), 1);
    }
}
