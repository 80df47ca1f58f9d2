use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::unbounded;
use dashmap::DashMap;

use super::{Result, Snapshot, SnapshotReceiver, SnapshotSender, Store, StoreError};

/// An in-process document store. Serves as the store for single-machine
/// deployments and as the test double for the sync paths, including a
/// switchable outage mode for exercising save retries.
#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<String, Snapshot>,
    subscribers: DashMap<String, Vec<SnapshotSender>>,
    failing: AtomicCell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While enabled, every save fails as if the store were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing);
    }

    /// Delivers a snapshot to subscribers without going through a save, as
    /// if another device had written it.
    pub fn push(&self, owner_id: &str, snapshot: Snapshot) {
        self.notify(owner_id, &snapshot);
        self.documents.insert(owner_id.to_string(), snapshot);
    }

    /// How many saves landed for this owner.
    pub fn contains(&self, owner_id: &str) -> bool {
        self.documents.contains_key(owner_id)
    }

    pub fn document(&self, owner_id: &str) -> Option<Snapshot> {
        self.documents.get(owner_id).map(|d| d.clone())
    }

    fn notify(&self, owner_id: &str, snapshot: &Snapshot) {
        if let Some(mut subscribers) = self.subscribers.get_mut(owner_id) {
            subscribers.retain(|s| s.send(snapshot.clone()).is_ok());
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, owner_id: &str) -> Result<Option<Snapshot>> {
        Ok(self.documents.get(owner_id).map(|d| d.clone()))
    }

    async fn save(&self, owner_id: &str, snapshot: Snapshot) -> Result<()> {
        if self.failing.load() {
            return Err(StoreError::Unreachable("simulated outage".to_string()));
        }

        self.notify(owner_id, &snapshot);
        self.documents.insert(owner_id.to_string(), snapshot);

        Ok(())
    }

    fn subscribe(&self, owner_id: &str) -> SnapshotReceiver {
        let (sender, receiver) = unbounded();

        self.subscribers
            .entry(owner_id.to_string())
            .or_default()
            .push(sender);

        receiver
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_save_load_and_subscribe() {
        let store = MemoryStore::new();
        let receiver = store.subscribe("club-1");

        let snapshot = Snapshot {
            notes: "cue tip broke".to_string(),
            ..Default::default()
        };

        store.save("club-1", snapshot.clone()).await.unwrap();

        assert_eq!(store.load("club-1").await.unwrap(), Some(snapshot.clone()));
        assert_eq!(receiver.try_recv().ok(), Some(snapshot));
        assert_eq!(store.load("club-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failing_mode_rejects_saves() {
        let store = MemoryStore::new();
        store.set_failing(true);

        let result = store.save("club-1", Snapshot::default()).await;

        assert!(result.is_err());
        assert!(!store.contains("club-1"));
    }
}
