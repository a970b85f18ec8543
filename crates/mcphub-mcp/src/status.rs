//! Running-status tracking.

use std::sync::Arc;

use tokio::sync::Mutex;

use mcphub_core::{StatusMap, StatusRepository, StorageError};

/// Authoritative in-memory view of which servers should be running.
///
/// The map is loaded from the repository on first use. Writes reach the
/// repository before the in-memory map, so a value a reader sees is always
/// durable.
pub struct StatusTracker {
    repo: Arc<dyn StatusRepository>,
    cache: Mutex<Option<StatusMap>>,
}

impl StatusTracker {
    pub fn new(repo: Arc<dyn StatusRepository>) -> Self {
        Self {
            repo,
            cache: Mutex::new(None),
        }
    }

    /// Whether `id` is recorded as running. Unknown ids are not.
    pub async fn get_status(&self, id: &str) -> Result<bool, StorageError> {
        let mut cache = self.cache.lock().await;
        let map = self.loaded(&mut cache).await?;
        Ok(map.get(id).copied().unwrap_or(false))
    }

    /// Every status record, including ids that are no longer configured.
    pub async fn get_all_status(&self) -> Result<StatusMap, StorageError> {
        let mut cache = self.cache.lock().await;
        Ok(self.loaded(&mut cache).await?.clone())
    }

    /// Record the status of `id`. Returns once the value is durable.
    pub async fn set_status(&self, id: &str, running: bool) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().await;
        let map = self.loaded(&mut cache).await?;
        if map.get(id) == Some(&running) {
            return Ok(());
        }

        self.repo.set_status(id, running).await?;
        map.insert(id.to_string(), running);
        Ok(())
    }

    async fn loaded<'a>(
        &self,
        cache: &'a mut Option<StatusMap>,
    ) -> Result<&'a mut StatusMap, StorageError> {
        if cache.is_none() {
            *cache = Some(self.repo.load_status().await?);
        }
        Ok(cache.get_or_insert_with(StatusMap::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcphub_store::MemoryStore;

    #[tokio::test]
    async fn test_unknown_id_is_not_running() {
        let tracker = StatusTracker::new(Arc::new(MemoryStore::new()));
        assert!(!tracker.get_status("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_loads_existing_records() {
        let store = Arc::new(MemoryStore::new().with_status([("a", true), ("orphan", true)]));
        let tracker = StatusTracker::new(store);

        assert!(tracker.get_status("a").await.unwrap());
        assert_eq!(tracker.get_all_status().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_writes_are_durable_and_deduplicated() {
        let store = Arc::new(MemoryStore::new());
        let tracker = StatusTracker::new(store.clone());

        tracker.set_status("a", true).await.unwrap();
        tracker.set_status("a", true).await.unwrap();

        assert_eq!(store.status_writes(), 1);
        assert_eq!(store.status_snapshot().get("a"), Some(&true));
        assert!(tracker.get_status("a").await.unwrap());
    }
}
