//! In-memory store for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use mcphub_core::{ConfigRepository, GlobalConfig, StatusMap, StatusRepository, StorageError};

/// Repository implementation holding both documents in memory.
///
/// Counts writes and can be told to fail them, so tests can assert that an
/// operation did (or did not) touch storage.
#[derive(Debug)]
pub struct MemoryStore {
    config: Mutex<Value>,
    status: Mutex<StatusMap>,
    config_saves: AtomicUsize,
    status_writes: AtomicUsize,
    fail_config_saves: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store holding the default configuration and no status records.
    pub fn new() -> Self {
        let config = serde_json::to_value(GlobalConfig::default()).unwrap_or(Value::Null);
        Self::with_document(config)
    }

    /// A store holding `config`.
    pub fn with_config(config: &GlobalConfig) -> Self {
        Self::with_document(serde_json::to_value(config).unwrap_or(Value::Null))
    }

    /// A store holding a raw (possibly invalid) document.
    pub fn with_document(doc: Value) -> Self {
        Self {
            config: Mutex::new(doc),
            status: Mutex::new(StatusMap::new()),
            config_saves: AtomicUsize::new(0),
            status_writes: AtomicUsize::new(0),
            fail_config_saves: AtomicBool::new(false),
        }
    }

    /// Pre-populate status records without counting them as writes.
    #[must_use]
    pub fn with_status<I, S>(self, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        {
            let mut status = lock(&self.status);
            for (id, running) in entries {
                status.insert(id.into(), running);
            }
        }
        self
    }

    /// Current configuration document.
    pub fn config_document(&self) -> Value {
        lock(&self.config).clone()
    }

    /// Current status records.
    pub fn status_snapshot(&self) -> StatusMap {
        lock(&self.status).clone()
    }

    /// Number of successful `save_config` calls.
    pub fn config_saves(&self) -> usize {
        self.config_saves.load(Ordering::SeqCst)
    }

    /// Number of `set_status` calls that changed a value.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent `save_config` fail.
    pub fn fail_config_saves(&self, fail: bool) {
        self.fail_config_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigRepository for MemoryStore {
    async fn load_config(&self) -> Result<Value, StorageError> {
        Ok(self.config_document())
    }

    async fn save_config(&self, doc: &Value) -> Result<(), StorageError> {
        if self.fail_config_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unusable {
                path: "memory://config".into(),
                reason: "saves disabled".to_string(),
            });
        }
        *lock(&self.config) = doc.clone();
        self.config_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl StatusRepository for MemoryStore {
    async fn load_status(&self) -> Result<StatusMap, StorageError> {
        Ok(self.status_snapshot())
    }

    async fn set_status(&self, id: &str, running: bool) -> Result<(), StorageError> {
        let previous = lock(&self.status).insert(id.to_string(), running);
        if previous != Some(running) {
            self.status_writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
