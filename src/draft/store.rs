use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::models::DraftKey;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("draft store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("draft store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value slot storage for drafts.
///
/// One value per key, last writer wins.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn get(&self, key: &DraftKey) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &DraftKey, value: String) -> Result<(), StoreError>;

    async fn remove(&self, key: &DraftKey) -> Result<(), StoreError>;
}

/// Process-local store. Can simulate an unavailable backend.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw entry without counting it as a write
    pub fn insert_raw(&self, key: &DraftKey, value: impl Into<String>) {
        self.lock().insert(key.as_str().to_string(), value.into());
    }

    pub fn raw(&self, key: &DraftKey) -> Option<String> {
        self.lock().get(key.as_str()).cloned()
    }

    /// Number of successful `set` calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every operation fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("storage quota exceeded".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get(&self, key: &DraftKey) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        Ok(self.lock().get(key.as_str()).cloned())
    }

    async fn set(&self, key: &DraftKey, value: String) -> Result<(), StoreError> {
        self.check_available()?;
        self.lock().insert(key.as_str().to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &DraftKey) -> Result<(), StoreError> {
        self.check_available()?;
        self.lock().remove(key.as_str());
        Ok(())
    }
}

/// One JSON file per draft key under a directory
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &DraftKey) -> PathBuf {
        let name: String = key
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn get(&self, key: &DraftKey) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &DraftKey, value: String) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote draft to {}", path.display());
        Ok(())
    }

    async fn remove(&self, key: &DraftKey) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
