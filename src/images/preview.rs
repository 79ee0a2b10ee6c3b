use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

use super::ImageFile;

/// Source of transient preview URLs (object URLs, thumbnails, ...).
///
/// Handles are a bounded resource: every successful `acquire` must be
/// matched by exactly one `release`.
pub trait PreviewAllocator: Send + Sync {
    fn acquire(&self, file: &ImageFile) -> anyhow::Result<String>;

    fn release(&self, url: &str);
}

/// A live preview URL, released when dropped
pub struct PreviewHandle {
    url: String,
    allocator: Arc<dyn PreviewAllocator>,
}

impl PreviewHandle {
    pub(super) fn acquire(
        allocator: &Arc<dyn PreviewAllocator>,
        file: &ImageFile,
    ) -> anyhow::Result<Self> {
        let url = allocator.acquire(file)?;
        trace!("Acquired preview {} for {}", url, file.name());
        Ok(Self {
            url,
            allocator: Arc::clone(allocator),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        trace!("Releasing preview {}", self.url);
        self.allocator.release(&self.url);
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url).finish()
    }
}

/// Allocator that hands out `blob:` style URLs and tracks which are live
#[derive(Debug, Default)]
pub struct InMemoryPreviewAllocator {
    counter: AtomicU64,
    live: Mutex<HashSet<String>>,
}

impl InMemoryPreviewAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl PreviewAllocator for InMemoryPreviewAllocator {
    fn acquire(&self, _file: &ImageFile) -> anyhow::Result<String> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let url = format!("blob:listing-wizard/{n}");
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone());
        Ok(url)
    }

    fn release(&self, url: &str) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
        if !removed {
            tracing::warn!("Released unknown preview {}", url);
        }
    }
}
