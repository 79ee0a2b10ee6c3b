use std::sync::Arc;
use tracing::{debug, info, warn};

use super::store::DraftStore;
use crate::form::FormStateMachine;
use crate::models::{DraftKey, DraftSnapshot};

/// What a previous session left behind
#[derive(Debug, Clone, PartialEq)]
pub enum DraftInspection {
    /// Nothing worth offering; the slot is clean
    Empty,
    /// A draft the user should choose to resume or discard
    Found(DraftSnapshot),
}

/// Decides what happens to a stored draft before the form is used
pub struct DraftConflictResolver {
    store: Arc<dyn DraftStore>,
    key: DraftKey,
}

impl DraftConflictResolver {
    pub fn new(store: Arc<dyn DraftStore>, key: DraftKey) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    /// Read the slot. Corrupt and insignificant drafts are deleted silently;
    /// a read failure counts as no draft.
    pub async fn inspect(&self) -> DraftInspection {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return DraftInspection::Empty,
            Err(e) => {
                warn!("Could not read draft {}: {}", self.key, e);
                return DraftInspection::Empty;
            }
        };

        match DraftSnapshot::from_json(&raw) {
            Ok(snapshot) if snapshot.is_significant() => {
                info!(
                    "📝 Found draft {} from {} ({:?})",
                    self.key, snapshot.saved_at, snapshot.fields.general.title
                );
                DraftInspection::Found(snapshot)
            }
            Ok(_) => {
                debug!("Draft {} holds nothing meaningful, dropping it", self.key);
                self.remove_entry().await;
                DraftInspection::Empty
            }
            Err(e) => {
                warn!("Draft {} is corrupt, dropping it: {}", self.key, e);
                self.remove_entry().await;
                DraftInspection::Empty
            }
        }
    }

    /// Take the draft's fields. The stored entry stays in place for the
    /// next autosave to overwrite.
    pub fn resume(&self, snapshot: DraftSnapshot, form: &mut FormStateMachine) {
        info!("Resuming draft {}", self.key);
        form.resume_from(snapshot);
    }

    /// Delete the stored entry; the caller starts from default values
    pub async fn discard(&self) {
        info!("Discarding draft {}", self.key);
        self.remove_entry().await;
    }

    async fn remove_entry(&self) {
        if let Err(e) = self.store.remove(&self.key).await {
            warn!("Could not remove draft {}: {}", self.key, e);
        }
    }
}
