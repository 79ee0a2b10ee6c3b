use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::debounce::Debouncer;
use super::store::DraftStore;
use crate::form::{lock_form, SharedForm};
use crate::models::DraftKey;

/// What the UI shows next to the form ("Saving…", "Saved 14:02", ...)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveStatus {
    pub saving: bool,
    pub saved: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Debounced draft persistence for one form.
///
/// Every dirtying mutation calls `schedule`, which restarts the timer.
/// Only when the delay passes without another mutation is a snapshot of
/// the form, as it is at that moment, written to the store.
pub struct AutosavePersistence {
    job: WriteJob,
    debouncer: Debouncer,
}

#[derive(Clone)]
struct WriteJob {
    form: SharedForm,
    store: Arc<dyn DraftStore>,
    key: DraftKey,
    status: Arc<watch::Sender<SaveStatus>>,
}

impl WriteJob {
    /// Returns whether the store now holds the latest state
    async fn run(self) -> bool {
        let (snapshot, revision) = {
            let form = lock_form(&self.form);
            (form.snapshot(), form.revision())
        };

        let raw = match snapshot.to_json() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not serialize draft {}: {}", self.key, e);
                self.status.send_modify(|s| s.error = Some(e.to_string()));
                return false;
            }
        };

        self.status.send_modify(|s| s.saving = true);
        match self.store.set(&self.key, raw).await {
            Ok(()) => {
                lock_form(&self.form).mark_saved(revision);
                debug!("💾 Draft {} saved (revision {})", self.key, revision);
                self.status.send_modify(|s| {
                    s.saving = false;
                    s.saved = true;
                    s.last_saved = Some(snapshot.saved_at);
                    s.error = None;
                });
                true
            }
            Err(e) => {
                warn!("Draft {} not saved, will retry on next change: {}", self.key, e);
                self.status.send_modify(|s| {
                    s.saving = false;
                    s.error = Some(e.to_string());
                });
                false
            }
        }
    }
}

impl AutosavePersistence {
    pub fn new(form: SharedForm, store: Arc<dyn DraftStore>, key: DraftKey, delay: Duration) -> Self {
        let (status, _) = watch::channel(SaveStatus::default());
        Self {
            job: WriteJob {
                form,
                store,
                key,
                status: Arc::new(status),
            },
            debouncer: Debouncer::new(delay),
        }
    }

    pub fn key(&self) -> &DraftKey {
        &self.job.key
    }

    pub fn store(&self) -> &Arc<dyn DraftStore> {
        &self.job.store
    }

    pub fn status(&self) -> SaveStatus {
        self.job.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.job.status.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// (Re)start the debounce timer after a mutation
    pub fn schedule(&self) {
        self.job.status.send_modify(|s| s.saved = false);
        let job = self.job.clone();
        self.debouncer.schedule(async move {
            job.run().await;
        });
    }

    /// Write now, skipping the timer. Used before step transitions.
    pub async fn save_now(&self) -> bool {
        let pending = self.debouncer.cancel();
        let dirty = lock_form(&self.job.form).is_dirty();
        if !pending && !dirty {
            return true;
        }
        self.job.clone().run().await
    }

    /// Drop a pending write without performing it
    pub fn cancel(&self) -> bool {
        let cancelled = self.debouncer.cancel();
        if cancelled {
            debug!("Cancelled pending draft write for {}", self.job.key);
        }
        cancelled
    }

    /// Cancel any pending write and delete the stored draft
    pub async fn clear(&self) {
        self.cancel();
        if let Err(e) = self.job.store.remove(&self.job.key).await {
            warn!("Could not remove draft {}: {}", self.job.key, e);
        }
        self.job.status.send_replace(SaveStatus::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::store::MemoryDraftStore;
    use crate::form::{FieldUpdate, FormStateMachine};
    use crate::images::{ImageLimits, InMemoryPreviewAllocator};
    use crate::models::{DraftSnapshot, FormMode};
    use std::sync::Mutex;

    const DELAY: Duration = Duration::from_millis(2000);

    fn setup() -> (SharedForm, Arc<MemoryDraftStore>, AutosavePersistence) {
        let form = Arc::new(Mutex::new(FormStateMachine::new(
            FormMode::Create,
            ImageLimits::default(),
            Arc::new(InMemoryPreviewAllocator::new()),
        )));
        let store = Arc::new(MemoryDraftStore::new());
        let key = DraftKey::for_mode("property-draft", &FormMode::Create);
        let autosave = AutosavePersistence::new(form.clone(), store.clone(), key, DELAY);
        (form, store, autosave)
    }

    fn edit(form: &SharedForm, autosave: &AutosavePersistence, title: &str) {
        lock_form(form).update_field(FieldUpdate::Title(title.to_string()));
        autosave.schedule();
    }

    fn stored_title(store: &MemoryDraftStore, autosave: &AutosavePersistence) -> String {
        let raw = store.raw(autosave.key()).expect("draft stored");
        DraftSnapshot::from_json(&raw).unwrap().fields.general.title
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_write() {
        let (form, store, autosave) = setup();

        for title in ["V", "Vi", "Vil", "Vill", "Villa"] {
            edit(&form, &autosave, title);
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(store.writes(), 0);

        tokio::time::sleep(DELAY).await;
        assert_eq!(store.writes(), 1);
        assert_eq!(stored_title(&store, &autosave), "Villa");
        assert!(!lock_form(&form).is_dirty());

        let status = autosave.status();
        assert!(status.saved);
        assert!(status.last_saved.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_skips_the_timer() {
        let (form, store, autosave) = setup();
        edit(&form, &autosave, "Sjöutsikt");

        assert!(autosave.save_now().await);
        assert_eq!(store.writes(), 1);
        assert!(!autosave.is_pending());

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(store.writes(), 1);

        assert!(autosave.save_now().await);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_flags_error_and_keeps_form() {
        let (form, store, autosave) = setup();
        store.set_failing(true);
        edit(&form, &autosave, "Villa Test");

        tokio::time::sleep(DELAY * 2).await;
        let status = autosave.status();
        assert!(status.error.is_some());
        assert!(!status.saved);
        assert!(lock_form(&form).is_dirty());
        assert_eq!(lock_form(&form).data().general.title, "Villa Test");

        store.set_failing(false);
        edit(&form, &autosave, "Villa Test 2");
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(autosave.status().error, None);
        assert_eq!(stored_title(&store, &autosave), "Villa Test 2");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_write() {
        let (form, store, autosave) = setup();
        edit(&form, &autosave, "Villa Test");
        autosave.clear().await;

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(store.writes(), 0);
        assert_eq!(store.raw(autosave.key()), None);
        assert_eq!(autosave.status(), SaveStatus::default());
    }
}
