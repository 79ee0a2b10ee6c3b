//! The property submission session.
//!
//! Ties the form state machine to draft autosave and the remote
//! collaborators. A session only exists once any stored draft has been
//! resumed or discarded, so the form never accepts edits on top of a
//! half-decided draft.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::config::WizardConfig;
use crate::draft::{
    AutosavePersistence, DraftConflictResolver, DraftInspection, DraftStore, SaveStatus,
};
use crate::form::{
    lock_form, Field, FieldErrorMap, FieldUpdate, FormEvent, FormStateMachine,
    PendingSubmission, SharedForm, SubmitStart,
};
use crate::images::{AddReport, ImageFile, ImageIndexError, PreviewAllocator};
use crate::models::{Coordinates, DraftKey, DraftSnapshot, FormData, FormMode, Step};
use crate::services::{GeocodeQuery, Geocoder, ImageStorage, PropertySubmission, SubmissionService};

/// External services a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DraftStore>,
    pub submissions: Arc<dyn SubmissionService>,
    pub images: Arc<dyn ImageStorage>,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub previews: Arc<dyn PreviewAllocator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved { property_id: String },
    /// A submission was already in flight; this call did nothing
    AlreadyInFlight,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("form has invalid fields: {0}")]
    Invalid(FieldErrorMap),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocateOutcome {
    Located(Coordinates),
    NotFound,
    Failed(String),
}

pub enum SessionStart {
    Ready(PropertyFormSession),
    /// A previous draft must be resumed or discarded first
    DraftFound(PendingDraft),
}

/// A session waiting on the resume/discard decision
pub struct PendingDraft {
    snapshot: DraftSnapshot,
    resolver: DraftConflictResolver,
    session: PropertyFormSession,
}

impl PendingDraft {
    pub fn snapshot(&self) -> &DraftSnapshot {
        &self.snapshot
    }

    pub fn resume(self) -> PropertyFormSession {
        self.resolver
            .resume(self.snapshot, &mut lock_form(&self.session.form));
        self.session
    }

    pub async fn discard(self) -> PropertyFormSession {
        self.resolver.discard().await;
        self.session
    }
}

pub struct PropertyFormSession {
    form: SharedForm,
    autosave: AutosavePersistence,
    submissions: Arc<dyn SubmissionService>,
    images: Arc<dyn ImageStorage>,
    geocoder: Option<Arc<dyn Geocoder>>,
    notice: Mutex<Option<String>>,
}

impl PropertyFormSession {
    /// Open a session for `mode`, seeded with `initial` values when editing
    pub async fn start(
        config: &WizardConfig,
        mode: FormMode,
        initial: Option<FormData>,
        collaborators: Collaborators,
    ) -> SessionStart {
        let key = DraftKey::for_mode(&config.draft_key_prefix, &mode);
        let mut machine = FormStateMachine::new(mode, config.image_limits(), collaborators.previews);
        if let Some(initial) = initial {
            machine = machine.with_data(initial);
        }
        let form: SharedForm = Arc::new(Mutex::new(machine));

        let resolver = DraftConflictResolver::new(collaborators.store.clone(), key.clone());
        let session = PropertyFormSession {
            autosave: AutosavePersistence::new(
                form.clone(),
                collaborators.store,
                key,
                config.autosave_delay(),
            ),
            form,
            submissions: collaborators.submissions,
            images: collaborators.images,
            geocoder: collaborators.geocoder,
            notice: Mutex::new(None),
        };

        match resolver.inspect().await {
            DraftInspection::Empty => SessionStart::Ready(session),
            DraftInspection::Found(snapshot) => SessionStart::DraftFound(PendingDraft {
                snapshot,
                resolver,
                session,
            }),
        }
    }

    /// Read access to the form
    pub fn form(&self) -> MutexGuard<'_, FormStateMachine> {
        lock_form(&self.form)
    }

    pub fn data(&self) -> FormData {
        self.form().data().clone()
    }

    pub fn step(&self) -> Step {
        self.form().step()
    }

    pub fn errors(&self) -> FieldErrorMap {
        self.form().errors().clone()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FormEvent> {
        self.form().subscribe()
    }

    pub fn subscribe_save_status(&self) -> watch::Receiver<SaveStatus> {
        self.autosave.subscribe()
    }

    pub fn draft_key(&self) -> &DraftKey {
        self.autosave.key()
    }

    /// Transient, non-blocking message (e.g. a failed address lookup)
    pub fn notice(&self) -> Option<String> {
        self.notice_slot().clone()
    }

    fn notice_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.notice.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_notice(&self, message: Option<String>) {
        *self.notice_slot() = message;
    }

    pub fn update_field(&self, update: FieldUpdate) {
        self.form().update_field(update);
        self.autosave.schedule();
    }

    pub fn blur(&self, field: Field) -> Option<String> {
        self.form().blur(field).map(str::to_string)
    }

    /// Save, then advance if the current step validates
    pub async fn next_step(&self) -> bool {
        self.autosave.save_now().await;
        self.form().next_step()
    }

    pub async fn prev_step(&self) -> Step {
        self.autosave.save_now().await;
        self.form().prev_step()
    }

    pub async fn go_to_step(&self, step: Step) -> bool {
        self.autosave.save_now().await;
        self.form().go_to_step(step)
    }

    pub fn add_images(&self, files: impl IntoIterator<Item = ImageFile>) -> AddReport {
        let report = self.form().add_images(files);
        if !report.added.is_empty() {
            self.autosave.schedule();
        }
        report
    }

    pub fn remove_image(&self, index: usize) -> Result<(), ImageIndexError> {
        self.form().remove_image(index)?;
        self.autosave.schedule();
        Ok(())
    }

    pub fn set_main_image(&self, index: usize) -> Result<(), ImageIndexError> {
        self.form().set_main_image(index)?;
        self.autosave.schedule();
        Ok(())
    }

    pub fn reorder_images(&self, from: usize, to: usize) -> Result<(), ImageIndexError> {
        self.form().reorder_images(from, to)?;
        self.autosave.schedule();
        Ok(())
    }

    /// Fill in coordinates from the device or an address lookup.
    /// Failures only leave a notice behind.
    pub async fn locate(&self, query: GeocodeQuery) -> LocateOutcome {
        let outcome = match query {
            GeocodeQuery::Device(coords) if coords.is_valid() => LocateOutcome::Located(coords),
            GeocodeQuery::Device(coords) => {
                LocateOutcome::Failed(format!("Device reported invalid position {coords}"))
            }
            GeocodeQuery::Address(address) => match &self.geocoder {
                None => LocateOutcome::Failed("Address lookup is not available".to_string()),
                Some(geocoder) => match geocoder.geocode(&address).await {
                    Ok(Some(coords)) => LocateOutcome::Located(coords),
                    Ok(None) => LocateOutcome::NotFound,
                    Err(e) => {
                        warn!("Geocoding {:?} failed: {:#}", address, e);
                        LocateOutcome::Failed("Could not look up the address, try again".to_string())
                    }
                },
            },
        };

        match &outcome {
            LocateOutcome::Located(coords) => {
                self.set_notice(None);
                self.update_field(FieldUpdate::Coordinates(Some(*coords)));
            }
            LocateOutcome::NotFound => {
                self.set_notice(Some("Address not found on the map".to_string()));
            }
            LocateOutcome::Failed(message) => self.set_notice(Some(message.clone())),
        }
        outcome
    }

    /// Validate everything, upload photos and hand the listing to the backend.
    ///
    /// On success the draft is cleared and the form reset. On failure the
    /// form keeps its values and can be submitted again.
    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError> {
        let pending = match self.form().begin_submission() {
            SubmitStart::Ready(pending) => pending,
            SubmitStart::AlreadySubmitting => return Ok(SubmitOutcome::AlreadyInFlight),
            SubmitStart::Invalid(errors) => return Err(SubmitError::Invalid(errors)),
        };

        match self.publish(pending).await {
            Ok(property_id) => {
                self.form().finish_submission(Ok(property_id.clone()));
                self.autosave.clear().await;
                Ok(SubmitOutcome::Saved { property_id })
            }
            Err(e) => {
                let message = format!("{e:#}");
                self.form().finish_submission(Err(message.clone()));
                Err(SubmitError::Backend(message))
            }
        }
    }

    async fn publish(&self, pending: PendingSubmission) -> anyhow::Result<String> {
        let subject_id = match &pending.mode {
            FormMode::Edit { property_id } => property_id.clone(),
            FormMode::Create => uuid::Uuid::new_v4().to_string(),
        };

        let image_urls = if pending.images.is_empty() {
            Vec::new()
        } else {
            let urls = self.images.upload(&subject_id, &pending.images).await?;
            if urls.len() != pending.images.len() {
                anyhow::bail!(
                    "Image storage returned {} URLs for {} photos",
                    urls.len(),
                    pending.images.len()
                );
            }
            urls
        };

        let listing = PropertySubmission::new(pending.fields, image_urls);
        info!(
            "Submitting {:?} to {} backend",
            listing.fields.general.title,
            self.submissions.backend_name()
        );
        match &pending.mode {
            FormMode::Create => self.submissions.create(&listing).await,
            FormMode::Edit { property_id } => self.submissions.update(property_id, &listing).await,
        }
    }

    /// Throw away the draft and start over
    pub async fn discard(&self) {
        self.autosave.clear().await;
        self.form().reset();
        self.set_notice(None);
    }

    /// Unmount: drop any pending write and release every photo preview
    pub fn close(self) {
        self.autosave.cancel();
        self.form().reset();
    }
}
