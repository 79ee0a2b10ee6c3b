use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::fields::{Field, FieldErrorMap, FieldUpdate};
use super::validation;
use crate::images::{
    AddReport, ImageCollectionManager, ImageFile, ImageIndexError, ImageLimits, PreviewAllocator,
};
use crate::models::{DraftSnapshot, FormData, FormMode, Step};

const EVENT_CAPACITY: usize = 64;

/// State changes observers can react to
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    FieldChanged(Field),
    ImagesChanged { count: usize, main_index: usize },
    StepChanged { from: Step, to: Step },
    StepBlocked { step: Step, errors: usize },
    DraftResumed,
    Submitting,
    Submitted { property_id: String },
    SubmissionFailed(String),
    Reset,
}

/// Everything the submission collaborators need, captured at submit time
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub mode: FormMode,
    pub fields: FormData,
    /// Main image first
    pub images: Vec<ImageFile>,
}

#[derive(Debug)]
pub enum SubmitStart {
    Ready(PendingSubmission),
    /// Another submission is in flight; nothing was done
    AlreadySubmitting,
    Invalid(FieldErrorMap),
}

/// The multi-step property form.
///
/// Owns the field values, the photo collection, the current step and the
/// per-field errors. All methods are synchronous; persistence and remote
/// calls are layered on top by the session.
pub struct FormStateMachine {
    mode: FormMode,
    data: FormData,
    images: ImageCollectionManager,
    step: Step,
    furthest: Step,
    errors: FieldErrorMap,
    form_error: Option<String>,
    dirty: bool,
    revision: u64,
    submitting: bool,
    events: broadcast::Sender<FormEvent>,
}

impl FormStateMachine {
    pub fn new(mode: FormMode, limits: ImageLimits, previews: Arc<dyn PreviewAllocator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            mode,
            data: FormData::default(),
            images: ImageCollectionManager::new(limits, previews),
            step: Step::FIRST,
            furthest: Step::FIRST,
            errors: FieldErrorMap::new(),
            form_error: None,
            dirty: false,
            revision: 0,
            submitting: false,
            events,
        }
    }

    /// Start from existing values, e.g. the listing being edited
    pub fn with_data(mut self, data: FormData) -> Self {
        self.data = data;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FormEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: FormEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    pub fn images(&self) -> &ImageCollectionManager {
        &self.images
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Furthest step reached through validated forward navigation
    pub fn furthest_step(&self) -> Step {
        self.furthest
    }

    pub fn errors(&self) -> &FieldErrorMap {
        &self.errors
    }

    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Bumped on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    pub fn update_field(&mut self, update: FieldUpdate) {
        let field = update.field();
        update.apply(&mut self.data);
        self.errors.remove(field);
        self.touch();
        self.emit(FormEvent::FieldChanged(field));
    }

    /// Re-validate a single field, typically when it loses focus
    pub fn blur(&mut self, field: Field) -> Option<&str> {
        match validation::check_field(field, &self.data, self.images.len()) {
            Ok(()) => {
                self.errors.remove(field);
            }
            Err(message) => self.errors.insert(field, message),
        }
        self.errors.get(field)
    }

    pub fn validate_step(&self, step: Step) -> FieldErrorMap {
        validation::validate_step(step, &self.data, self.images.len())
    }

    pub fn validate_all(&self) -> FieldErrorMap {
        validation::validate_all(&self.data, self.images.len())
    }

    fn move_to(&mut self, to: Step) {
        let from = self.step;
        if from != to {
            self.step = to;
            debug!("Step {} -> {}", from, to);
            self.emit(FormEvent::StepChanged { from, to });
        }
    }

    /// Advance when the current step validates; otherwise record its errors
    pub fn next_step(&mut self) -> bool {
        let step = self.step;
        let errors = self.validate_step(step);
        let valid = errors.is_empty();
        if !valid {
            info!("Step {} blocked by {} error(s)", step, errors.len());
            self.emit(FormEvent::StepBlocked {
                step,
                errors: errors.len(),
            });
        }
        self.errors.replace_step(step, errors);
        if !valid {
            return false;
        }

        let next = step.next();
        self.furthest = self.furthest.max(next);
        self.move_to(next);
        true
    }

    /// Go back one step; never blocked
    pub fn prev_step(&mut self) -> Step {
        self.move_to(self.step.prev());
        self.step
    }

    /// Jump to any step up to the furthest one reached
    pub fn go_to_step(&mut self, target: Step) -> bool {
        if target > self.furthest {
            debug!("Refusing jump to {} beyond {}", target, self.furthest);
            return false;
        }
        self.move_to(target);
        true
    }

    fn images_changed(&mut self) {
        self.touch();
        self.emit(FormEvent::ImagesChanged {
            count: self.images.len(),
            main_index: self.images.main_index(),
        });
    }

    pub fn add_images(&mut self, files: impl IntoIterator<Item = ImageFile>) -> AddReport {
        let report = self.images.add(files);
        if !report.added.is_empty() {
            self.errors.remove(Field::Images);
            self.images_changed();
        }
        report
    }

    pub fn remove_image(&mut self, index: usize) -> Result<(), ImageIndexError> {
        self.images.remove(index)?;
        self.images_changed();
        Ok(())
    }

    pub fn set_main_image(&mut self, index: usize) -> Result<(), ImageIndexError> {
        self.images.set_main(index)?;
        self.images_changed();
        Ok(())
    }

    pub fn reorder_images(&mut self, from: usize, to: usize) -> Result<(), ImageIndexError> {
        self.images.reorder(from, to)?;
        self.images_changed();
        Ok(())
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot::capture(&self.data, self.step, self.images.len())
    }

    /// Clear the dirty flag if nothing changed since `revision` was captured
    pub fn mark_saved(&mut self, revision: u64) {
        if self.revision == revision {
            self.dirty = false;
        }
    }

    /// Take over every non-image field of a stored draft and restart at step 0
    pub fn resume_from(&mut self, snapshot: DraftSnapshot) {
        if snapshot.image_count > 0 {
            info!(
                "Draft referenced {} photo(s); photos are not kept in drafts",
                snapshot.image_count
            );
        }
        self.data = snapshot.fields;
        self.images.clear();
        self.step = Step::FIRST;
        self.furthest = Step::FIRST;
        self.errors.clear();
        self.form_error = None;
        self.dirty = false;
        self.revision += 1;
        self.emit(FormEvent::DraftResumed);
    }

    /// Validate everything and, if clean, enter the submitting state
    pub fn begin_submission(&mut self) -> SubmitStart {
        if self.submitting {
            debug!("Submission already in flight, ignoring");
            return SubmitStart::AlreadySubmitting;
        }

        let errors = self.validate_all();
        if !errors.is_empty() {
            warn!("Submission blocked by {} error(s): {}", errors.len(), errors);
            self.errors = errors.clone();
            return SubmitStart::Invalid(errors);
        }

        self.submitting = true;
        self.form_error = None;
        self.emit(FormEvent::Submitting);
        SubmitStart::Ready(PendingSubmission {
            mode: self.mode.clone(),
            fields: self.data.clone(),
            images: self.images.ordered_files(),
        })
    }

    /// Settle the in-flight submission
    pub fn finish_submission(&mut self, result: Result<String, String>) {
        self.submitting = false;
        match result {
            Ok(property_id) => {
                info!("✅ Property {} saved", property_id);
                self.reset();
                self.emit(FormEvent::Submitted { property_id });
            }
            Err(message) => {
                warn!("Submission failed: {}", message);
                self.form_error = Some(message.clone());
                self.emit(FormEvent::SubmissionFailed(message));
            }
        }
    }

    /// Back to defaults; releases every image preview
    pub fn reset(&mut self) {
        self.data = FormData::default();
        self.images.clear();
        self.step = Step::FIRST;
        self.furthest = Step::FIRST;
        self.errors.clear();
        self.form_error = None;
        self.dirty = false;
        self.submitting = false;
        self.revision += 1;
        self.emit(FormEvent::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::InMemoryPreviewAllocator;

    fn machine() -> FormStateMachine {
        FormStateMachine::new(
            FormMode::Create,
            ImageLimits::default(),
            Arc::new(InMemoryPreviewAllocator::new()),
        )
    }

    fn photo() -> ImageFile {
        ImageFile::new("front.jpg", "image/jpeg", vec![0u8; 32])
    }

    fn fill_valid(form: &mut FormStateMachine) {
        form.update_field(FieldUpdate::Title("Ljus tvåa med balkong".into()));
        form.update_field(FieldUpdate::City("Stockholm".into()));
        form.update_field(FieldUpdate::Address("Götgatan 120".into()));
        form.add_images(vec![photo()]);
        form.update_field(FieldUpdate::Price(14_500));
        form.update_field(FieldUpdate::OwnerName("Anna Berg".into()));
        form.update_field(FieldUpdate::Email("anna@example.se".into()));
        form.update_field(FieldUpdate::Phone("+46 70 123 45 67".into()));
    }

    #[test]
    fn empty_title_blocks_first_step() {
        let mut form = machine();

        assert!(!form.next_step());
        assert_eq!(form.step(), Step::General);
        assert!(form.errors().contains(Field::Title));

        form.update_field(FieldUpdate::Title("Villa Test".into()));
        assert!(form.next_step());
        assert_eq!(form.step(), Step::Location);
        assert!(!form.errors().contains(Field::Title));
    }

    #[test]
    fn update_clears_field_error_and_marks_dirty() {
        let mut form = machine();
        form.next_step();
        assert!(form.errors().contains(Field::Title));
        assert!(!form.is_dirty());

        form.update_field(FieldUpdate::Title("x".into()));
        assert!(!form.errors().contains(Field::Title));
        assert!(form.is_dirty());
    }

    #[test]
    fn prev_step_ignores_invalid_fields() {
        let mut form = machine();
        form.update_field(FieldUpdate::Title("Villa Test".into()));
        form.update_field(FieldUpdate::City("Uppsala".into()));
        form.update_field(FieldUpdate::Address("Storgatan 1".into()));
        assert!(form.next_step());
        assert!(form.next_step());
        assert_eq!(form.step(), Step::Photos);

        assert!(!form.next_step());
        assert!(form.errors().contains(Field::Images));

        assert_eq!(form.prev_step(), Step::Location);
        assert!(form.validate_step(Step::Location).is_empty());
        assert_eq!(form.prev_step(), Step::General);
        assert_eq!(form.prev_step(), Step::General);
    }

    #[test]
    fn go_to_step_is_capped_by_progress() {
        let mut form = machine();
        assert!(!form.go_to_step(Step::Photos));

        form.update_field(FieldUpdate::Title("Villa Test".into()));
        form.next_step();
        assert_eq!(form.furthest_step(), Step::Location);

        assert!(form.go_to_step(Step::General));
        assert!(form.go_to_step(Step::Location));
        assert!(!form.go_to_step(Step::Review));
        assert_eq!(form.step(), Step::Location);
    }

    #[test]
    fn blur_validates_one_field() {
        let mut form = machine();
        form.update_field(FieldUpdate::Email("not-an-email".into()));
        assert!(form.blur(Field::Email).is_some());
        assert!(!form.errors().contains(Field::Title));

        form.update_field(FieldUpdate::Email("anna@example.se".into()));
        assert_eq!(form.blur(Field::Email), None);
    }

    #[test]
    fn submission_guard_and_payload_order() {
        let mut form = machine();
        fill_valid(&mut form);
        form.add_images(vec![ImageFile::new("garden.png", "image/png", vec![1])]);
        form.set_main_image(1).unwrap();

        let SubmitStart::Ready(pending) = form.begin_submission() else {
            panic!("expected a ready submission");
        };
        assert_eq!(pending.images[0].name(), "garden.png");
        assert!(matches!(form.begin_submission(), SubmitStart::AlreadySubmitting));

        form.finish_submission(Err("backend unavailable".into()));
        assert_eq!(form.form_error(), Some("backend unavailable"));
        assert_eq!(form.data().general.title, "Ljus tvåa med balkong");

        assert!(matches!(form.begin_submission(), SubmitStart::Ready(_)));
        form.finish_submission(Ok("prop-1".into()));
        assert_eq!(form.data(), &FormData::default());
        assert!(form.images().is_empty());
        assert!(!form.is_submitting());
    }

    #[test]
    fn invalid_submission_populates_all_errors() {
        let mut form = machine();
        let SubmitStart::Invalid(errors) = form.begin_submission() else {
            panic!("expected validation failure");
        };
        assert!(errors.contains(Field::Title));
        assert!(errors.contains(Field::Email));
        assert_eq!(form.errors(), &errors);
        assert!(!form.is_submitting());
    }

    #[test]
    fn resume_keeps_fields_and_drops_photos() {
        let mut form = machine();
        form.add_images(vec![photo()]);

        let mut fields = FormData::default();
        fields.general.title = "Villa Test".to_string();
        fields.pricing.price = 150_000;
        form.resume_from(DraftSnapshot::capture(&fields, Step::PricingContact, 3));

        assert_eq!(form.data().general.title, "Villa Test");
        assert_eq!(form.data().pricing.price, 150_000);
        assert!(form.images().is_empty());
        assert_eq!(form.step(), Step::General);
        assert!(!form.is_dirty());
    }

    #[test]
    fn mark_saved_ignores_stale_revisions() {
        let mut form = machine();
        form.update_field(FieldUpdate::City("Lund".into()));
        let saved = form.revision();
        form.update_field(FieldUpdate::City("Malmö".into()));

        form.mark_saved(saved);
        assert!(form.is_dirty());
        form.mark_saved(form.revision());
        assert!(!form.is_dirty());
    }

    #[test]
    fn observers_see_step_changes() {
        let mut form = machine();
        let mut events = form.subscribe();
        form.update_field(FieldUpdate::Title("Villa Test".into()));
        form.next_step();

        assert_eq!(events.try_recv().unwrap(), FormEvent::FieldChanged(Field::Title));
        assert_eq!(
            events.try_recv().unwrap(),
            FormEvent::StepChanged {
                from: Step::General,
                to: Step::Location
            }
        );
    }
}
