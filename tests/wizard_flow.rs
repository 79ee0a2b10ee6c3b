use listing_wizard::draft::MemoryDraftStore;
use listing_wizard::images::{ImageFile, InMemoryPreviewAllocator};
use listing_wizard::models::{DraftKey, DraftSnapshot, Step};
use listing_wizard::services::mock::sample_listings;
use listing_wizard::services::MockBackend;
use listing_wizard::{
    Collaborators, FieldUpdate, FormData, FormEvent, FormMode, PropertyFormSession, SessionStart,
    SubmitError, SubmitOutcome, WizardConfig,
};
use std::sync::Arc;
use std::time::Duration;

struct Setup {
    config: WizardConfig,
    store: Arc<MemoryDraftStore>,
    backend: Arc<MockBackend>,
    previews: Arc<InMemoryPreviewAllocator>,
}

impl Setup {
    fn new() -> Self {
        Self::with_backend(MockBackend::new())
    }

    fn with_backend(backend: MockBackend) -> Self {
        Self {
            config: WizardConfig::default(),
            store: Arc::new(MemoryDraftStore::new()),
            backend: Arc::new(backend),
            previews: Arc::new(InMemoryPreviewAllocator::new()),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            submissions: self.backend.clone(),
            images: self.backend.clone(),
            geocoder: Some(self.backend.clone()),
            previews: self.previews.clone(),
        }
    }

    fn key(&self, mode: &FormMode) -> DraftKey {
        DraftKey::for_mode(&self.config.draft_key_prefix, mode)
    }

    async fn start(&self, mode: FormMode, initial: Option<FormData>) -> SessionStart {
        PropertyFormSession::start(&self.config, mode, initial, self.collaborators()).await
    }

    async fn ready(&self, mode: FormMode, initial: Option<FormData>) -> PropertyFormSession {
        match self.start(mode, initial).await {
            SessionStart::Ready(session) => session,
            SessionStart::DraftFound(_) => panic!("expected no stored draft"),
        }
    }

    /// A session holding a complete listing with one photo
    async fn filled(&self) -> PropertyFormSession {
        let session = self.ready(FormMode::Create, sample_listings().into_iter().next()).await;
        session.add_images(vec![photo("hall.jpg")]);
        session
    }
}

fn photo(name: &str) -> ImageFile {
    ImageFile::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
}

#[tokio::test(start_paused = true)]
async fn concurrent_submits_reach_the_backend_once() {
    let setup = Setup::with_backend(MockBackend::new().with_latency(Duration::from_millis(500)));
    let session = setup.filled().await;

    let (first, second) = tokio::join!(session.submit(), session.submit());

    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(setup.backend.submit_calls(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, SubmitOutcome::Saved { .. }))
            .count(),
        1
    );
    assert!(outcomes.contains(&SubmitOutcome::AlreadyInFlight));
}

#[tokio::test(start_paused = true)]
async fn stored_draft_is_offered_and_resumed() {
    let setup = Setup::new();
    let mut fields = FormData::default();
    fields.general.title = "Villa Test".to_string();
    fields.pricing.price = 150_000;
    let snapshot = DraftSnapshot::capture(&fields, Step::Photos, 3);
    setup
        .store
        .insert_raw(&setup.key(&FormMode::Create), snapshot.to_json().unwrap());

    let pending = match setup.start(FormMode::Create, None).await {
        SessionStart::DraftFound(pending) => pending,
        SessionStart::Ready(_) => panic!("draft should be offered"),
    };
    assert_eq!(pending.snapshot().fields.general.title, "Villa Test");

    let session = pending.resume();
    let data = session.data();
    assert_eq!(data.general.title, "Villa Test");
    assert_eq!(data.pricing.price, 150_000);
    assert_eq!(session.step(), Step::General);
    assert!(session.form().images().is_empty());
}

#[tokio::test(start_paused = true)]
async fn discarded_draft_leaves_a_blank_form() {
    let setup = Setup::new();
    let mut fields = FormData::default();
    fields.location.city = "Uppsala".to_string();
    let key = setup.key(&FormMode::Create);
    setup
        .store
        .insert_raw(&key, DraftSnapshot::capture(&fields, Step::Location, 0).to_json().unwrap());

    let session = match setup.start(FormMode::Create, None).await {
        SessionStart::DraftFound(pending) => pending.discard().await,
        SessionStart::Ready(_) => panic!("draft should be offered"),
    };
    assert_eq!(session.data(), FormData::default());
    assert_eq!(setup.store.raw(&key), None);
}

#[tokio::test(start_paused = true)]
async fn corrupt_draft_is_dropped_silently() {
    let setup = Setup::new();
    let key = setup.key(&FormMode::Create);
    setup.store.insert_raw(&key, "{not json");

    assert!(matches!(
        setup.start(FormMode::Create, None).await,
        SessionStart::Ready(_)
    ));
    assert_eq!(setup.store.raw(&key), None);
}

#[tokio::test(start_paused = true)]
async fn backend_failure_keeps_the_form_for_a_retry() {
    let setup = Setup::new();
    let session = setup.filled().await;
    let title = session.data().general.title;

    setup.backend.set_failing(true);
    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, SubmitError::Backend(_)));
    assert_eq!(session.data().general.title, title);
    assert_eq!(session.form().images().len(), 1);
    assert!(session.form().form_error().is_some());
    assert!(!session.form().is_submitting());

    setup.backend.set_failing(false);
    let outcome = session.submit().await.unwrap();
    let SubmitOutcome::Saved { property_id } = outcome else {
        panic!("expected a saved listing");
    };
    let listing = setup.backend.listing(&property_id).expect("listing stored");
    assert_eq!(listing.images.len(), 1);
    assert_eq!(listing.main_image.as_deref(), listing.images.first().map(String::as_str));

    assert_eq!(session.data(), FormData::default());
    assert_eq!(setup.previews.live_count(), 0);
    assert_eq!(setup.store.raw(session.draft_key()), None);
}

#[tokio::test(start_paused = true)]
async fn invalid_form_is_not_submitted() {
    let setup = Setup::new();
    let session = setup.ready(FormMode::Create, None).await;

    let err = session.submit().await.unwrap_err();
    let SubmitError::Invalid(errors) = err else {
        panic!("expected field errors");
    };
    assert!(!errors.is_empty());
    assert_eq!(setup.backend.submit_calls(), 0);
    assert_eq!(session.errors(), errors);
}

#[tokio::test(start_paused = true)]
async fn edit_mode_updates_the_existing_listing() {
    let setup = Setup::new();
    let mode = FormMode::Edit {
        property_id: "prop-42".to_string(),
    };
    let session = setup.ready(mode.clone(), sample_listings().into_iter().nth(1)).await;
    session.add_images(vec![photo("kok.jpg")]);
    session.update_field(FieldUpdate::Price(22_500));

    let outcome = session.submit().await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Saved {
            property_id: "prop-42".to_string()
        }
    );
    let listing = setup.backend.listing("prop-42").expect("listing stored");
    assert_eq!(listing.fields.pricing.price, 22_500);
    assert!(listing.images[0].contains("prop-42"));
    assert_ne!(setup.key(&mode), setup.key(&FormMode::Create));
}

#[tokio::test(start_paused = true)]
async fn typing_produces_a_single_draft_write() {
    let setup = Setup::new();
    let session = setup.ready(FormMode::Create, None).await;

    for title in ["V", "Vi", "Vil", "Vill", "Villa"] {
        session.update_field(FieldUpdate::Title(title.to_string()));
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    tokio::time::sleep(setup.config.autosave_delay() * 2).await;

    assert_eq!(setup.store.writes(), 1);
    let raw = setup.store.raw(session.draft_key()).expect("draft stored");
    assert_eq!(DraftSnapshot::from_json(&raw).unwrap().fields.general.title, "Villa");
    assert!(session.save_status().saved);
}

#[tokio::test(start_paused = true)]
async fn walking_the_wizard_emits_step_events() {
    let setup = Setup::new();
    let session = setup.filled().await;
    let mut events = session.subscribe();

    while session.step() != Step::Review {
        assert!(session.next_step().await, "blocked at {}", session.step());
    }

    let mut steps = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let FormEvent::StepChanged { to, .. } = event {
            steps.push(to);
        }
    }
    assert_eq!(
        steps,
        vec![Step::Location, Step::Photos, Step::PricingContact, Step::Review]
    );
    assert!(session.go_to_step(Step::Location).await);
    assert!(session.go_to_step(Step::Review).await);
}
