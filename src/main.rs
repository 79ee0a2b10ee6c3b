use anyhow::Context;
use listing_wizard::draft::FileDraftStore;
use listing_wizard::images::{ImageFile, InMemoryPreviewAllocator};
use listing_wizard::models::Amenity;
use listing_wizard::services::mock::sample_listings;
use listing_wizard::services::{
    GeocodeQuery, Geocoder, ImageStorage, MockBackend, NominatimGeocoder, RestBackend,
    SubmissionService,
};
use listing_wizard::{
    Collaborators, FieldUpdate, FormData, FormMode, PropertyFormSession, SessionStart, Step,
    SubmitOutcome, WizardConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Photos listed next to the form data in a listing file
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ListingFile {
    #[serde(flatten)]
    fields: FormData,
    photos: Vec<String>,
}

fn collaborators(config: &WizardConfig) -> anyhow::Result<Collaborators> {
    let store = Arc::new(FileDraftStore::new(&config.draft_dir));
    let previews = Arc::new(InMemoryPreviewAllocator::new());

    let (submissions, images, geocoder): (
        Arc<dyn SubmissionService>,
        Arc<dyn ImageStorage>,
        Arc<dyn Geocoder>,
    ) = match &config.backend {
        Some(backend) => {
            info!("Using REST backend at {}", backend.base_url);
            let rest = Arc::new(RestBackend::new(backend)?);
            let geocoder: Arc<dyn Geocoder> = match &backend.geocoder_url {
                Some(url) => Arc::new(NominatimGeocoder::new(
                    url,
                    Duration::from_secs(backend.timeout_secs),
                )?),
                None => Arc::new(MockBackend::new()),
            };
            let submissions: Arc<dyn SubmissionService> = rest.clone();
            let images: Arc<dyn ImageStorage> = rest;
            (submissions, images, geocoder)
        }
        None => {
            info!("No backend configured, using the mock backend");
            let mock = Arc::new(MockBackend::new());
            let submissions: Arc<dyn SubmissionService> = mock.clone();
            let images: Arc<dyn ImageStorage> = mock.clone();
            let geocoder: Arc<dyn Geocoder> = mock;
            (submissions, images, geocoder)
        }
    };

    Ok(Collaborators {
        store,
        submissions,
        images,
        geocoder: Some(geocoder),
        previews,
    })
}

async fn load_listing(path: Option<String>) -> anyhow::Result<(FormData, Vec<ImageFile>)> {
    let Some(path) = path else {
        info!("No listing file given, using a built-in sample");
        let fields = sample_listings().into_iter().next().unwrap_or_default();
        let photo = ImageFile::new("vardagsrum.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]);
        return Ok((fields, vec![photo]));
    };

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read listing file {path}"))?;
    let listing: ListingFile = serde_json::from_str(&raw).context("Invalid listing file")?;

    let mut photos = Vec::new();
    for photo in &listing.photos {
        match ImageFile::from_path(photo).await {
            Ok(file) => photos.push(file),
            Err(e) => warn!("Skipping photo {}: {:#}", photo, e),
        }
    }
    Ok((listing.fields, photos))
}

/// Replay a listing through the wizard field by field
fn fill(session: &PropertyFormSession, fields: &FormData) {
    let general = fields.general.clone();
    let location = fields.location.clone();
    let pricing = fields.pricing.clone();
    let contact = fields.contact.clone();

    for update in [
        FieldUpdate::Title(general.title),
        FieldUpdate::Description(general.description),
        FieldUpdate::PropertyType(general.property_type),
        FieldUpdate::Category(general.category),
        FieldUpdate::Bedrooms(general.bedrooms),
        FieldUpdate::Bathrooms(general.bathrooms),
        FieldUpdate::SurfaceArea(general.surface_area),
        FieldUpdate::City(location.city),
        FieldUpdate::District(location.district),
        FieldUpdate::Address(location.address),
        FieldUpdate::Coordinates(location.coordinates),
        FieldUpdate::Price(pricing.price),
        FieldUpdate::Transaction(pricing.transaction),
        FieldUpdate::Deposit(pricing.deposit),
        FieldUpdate::PaymentDay(pricing.payment_day),
        FieldUpdate::AvailableFrom(pricing.available_from),
        FieldUpdate::AvailableUntil(pricing.available_until),
        FieldUpdate::OwnerName(contact.owner_name),
        FieldUpdate::Email(contact.email),
        FieldUpdate::Phone(contact.phone),
    ] {
        session.update_field(update);
    }

    for amenity in Amenity::ALL {
        if fields.amenities.get(amenity) {
            session.update_field(FieldUpdate::Amenity(amenity, true));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🏠 Listing Wizard - property submission");
    info!("==========================================");

    let config = WizardConfig::load()?;
    let session = match PropertyFormSession::start(
        &config,
        FormMode::Create,
        None,
        collaborators(&config)?,
    )
    .await
    {
        SessionStart::Ready(session) => session,
        SessionStart::DraftFound(pending) => {
            info!(
                "Resuming draft {:?} saved at {}",
                pending.snapshot().fields.general.title,
                pending.snapshot().saved_at
            );
            pending.resume()
        }
    };

    let (fields, photos) = load_listing(std::env::args().nth(1)).await?;
    fill(&session, &fields);

    if fields.location.coordinates.is_none() {
        let outcome = session
            .locate(GeocodeQuery::Address(fields.location.address.clone()))
            .await;
        info!("Location lookup: {:?}", outcome);
    }

    let report = session.add_images(photos);
    for rejected in &report.rejected {
        warn!("Photo {} rejected: {}", rejected.name, rejected.reason);
    }

    while session.step() != Step::Review {
        let step = session.step();
        if !session.next_step().await {
            for (field, message) in session.errors().iter() {
                warn!("{}: {}", field, message);
            }
            anyhow::bail!("Listing is incomplete at step {}", step);
        }
        info!("✅ {} complete", step);
    }

    match session.submit().await {
        Ok(SubmitOutcome::Saved { property_id }) => {
            println!("Listing published as {property_id}");
        }
        Ok(SubmitOutcome::AlreadyInFlight) => {
            println!("A submission is already in progress");
        }
        Err(e) => {
            println!("Submission failed: {e}");
            println!("Your draft is kept in {}", config.draft_dir.display());
        }
    }

    session.close();
    Ok(())
}
