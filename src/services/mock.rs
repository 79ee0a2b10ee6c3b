use crate::images::ImageFile;
use crate::models::{
    Amenities, Contact, Coordinates, FormData, GeneralInfo, Location, Pricing, PropertyType,
    TransactionType,
};
use crate::services::traits::{Geocoder, ImageStorage, SubmissionService};
use crate::services::types::PropertySubmission;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

const SODERMALM: Coordinates = Coordinates {
    latitude: 59.3145,
    longitude: 18.0736,
};

fn listing(address: &str, area: &str, price: u64, rooms: u32, sqm: f64, amenities: Amenities) -> FormData {
    FormData {
        general: GeneralInfo {
            title: format!("{rooms} rum på {area}"),
            description: format!("Lägenhet i {area}. {rooms} rum, {sqm} kvm."),
            property_type: PropertyType::Apartment,
            bedrooms: rooms.saturating_sub(1),
            bathrooms: 1,
            surface_area: Some(sqm),
            ..GeneralInfo::default()
        },
        location: Location {
            city: "Stockholm".to_string(),
            district: area.to_string(),
            address: address.to_string(),
            coordinates: None,
        },
        pricing: Pricing {
            price,
            transaction: TransactionType::Rent,
            payment_day: Some(25),
            ..Pricing::default()
        },
        contact: Contact {
            owner_name: "Anna Berg".to_string(),
            email: "anna.berg@example.se".to_string(),
            phone: "+46 70 123 45 67".to_string(),
        },
        amenities,
    }
}

/// Typical Södermalm rentals, used by the demo and tests
pub fn sample_listings() -> Vec<FormData> {
    let lift_and_balcony = Amenities {
        elevator: true,
        balcony: true,
        ..Amenities::default()
    };
    vec![
        listing("Götgatan 120", "Södermalm", 14_500, 2, 70.0, lift_and_balcony),
        listing("Ringvägen 11A", "Södermalm", 21_900, 4, 84.0, lift_and_balcony),
        listing("Tjustgatan 4", "Katarina", 8_900, 1, 24.0, lift_and_balcony),
        listing(
            "Folkungagatan 101",
            "Södermalm",
            11_200,
            2,
            39.0,
            Amenities {
                elevator: true,
                ..Amenities::default()
            },
        ),
    ]
}

/// In-process backend: accepts listings, "stores" photos and geocodes
/// addresses it knows about
#[derive(Debug, Default)]
pub struct MockBackend {
    latency: Duration,
    fail_submissions: AtomicBool,
    submit_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    listings: Mutex<HashMap<String, PropertySubmission>>,
    known_addresses: HashMap<String, Coordinates>,
}

impl MockBackend {
    pub fn new() -> Self {
        let known_addresses = sample_listings()
            .into_iter()
            .map(|l| (l.location.address.to_lowercase(), SODERMALM))
            .collect();
        Self {
            known_addresses,
            ..Self::default()
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_submissions.store(failing, Ordering::SeqCst);
    }

    /// Calls to `create` and `update`
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn listing(&self, property_id: &str) -> Option<PropertySubmission> {
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(property_id)
            .cloned()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn store(&self, property_id: String, listing: &PropertySubmission) -> Result<String> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            anyhow::bail!("Listing service is temporarily unavailable");
        }
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(property_id.clone(), listing.clone());
        Ok(property_id)
    }
}

#[async_trait]
impl SubmissionService for MockBackend {
    async fn create(&self, listing: &PropertySubmission) -> Result<String> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let id = format!("mock_property_{}", n + 1);
        info!("📋 Mock backend storing {:?} as {}", listing.fields.general.title, id);
        self.store(id, listing)
    }

    async fn update(&self, property_id: &str, listing: &PropertySubmission) -> Result<String> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.store(property_id.to_string(), listing)
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}

#[async_trait]
impl ImageStorage for MockBackend {
    async fn upload(&self, subject_id: &str, files: &[ImageFile]) -> Result<Vec<String>> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        Ok(files
            .iter()
            .enumerate()
            .map(|(i, f)| format!("https://cdn.example.se/properties/{subject_id}/{i:02}-{}", f.name()))
            .collect())
    }
}

#[async_trait]
impl Geocoder for MockBackend {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        self.simulate_latency().await;
        Ok(self.known_addresses.get(&address.trim().to_lowercase()).copied())
    }
}
