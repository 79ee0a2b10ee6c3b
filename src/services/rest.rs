use crate::config::BackendConfig;
use crate::images::ImageFile;
use crate::models::Coordinates;
use crate::services::traits::{Geocoder, ImageStorage, SubmissionService};
use crate::services::types::PropertySubmission;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("listing-wizard/", env!("CARGO_PKG_VERSION"));

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("{} returned status: {}", what, status);
    anyhow::bail!("{} failed ({}): {}", what, status, body.trim());
}

/// Pull the listing identifier out of a create/update response
fn parse_listing_id(body: &serde_json::Value) -> Result<String> {
    match body.get("id") {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
        _ => anyhow::bail!("Response did not contain a listing id: {}", body),
    }
}

/// Storage object path for the `index`-th photo of `subject_id`
fn object_path(subject_id: &str, index: usize, file_name: &str) -> String {
    let name: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("properties/{subject_id}/{index:02}-{name}")
}

/// JSON client for the hosted listing backend
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn public_url(&self, object: &str) -> String {
        format!("{}/storage/public/{}", self.base_url, object)
    }
}

#[async_trait]
impl SubmissionService for RestBackend {
    async fn create(&self, listing: &PropertySubmission) -> Result<String> {
        let url = format!("{}/properties", self.base_url);
        debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(&url))
            .json(listing)
            .send()
            .await
            .context("Failed to reach listing backend")?;
        let body: serde_json::Value = ensure_success(response, "Create listing")
            .await?
            .json()
            .await
            .context("Failed to read create response")?;

        let id = parse_listing_id(&body)?;
        info!("Created listing {}", id);
        Ok(id)
    }

    async fn update(&self, property_id: &str, listing: &PropertySubmission) -> Result<String> {
        let url = format!("{}/properties/{}", self.base_url, property_id);
        debug!("PATCH {}", url);

        let response = self
            .authorized(self.client.patch(&url))
            .json(listing)
            .send()
            .await
            .context("Failed to reach listing backend")?;
        let body: serde_json::Value = ensure_success(response, "Update listing")
            .await?
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);

        Ok(parse_listing_id(&body).unwrap_or_else(|_| property_id.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "REST"
    }
}

#[async_trait]
impl ImageStorage for RestBackend {
    async fn upload(&self, subject_id: &str, files: &[ImageFile]) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            let object = object_path(subject_id, index, file.name());
            let url = format!("{}/storage/{}", self.base_url, object);
            debug!("Uploading {} ({} bytes) to {}", file.name(), file.size(), url);

            let response = self
                .authorized(self.client.post(&url))
                .header(reqwest::header::CONTENT_TYPE, file.media_type())
                .body(file.data().to_vec())
                .send()
                .await
                .with_context(|| format!("Failed to upload {}", file.name()))?;
            ensure_success(response, "Image upload").await?;

            urls.push(self.public_url(&object));
        }

        info!("Uploaded {} image(s) for {}", urls.len(), subject_id);
        Ok(urls)
    }
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

fn first_place(places: &[Place]) -> Result<Option<Coordinates>> {
    let Some(place) = places.first() else {
        return Ok(None);
    };
    let latitude = place.lat.parse().context("Invalid latitude in geocoder response")?;
    let longitude = place.lon.parse().context("Invalid longitude in geocoder response")?;
    Ok(Some(Coordinates::new(latitude, longitude)))
}

/// Geocoder speaking the Nominatim search API
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let url = format!("{}/search", self.base_url);
        debug!("Geocoding {:?}", address);

        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .context("Failed to reach geocoder")?;
        let places: Vec<Place> = ensure_success(response, "Geocoding")
            .await?
            .json()
            .await
            .context("Failed to read geocoder response")?;

        first_place(&places)
    }
}
