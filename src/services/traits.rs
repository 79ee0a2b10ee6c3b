use crate::images::ImageFile;
use crate::models::Coordinates;
use crate::services::types::PropertySubmission;
use anyhow::Result;
use async_trait::async_trait;

/// Remote property API the finished form is handed to
#[async_trait]
pub trait SubmissionService: Send + Sync {
    /// Create a listing, returning its identifier
    async fn create(&self, listing: &PropertySubmission) -> Result<String>;

    /// Update an existing listing, returning its identifier
    async fn update(&self, property_id: &str, listing: &PropertySubmission) -> Result<String>;

    /// Get the name of the backend
    fn backend_name(&self) -> &'static str;
}

/// Photo storage. Returns public URLs in the same order as `files`.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    async fn upload(&self, subject_id: &str, files: &[ImageFile]) -> Result<Vec<String>>;
}

/// Address lookup. `Ok(None)` means the address was not found.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>>;
}
