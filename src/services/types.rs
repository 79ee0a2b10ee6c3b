use crate::models::{Coordinates, FormData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Finalized listing sent to the submission backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertySubmission {
    #[serde(flatten)]
    pub fields: FormData,
    /// Public image URLs, main image first
    pub images: Vec<String>,
    pub main_image: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl PropertySubmission {
    pub fn new(fields: FormData, images: Vec<String>) -> Self {
        Self {
            main_image: images.first().cloned(),
            fields,
            images,
            submitted_at: Utc::now(),
        }
    }
}

/// Where coordinates for the listing should come from
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeQuery {
    /// Free-text address to look up
    Address(String),
    /// Coordinates reported by the device
    Device(Coordinates),
}
