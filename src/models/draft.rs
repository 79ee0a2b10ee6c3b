use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::{FormData, FormMode, Step};

pub const DRAFT_FORMAT_VERSION: u32 = 1;

/// Key of the single store slot a draft lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey(String);

impl DraftKey {
    pub fn for_mode(prefix: &str, mode: &FormMode) -> Self {
        match mode {
            FormMode::Create => Self(format!("{prefix}:new")),
            FormMode::Edit { property_id } => Self(format!("{prefix}:edit:{property_id}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum DraftParseError {
    #[error("draft is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported draft format version {0}")]
    UnsupportedVersion(u32),
}

/// Persisted projection of the form.
///
/// Image files and their previews cannot be stored, only their count is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub step: Step,
    pub image_count: usize,
    pub fields: FormData,
}

impl DraftSnapshot {
    pub fn capture(fields: &FormData, step: Step, image_count: usize) -> Self {
        Self {
            version: DRAFT_FORMAT_VERSION,
            saved_at: Utc::now(),
            step,
            image_count,
            fields: fields.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, DraftParseError> {
        let snapshot: DraftSnapshot = serde_json::from_str(raw)?;
        if snapshot.version != DRAFT_FORMAT_VERSION {
            return Err(DraftParseError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Worth offering to resume: a title, an address or city, or a price was entered
    pub fn is_significant(&self) -> bool {
        let general = &self.fields.general;
        let location = &self.fields.location;
        !general.title.trim().is_empty()
            || !location.address.trim().is_empty()
            || !location.city.trim().is_empty()
            || self.fields.pricing.price != 0
    }
}
