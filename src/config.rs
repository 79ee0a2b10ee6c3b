use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::images::{ImageLimits, DEFAULT_IMAGE_CAPACITY, DEFAULT_MAX_IMAGE_BYTES};

pub const CONFIG_ENV_VAR: &str = "LISTING_WIZARD_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Hosted backend used for submission, photo storage and geocoding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub geocoder_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: None,
            geocoder_url: None,
            timeout_secs: 30,
        }
    }
}

/// Settings for the submission wizard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WizardConfig {
    /// Quiet period before a draft is written
    pub autosave_delay_ms: u64,
    pub max_image_bytes: usize,
    pub max_images: usize,
    pub draft_key_prefix: String,
    /// Directory of the file-backed draft store
    pub draft_dir: PathBuf,
    /// Without a backend the in-process mock is used
    pub backend: Option<BackendConfig>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: 2000,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_images: DEFAULT_IMAGE_CAPACITY,
            draft_key_prefix: "property-draft".to_string(),
            draft_dir: PathBuf::from("drafts"),
            backend: None,
        }
    }
}

impl WizardConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: WizardConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// File named by `LISTING_WIZARD_CONFIG`, or defaults when unset
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "autosave_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_images == 0 {
            return Err(ConfigError::Invalid(
                "max_images must be greater than zero".to_string(),
            ));
        }
        if self.draft_key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "draft_key_prefix cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn image_limits(&self) -> ImageLimits {
        ImageLimits {
            max_bytes: self.max_image_bytes,
            capacity: self.max_images,
        }
    }
}
