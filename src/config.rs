//! Configuration for GeoGenie
//!
//! Stored in `~/.geogenie/config.toml`. All sections are optional with defaults.
//!
//! ```toml
//! [index]
//! data_dir = "/var/lib/geogenie"
//! dimension = 512
//! on_corrupt = "reset"
//!
//! [recognition]
//! threshold = 0.65
//!
//! [embeddings]
//! model = "clip-vit-base-patch32"
//!
//! [geocoder]
//! user_agent = "GeoGenie/1.0 (ops@example.com)"
//! ```

use crate::error::{Error, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub index: IndexSection,
    #[serde(default)]
    pub recognition: RecognitionSection,
    #[serde(default)]
    pub embeddings: EmbeddingsSection,
    #[serde(default)]
    pub geocoder: GeocoderSection,
}

/// What to do when the persisted index is corrupt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptPolicy {
    /// Refuse to start
    #[default]
    Fail,
    /// Move the bad artifacts aside and start empty, with a warning
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexSection {
    /// Directory holding the persisted index
    #[serde(default = "paths::data_dir")]
    pub data_dir: PathBuf,
    /// Embedding dimension (512 for CLIP ViT-B/32)
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub on_corrupt: CorruptPolicy,
}

fn default_dimension() -> usize {
    512
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            data_dir: paths::data_dir(),
            dimension: default_dimension(),
            on_corrupt: CorruptPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecognitionSection {
    /// Minimum visual confidence for a match, inclusive
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 {
    0.6
}

impl Default for RecognitionSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingsSection {
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides `~/.geogenie/models/{model}/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,
}

fn default_model() -> String {
    "clip-vit-base-patch32".to_string()
}

impl Default for EmbeddingsSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            model_dir: None,
        }
    }
}

impl EmbeddingsSection {
    /// Directory the ONNX model is loaded from
    pub fn resolved_model_dir(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| paths::models::model_dir(&self.model))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeocoderSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Nominatim rejects requests without an identifying user agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum spacing between requests (Nominatim allows 1 per second)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_base_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}
fn default_user_agent() -> String {
    "GeoGenie/1.0".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_min_interval_ms() -> u64 {
    1000
}

impl Default for GeocoderSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, `~/.geogenie/config.toml` is
    /// read if present, otherwise defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = paths::config_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Read and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.recognition.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "recognition.threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.index.dimension == 0 {
            return Err(Error::Config("index.dimension must be positive".to_string()));
        }
        Ok(())
    }
}
