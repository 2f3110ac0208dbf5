//! Single source of truth for ALL GeoGenie filesystem layout.
//!
//! This module defines WHERE data lives. It has no I/O, no validation,
//! no business logic. One file shows the entire filesystem layout.
//!
//! ```text
//! ~/.geogenie/
//! ├── config.toml                  # User config
//! ├── data/                        # Persisted reference index
//! │   ├── landmarks.vectors        # Fixed-width f32 blocks
//! │   └── landmarks.catalog.json   # Ordinal -> place metadata (commit record)
//! └── models/
//!     └── clip-vit-base-patch32/
//!         └── model.onnx           # CLIP vision tower
//! ```

use std::path::{Path, PathBuf};

/// User's geogenie home directory: `~/.geogenie/`
pub fn geogenie_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geogenie")
}

/// User config file: `~/.geogenie/config.toml`
pub fn config_path() -> PathBuf {
    geogenie_home().join("config.toml")
}

/// Reference index directory: `~/.geogenie/data/`
pub fn data_dir() -> PathBuf {
    geogenie_home().join("data")
}

/// Embedding model paths
pub mod models {
    use super::*;

    /// Model directory root: `~/.geogenie/models/`
    pub fn models_dir() -> PathBuf {
        geogenie_home().join("models")
    }

    /// Specific model directory: `~/.geogenie/models/{name}/`
    pub fn model_dir(name: &str) -> PathBuf {
        models_dir().join(name)
    }

    /// Model ONNX file inside a model directory: `{dir}/model.onnx`
    pub fn model_onnx(dir: &Path) -> PathBuf {
        dir.join("model.onnx")
    }

    /// Quantized variant, preferred when present: `{dir}/model_quantized.onnx`
    pub fn model_onnx_quantized(dir: &Path) -> PathBuf {
        dir.join("model_quantized.onnx")
    }
}
