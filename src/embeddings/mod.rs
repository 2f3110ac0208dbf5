//! Embeddings module - Turn photos into visual feature vectors
//!
//! Provides trait-based abstraction for image embedding with an ONNX CLIP backend.
//! The model is loaded lazily on first use and shared for the process lifetime.

mod onnx;
mod preprocess;
mod similarity;

pub use onnx::ClipEmbedder;
pub use preprocess::{preprocess, CLIP_IMAGE_SIZE, CLIP_MEAN, CLIP_STD};
pub use similarity::{distance_to_confidence, l2_normalize, squared_euclidean};

use crate::config::EmbeddingsSection;
use crate::error::Result;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing::info;

/// Trait for image embedding engines
///
/// Requires Send + Sync: one embedder is shared by every concurrent request.
pub trait ImageEmbedder: Send + Sync {
    /// Generate a unit-normalized embedding for encoded image bytes (JPEG, PNG, ...)
    fn embed(&self, image: &[u8]) -> Result<Vec<f32>>;

    /// Get embedding dimension (e.g., 512 for CLIP ViT-B/32)
    fn dimension(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Embedder handle that loads the ONNX model on first `embed`
///
/// Construction is free, so a process can hold one from startup and only pay
/// for the model when a request actually needs visual search.
pub struct LazyEmbedder {
    model_name: String,
    model_dir: PathBuf,
    dimension: usize,
    inner: OnceCell<ClipEmbedder>,
}

impl LazyEmbedder {
    pub fn new(model_name: impl Into<String>, model_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            model_name: model_name.into(),
            model_dir: model_dir.into(),
            dimension,
            inner: OnceCell::new(),
        }
    }

    /// Whether the model has been loaded yet
    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }

    fn get(&self) -> Result<&ClipEmbedder> {
        self.inner.get_or_try_init(|| {
            info!(model = %self.model_name, dir = %self.model_dir.display(), "Loading embedding model");
            ClipEmbedder::from_dir(&self.model_dir, &self.model_name, self.dimension)
        })
    }
}

impl ImageEmbedder for LazyEmbedder {
    fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
        self.get()?.embed(image)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Factory function to create the embedder described by configuration
pub fn create_embedder(config: &EmbeddingsSection, dimension: usize) -> LazyEmbedder {
    LazyEmbedder::new(config.model.clone(), config.resolved_model_dir(), dimension)
}
