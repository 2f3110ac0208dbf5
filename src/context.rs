//! Process-scoped application context
//!
//! Built once at startup from [`Config`] and passed by reference to every
//! handler. Collaborators are created lazily and shared for the process lifetime.

use crate::config::{Config, CorruptPolicy};
use crate::embeddings::{create_embedder, ImageEmbedder};
use crate::engine::SimilarityEngine;
use crate::error::Result;
use crate::geo::{ExifGpsExtractor, GpsExtractor, NominatimGeocoder, ReverseGeocoder};
use crate::index::IndexStore;
use crate::pipeline::RecognitionPipeline;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::debug;

pub struct AppContext {
    config: Config,
    engine: OnceCell<Arc<SimilarityEngine>>,
    embedder: Arc<dyn ImageEmbedder>,
    geocoder: OnceCell<Arc<dyn ReverseGeocoder>>,
    gps: Arc<dyn GpsExtractor>,
}

impl AppContext {
    /// Nothing is loaded here; the index and model load on first use
    pub fn new(config: Config) -> Self {
        let embedder = Arc::new(create_embedder(&config.embeddings, config.index.dimension));
        Self {
            config,
            engine: OnceCell::new(),
            embedder,
            geocoder: OnceCell::new(),
            gps: Arc::new(ExifGpsExtractor),
        }
    }

    /// Context with caller-supplied collaborators (alternate models, offline geocoding)
    pub fn with_collaborators(
        config: Config,
        embedder: Arc<dyn ImageEmbedder>,
        geocoder: Arc<dyn ReverseGeocoder>,
        gps: Arc<dyn GpsExtractor>,
    ) -> Self {
        Self {
            config,
            engine: OnceCell::new(),
            embedder,
            geocoder: OnceCell::with_value(geocoder),
            gps,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The store for the configured data directory (no I/O)
    pub fn store(&self) -> IndexStore {
        IndexStore::new(&self.config.index.data_dir, self.config.index.dimension)
    }

    /// Shared engine, loaded from disk on first call
    pub fn engine(&self) -> Result<Arc<SimilarityEngine>> {
        self.engine
            .get_or_try_init(|| {
                let store = self.store();
                debug!(dir = %store.dir().display(), policy = ?self.config.index.on_corrupt, "Opening index");
                let engine = match self.config.index.on_corrupt {
                    CorruptPolicy::Fail => SimilarityEngine::open(store)?,
                    CorruptPolicy::Reset => SimilarityEngine::open_or_reset(store)?,
                };
                Ok(Arc::new(engine))
            })
            .cloned()
    }

    pub fn embedder(&self) -> Arc<dyn ImageEmbedder> {
        self.embedder.clone()
    }

    pub fn geocoder(&self) -> Result<Arc<dyn ReverseGeocoder>> {
        self.geocoder
            .get_or_try_init(|| {
                let geocoder: Arc<dyn ReverseGeocoder> =
                    Arc::new(NominatimGeocoder::new(&self.config.geocoder)?);
                Ok(geocoder)
            })
            .cloned()
    }

    pub fn gps(&self) -> Arc<dyn GpsExtractor> {
        self.gps.clone()
    }

    /// Pipeline over the shared collaborators with the configured threshold
    pub fn pipeline(&self) -> Result<RecognitionPipeline> {
        Ok(RecognitionPipeline::new(
            self.engine()?,
            self.embedder(),
            self.geocoder()?,
            self.gps(),
            self.config.recognition.threshold,
        ))
    }
}
