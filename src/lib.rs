pub mod config;
pub mod context;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod eval;
pub mod geo;
pub mod index;
pub mod ingest;
pub mod paths;
pub mod pipeline;

// Re-export commonly used types
pub use config::Config;
pub use context::AppContext;
pub use engine::{AddOutcome, MatchResult, SimilarityEngine};
pub use error::{Error, Result};
pub use geo::GeoPoint;
pub use pipeline::{RecognitionOutcome, RecognitionPipeline, Source};
