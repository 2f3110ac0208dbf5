//! SimilarityEngine - the only reader and writer of the reference index
//!
//! Owns the dedup policy (first write wins per place name), write-through
//! persistence, and the locking discipline:
//! - `add` holds the write lock across the dedup check, both appends and
//!   the full save, so concurrent adds of a new place cannot both pass the
//!   dedup check and a save never races another add's mutation
//! - `search` / `best_match` share the read lock and never see a half-applied add

use crate::embeddings::distance_to_confidence;
use crate::error::{Error, Result};
use crate::index::{CatalogEntry, IndexStore, ReferenceCatalog, VectorIndex};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// A reference entry matched by a search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub place_name: String,
    /// `clamp(1 - distance / 2, 0, 1)`
    pub confidence: f32,
    /// Squared Euclidean distance to the query
    pub distance: f32,
    pub ordinal: usize,
    pub source_ref: String,
}

/// What `add` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new entry was appended and persisted
    Added { ordinal: usize },
    /// The place already has a reference; nothing changed
    AlreadyExists { ordinal: usize },
}

impl AddOutcome {
    pub fn ordinal(&self) -> usize {
        match self {
            AddOutcome::Added { ordinal } | AddOutcome::AlreadyExists { ordinal } => *ordinal,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, AddOutcome::Added { .. })
    }
}

struct IndexState {
    index: VectorIndex,
    catalog: ReferenceCatalog,
}

/// Process-wide similarity search over the persisted reference index
pub struct SimilarityEngine {
    state: RwLock<IndexState>,
    store: IndexStore,
}

impl SimilarityEngine {
    /// Load the engine from `store`
    pub fn open(store: IndexStore) -> Result<Self> {
        let (index, catalog) = store.load()?;
        Ok(Self {
            state: RwLock::new(IndexState { index, catalog }),
            store,
        })
    }

    /// Load the engine, moving corrupt artifacts aside and starting empty
    /// instead of failing
    pub fn open_or_reset(store: IndexStore) -> Result<Self> {
        match Self::open(store.clone()) {
            Err(Error::CorruptState { path, reason }) => {
                let moved = store.quarantine()?;
                warn!(
                    path = %path.display(),
                    %reason,
                    moved = ?moved,
                    "Corrupt reference index reset to empty"
                );
                Self::open(store)
            }
            other => other,
        }
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Number of reference entries
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all catalog entries, in ordinal order
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.state.read().catalog.entries().to_vec()
    }

    /// Stored reference vector for a place
    pub fn reference_vector(&self, place_name: &str) -> Option<Vec<f32>> {
        let state = self.state.read();
        let entry = state.catalog.find_by_place_name(place_name)?;
        state.index.get(entry.ordinal).map(<[f32]>::to_vec)
    }

    /// Add a reference embedding for `place_name`
    ///
    /// If the place already exists this is a no-op: the stored vector is not
    /// replaced. Otherwise the entry is appended and persisted before returning.
    pub fn add(&self, embedding: &[f32], place_name: &str, source_ref: &str) -> Result<AddOutcome> {
        self.check_dimension(embedding)?;

        let mut state = self.state.write();

        if let Some(existing) = state.catalog.find_by_place_name(place_name) {
            debug!(place = place_name, ordinal = existing.ordinal, "Skipping add: place already indexed");
            return Ok(AddOutcome::AlreadyExists {
                ordinal: existing.ordinal,
            });
        }

        let ordinal = state.index.add(embedding)?;
        let catalog_ordinal = state.catalog.append(place_name, source_ref);
        debug_assert_eq!(ordinal, catalog_ordinal);

        if let Err(e) = self.store.save(&state.index, &state.catalog) {
            // Keep memory identical to what is on disk
            state.index.truncate(ordinal);
            state.catalog.truncate(ordinal);
            return Err(e);
        }

        info!(place = place_name, ordinal, "Added reference entry");
        Ok(AddOutcome::Added { ordinal })
    }

    /// Up to `k` nearest references, ascending by distance
    pub fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<MatchResult>> {
        self.check_dimension(embedding)?;

        let state = self.state.read();
        let neighbors = state.index.query(embedding, k)?;

        neighbors
            .into_iter()
            .map(|neighbor| {
                let entry = state.catalog.get(neighbor.ordinal).ok_or_else(|| {
                    error!(ordinal = neighbor.ordinal, "Index ordinal missing from catalog");
                    Error::NotFoundInCatalog(neighbor.ordinal)
                })?;
                Ok(MatchResult {
                    place_name: entry.place_name.clone(),
                    confidence: distance_to_confidence(neighbor.distance),
                    distance: neighbor.distance,
                    ordinal: neighbor.ordinal,
                    source_ref: entry.source_ref.clone(),
                })
            })
            .collect()
    }

    /// The top match if its confidence reaches `threshold` (inclusive)
    pub fn best_match(&self, embedding: &[f32], threshold: f32) -> Result<Option<MatchResult>> {
        let best = self.search(embedding, 1)?.into_iter().next();
        Ok(best.filter(|m| m.confidence >= threshold))
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}
