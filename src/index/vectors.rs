//! Exact nearest-neighbor search over fixed-dimension vectors

use crate::embeddings::squared_euclidean;
use crate::error::{Error, Result};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Below this many entries a sequential scan beats rayon's fan-out.
const PARALLEL_SCAN_THRESHOLD: usize = 4096;

/// One search hit: the entry's ordinal and its squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub ordinal: usize,
    pub distance: f32,
}

/// Append-only, flat storage of vectors with brute-force search
///
/// Vectors live back to back in one buffer; entry `i` occupies
/// `data[i * dimension..(i + 1) * dimension]`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` components
    ///
    /// A zero dimension is rejected.
    pub fn new(dimension: usize) -> Result<Self> {
        Self::from_flat(dimension, Vec::new())
    }

    /// Rebuild an index from a flat buffer (used by [`super::IndexStore`])
    pub(crate) fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: data.len(),
            });
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector, returning its ordinal
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;
        let ordinal = self.len();
        self.data.extend_from_slice(vector);
        Ok(ordinal)
    }

    /// Stored vector at `ordinal`
    pub fn get(&self, ordinal: usize) -> Option<&[f32]> {
        let start = ordinal.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Return the `k` nearest vectors, ascending by distance
    ///
    /// Equal distances keep insertion order. An empty index yields an empty result.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(vector)?;

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let score = |(ordinal, stored): (usize, &[f32])| Neighbor {
            ordinal,
            distance: squared_euclidean(vector, stored),
        };

        let mut neighbors: Vec<Neighbor> = if self.len() >= PARALLEL_SCAN_THRESHOLD {
            self.data
                .par_chunks_exact(self.dimension)
                .enumerate()
                .map(score)
                .collect()
        } else {
            self.data
                .chunks_exact(self.dimension)
                .enumerate()
                .map(score)
                .collect()
        };

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, rank);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(rank);

        Ok(neighbors)
    }

    /// Flat view of all stored components, in ordinal order
    pub(crate) fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Drop entries from `len` onward. Only used to undo an append whose
    /// persistence failed.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dimension);
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Ascending distance, ties broken by ascending ordinal
fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.ordinal.cmp(&b.ordinal))
}
