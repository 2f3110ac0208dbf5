//! Reference index - exact vector search plus place metadata
//!
//! Three pieces, kept positionally aligned by ordinal:
//! - [`VectorIndex`] holds fixed-dimension unit vectors (append-only)
//! - [`ReferenceCatalog`] holds the place name and source reference per ordinal
//! - [`IndexStore`] persists both as one logical unit
//!
//! Only [`crate::engine::SimilarityEngine`] mutates these; everything else
//! goes through it.
//!
//! # Example
//!
//! ```no_run
//! use geogenie::index::IndexStore;
//!
//! let store = IndexStore::new("data", 512);
//! let (index, catalog) = store.load()?;
//! assert_eq!(index.len(), catalog.len());
//! # Ok::<(), geogenie::Error>(())
//! ```

mod catalog;
mod store;
mod vectors;

pub use catalog::{CatalogEntry, ReferenceCatalog};
pub use store::{IndexStore, CATALOG_FILE, VECTORS_FILE};
pub use vectors::{Neighbor, VectorIndex};
