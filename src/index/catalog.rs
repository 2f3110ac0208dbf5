//! Place metadata, positionally aligned with the vector index

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for one reference vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Position of the vector in the index; fixed at append time
    pub ordinal: usize,
    /// Unique place name, e.g. `Eiffel_Tower`
    pub place_name: String,
    /// Where the reference image came from (usually a storage path)
    pub source_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

/// Ordinal-indexed catalog with constant-time lookup by place name
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
}

impl ReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries, checking ordinals and name uniqueness
    pub(crate) fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, String> {
        let mut by_name = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.ordinal != position {
                return Err(format!(
                    "entry '{}' has ordinal {} at position {}",
                    entry.place_name, entry.ordinal, position
                ));
            }
            if by_name.insert(entry.place_name.clone(), position).is_some() {
                return Err(format!("duplicate place name '{}'", entry.place_name));
            }
        }
        Ok(Self { entries, by_name })
    }

    /// Append a new place, returning its ordinal
    ///
    /// The caller checks [`Self::find_by_place_name`] first; place names are unique.
    pub fn append(&mut self, place_name: &str, source_ref: &str) -> usize {
        debug_assert!(
            !self.by_name.contains_key(place_name),
            "duplicate place name appended: {place_name}"
        );

        let ordinal = self.entries.len();
        self.entries.push(CatalogEntry {
            ordinal,
            place_name: place_name.to_string(),
            source_ref: source_ref.to_string(),
            added_at: Some(Utc::now()),
        });
        self.by_name.insert(place_name.to_string(), ordinal);
        ordinal
    }

    pub fn get(&self, ordinal: usize) -> Option<&CatalogEntry> {
        self.entries.get(ordinal)
    }

    pub fn find_by_place_name(&self, place_name: &str) -> Option<&CatalogEntry> {
        self.by_name
            .get(place_name)
            .and_then(|&ordinal| self.entries.get(ordinal))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Drop entries from `len` onward (rollback of a failed write-through)
    pub(crate) fn truncate(&mut self, len: usize) {
        for entry in self.entries.drain(len.min(self.entries.len())..) {
            self.by_name.remove(&entry.place_name);
        }
    }
}
