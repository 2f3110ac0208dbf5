//! Persistence for the (VectorIndex, ReferenceCatalog) pair
//!
//! Two artifacts in one directory:
//! - `landmarks.vectors` - 16-byte header (magic, dimension) followed by
//!   fixed-width little-endian f32 blocks, one per ordinal
//! - `landmarks.catalog.json` - entries plus the committed `count` and the
//!   SHA-256 of the committed vector bytes
//!
//! The catalog is the commit record. `save` writes both to temporaries,
//! syncs them, then renames the vectors first and the catalog last, so an
//! existing catalog always describes a fully written vector file. Because the
//! index is append-only, a vector file left longer than `count` by an
//! interrupted save still carries the committed prefix intact; `load` verifies
//! that prefix against the recorded hash and ignores the tail.

use super::{CatalogEntry, ReferenceCatalog, VectorIndex};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const VECTORS_FILE: &str = "landmarks.vectors";
pub const CATALOG_FILE: &str = "landmarks.catalog.json";

const VECTORS_MAGIC: [u8; 8] = *b"GGVECS01";
const HEADER_LEN: usize = 16;
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct CatalogFileOut<'a> {
    version: u32,
    dimension: usize,
    count: usize,
    vectors_sha256: String,
    entries: &'a [CatalogEntry],
}

#[derive(Deserialize)]
struct CatalogFileIn {
    version: u32,
    dimension: usize,
    count: usize,
    vectors_sha256: String,
    entries: Vec<CatalogEntry>,
}

/// Loads and saves the index pair as one logical unit
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
    dimension: usize,
}

impl IndexStore {
    /// Store rooted at `dir` for vectors of `dimension` components
    pub fn new(dir: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            dir: dir.into(),
            dimension,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.join(CATALOG_FILE)
    }

    /// Load the persisted pair, or fresh empty instances if nothing was committed
    pub fn load(&self) -> Result<(VectorIndex, ReferenceCatalog)> {
        let catalog_path = self.catalog_path();
        let vectors_path = self.vectors_path();

        // Catalog first: once it exists, the vectors it describes are on disk
        let raw = match fs::read(&catalog_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if vectors_path.exists() {
                    warn!(
                        path = %vectors_path.display(),
                        "Vector file without catalog (uncommitted first save), starting empty"
                    );
                }
                return self.empty();
            }
            Err(e) => return Err(Error::io(&catalog_path, e)),
        };

        let file: CatalogFileIn = serde_json::from_slice(&raw)
            .map_err(|e| Error::corrupt(&catalog_path, format!("unreadable catalog: {e}")))?;

        if file.version != FORMAT_VERSION {
            return Err(Error::corrupt(
                &catalog_path,
                format!("unsupported format version {}", file.version),
            ));
        }
        if file.dimension != self.dimension {
            return Err(Error::corrupt(
                &catalog_path,
                format!(
                    "catalog dimension {} does not match configured {}",
                    file.dimension, self.dimension
                ),
            ));
        }
        if file.entries.len() != file.count {
            return Err(Error::corrupt(
                &catalog_path,
                format!("count {} but {} entries", file.count, file.entries.len()),
            ));
        }

        let bytes = match fs::read(&vectors_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::corrupt(&vectors_path, "catalog present but vector file missing"))
            }
            Err(e) => return Err(Error::io(&vectors_path, e)),
        };

        let body = self.check_header(&vectors_path, &bytes)?;
        let block = self.dimension * std::mem::size_of::<f32>();
        if body.len() % block != 0 {
            return Err(Error::corrupt(
                &vectors_path,
                format!("{} body bytes is not a multiple of {}", body.len(), block),
            ));
        }

        let stored = body.len() / block;
        if stored < file.count {
            return Err(Error::corrupt(
                &vectors_path,
                format!("{} vectors on disk, catalog expects {}", stored, file.count),
            ));
        }

        let committed = &body[..file.count * block];
        if sha256_hex(committed) != file.vectors_sha256 {
            return Err(Error::corrupt(&vectors_path, "vector checksum mismatch"));
        }
        if stored > file.count {
            warn!(
                committed = file.count,
                on_disk = stored,
                "Ignoring uncommitted vectors from an interrupted save"
            );
        }

        let data: Vec<f32> = committed
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let index = VectorIndex::from_flat(self.dimension, data)
            .map_err(|e| Error::corrupt(&vectors_path, e.to_string()))?;
        let catalog = ReferenceCatalog::from_entries(file.entries)
            .map_err(|reason| Error::corrupt(&catalog_path, reason))?;

        info!(
            count = index.len(),
            dimension = self.dimension,
            dir = %self.dir.display(),
            "Loaded reference index"
        );
        Ok((index, catalog))
    }

    /// Persist the pair so a reader never observes one without the other
    pub fn save(&self, index: &VectorIndex, catalog: &ReferenceCatalog) -> Result<()> {
        if index.len() != catalog.len() || index.dimension() != self.dimension {
            return Err(Error::corrupt(
                &self.dir,
                format!(
                    "refusing to save {} vectors of dimension {} with {} catalog entries",
                    index.len(),
                    index.dimension(),
                    catalog.len()
                ),
            ));
        }

        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let body = vector_bytes(index.as_flat());

        let mut vectors = Vec::with_capacity(HEADER_LEN + body.len());
        vectors.extend_from_slice(&VECTORS_MAGIC);
        vectors.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        vectors.extend_from_slice(&0u32.to_le_bytes());
        vectors.extend_from_slice(&body);

        let catalog_path = self.catalog_path();
        let catalog_json = serde_json::to_vec_pretty(&CatalogFileOut {
            version: FORMAT_VERSION,
            dimension: self.dimension,
            count: catalog.len(),
            vectors_sha256: sha256_hex(&body),
            entries: catalog.entries(),
        })
        .map_err(|e| Error::io(&catalog_path, e.into()))?;

        let vectors_path = self.vectors_path();
        let vectors_tmp = temp_path(&vectors_path);
        let catalog_tmp = temp_path(&catalog_path);

        write_synced(&vectors_tmp, &vectors)?;
        write_synced(&catalog_tmp, &catalog_json)?;

        // Vectors first, catalog last: the catalog rename commits the save
        fs::rename(&vectors_tmp, &vectors_path).map_err(|e| Error::io(&vectors_path, e))?;
        fs::rename(&catalog_tmp, &catalog_path).map_err(|e| Error::io(&catalog_path, e))?;
        sync_dir(&self.dir);

        debug!(count = catalog.len(), dir = %self.dir.display(), "Saved reference index");
        Ok(())
    }

    /// Move existing artifacts aside so the next load starts empty
    ///
    /// Returns the paths the artifacts were moved to.
    pub fn quarantine(&self) -> Result<Vec<PathBuf>> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let mut moved = Vec::new();

        for path in [self.catalog_path(), self.vectors_path()] {
            if !path.exists() {
                continue;
            }
            let target = suffixed(&path, &format!("corrupt-{stamp}"));
            fs::rename(&path, &target).map_err(|e| Error::io(&path, e))?;
            moved.push(target);
        }

        Ok(moved)
    }

    fn empty(&self) -> Result<(VectorIndex, ReferenceCatalog)> {
        Ok((VectorIndex::new(self.dimension)?, ReferenceCatalog::new()))
    }

    fn check_header<'a>(&self, path: &Path, bytes: &'a [u8]) -> Result<&'a [u8]> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::corrupt(path, "vector file shorter than header"));
        }
        if bytes[..8] != VECTORS_MAGIC {
            return Err(Error::corrupt(path, "bad magic"));
        }
        let dimension = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        if dimension != self.dimension {
            return Err(Error::corrupt(
                path,
                format!(
                    "vector dimension {} does not match configured {}",
                    dimension, self.dimension
                ),
            ));
        }
        Ok(&bytes[HEADER_LEN..])
    }
}

#[cfg(target_endian = "little")]
fn vector_bytes(data: &[f32]) -> Cow<'_, [u8]> {
    use zerocopy::AsBytes;
    Cow::Borrowed(data.as_bytes())
}

#[cfg(target_endian = "big")]
fn vector_bytes(data: &[f32]) -> Cow<'_, [u8]> {
    Cow::Owned(data.iter().flat_map(|v| v.to_le_bytes()).collect())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn temp_path(path: &Path) -> PathBuf {
    suffixed(path, "tmp")
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(bytes).map_err(|e| Error::io(path, e))?;
    file.sync_all().map_err(|e| Error::io(path, e))
}

/// Persist the renames themselves. Best effort: not every platform can
/// open a directory for syncing.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populated(dimension: usize, names: &[&str]) -> (VectorIndex, ReferenceCatalog) {
        let mut index = VectorIndex::new(dimension).unwrap();
        let mut catalog = ReferenceCatalog::new();
        for (i, name) in names.iter().enumerate() {
            let mut v = vec![0.0; dimension];
            v[i % dimension] = 1.0;
            index.add(&v).unwrap();
            catalog.append(name, &format!("landmarks/{name}/ref.jpg"));
        }
        (index, catalog)
    }

    #[test]
    fn test_zero_dimension_store_fails_to_load() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 0);
        assert!(matches!(store.load(), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_load_without_state_is_empty() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path().join("data"), 4);
        let (index, catalog) = store.load()?;
        assert!(index.is_empty());
        assert!(catalog.is_empty());
        assert_eq!(index.dimension(), 4);
        Ok(())
    }

    #[test]
    fn test_save_load_roundtrip() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);
        let (index, catalog) = populated(4, &["Taj_Mahal", "Eiffel_Tower", "Big_Ben"]);
        store.save(&index, &catalog)?;

        let (loaded_index, loaded_catalog) = store.load()?;
        assert_eq!(loaded_index.as_flat(), index.as_flat());
        assert_eq!(loaded_catalog.entries(), catalog.entries());
        assert_eq!(
            loaded_catalog.find_by_place_name("Big_Ben").map(|e| e.ordinal),
            Some(2)
        );
        Ok(())
    }

    #[test]
    fn test_save_leaves_no_temporaries() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);
        let (index, catalog) = populated(4, &["A"]);
        store.save(&index, &catalog)?;

        let mut names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![CATALOG_FILE.to_string(), VECTORS_FILE.to_string()]);
        Ok(())
    }

    #[test]
    fn test_configured_dimension_mismatch_is_corrupt() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let (index, catalog) = populated(4, &["A"]);
        IndexStore::new(temp.path(), 4).save(&index, &catalog)?;

        let err = IndexStore::new(temp.path(), 8).load().unwrap_err();
        assert!(matches!(err, Error::CorruptState { .. }));
        Ok(())
    }

    #[test]
    fn test_truncated_vectors_are_corrupt() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);
        let (index, catalog) = populated(4, &["A", "B"]);
        store.save(&index, &catalog)?;

        let bytes = fs::read(store.vectors_path()).unwrap();
        fs::write(store.vectors_path(), &bytes[..HEADER_LEN + 16]).unwrap();

        assert!(matches!(store.load(), Err(Error::CorruptState { .. })));
        Ok(())
    }

    #[test]
    fn test_flipped_vector_byte_fails_checksum() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);
        let (index, catalog) = populated(4, &["A", "B"]);
        store.save(&index, &catalog)?;

        let mut bytes = fs::read(store.vectors_path()).unwrap();
        bytes[HEADER_LEN + 1] ^= 0xFF;
        fs::write(store.vectors_path(), &bytes).unwrap();

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("checksum"));
        Ok(())
    }

    #[test]
    fn test_uncommitted_tail_is_ignored() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);

        let (index, catalog) = populated(4, &["A"]);
        store.save(&index, &catalog)?;
        let committed_catalog = fs::read(store.catalog_path()).unwrap();

        // A later save renamed its vectors but crashed before the catalog rename
        let (index, catalog) = populated(4, &["A", "B"]);
        store.save(&index, &catalog)?;
        fs::write(store.catalog_path(), committed_catalog).unwrap();

        let (loaded_index, loaded_catalog) = store.load()?;
        assert_eq!(loaded_index.len(), 1);
        assert_eq!(loaded_catalog.len(), 1);
        assert!(loaded_catalog.find_by_place_name("B").is_none());
        Ok(())
    }

    #[test]
    fn test_vectors_without_catalog_start_empty() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);
        let (index, catalog) = populated(4, &["A"]);
        store.save(&index, &catalog)?;
        fs::remove_file(store.catalog_path()).unwrap();

        let (index, catalog) = store.load()?;
        assert!(index.is_empty());
        assert!(catalog.is_empty());
        Ok(())
    }

    #[test]
    fn test_garbage_catalog_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);
        fs::write(store.catalog_path(), b"not json").unwrap();
        assert!(matches!(store.load(), Err(Error::CorruptState { .. })));
    }

    #[test]
    fn test_save_refuses_misaligned_pair() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);
        let (index, _) = populated(4, &["A", "B"]);
        let (_, catalog) = populated(4, &["A"]);
        assert!(store.save(&index, &catalog).is_err());
        assert!(!store.catalog_path().exists());
    }

    #[test]
    fn test_quarantine_moves_artifacts_aside() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), 4);
        let (index, catalog) = populated(4, &["A"]);
        store.save(&index, &catalog)?;

        let moved = store.quarantine()?;
        assert_eq!(moved.len(), 2);
        assert!(moved.iter().all(|p| p.exists()));
        assert!(!store.catalog_path().exists());
        assert!(store.load()?.0.is_empty());
        Ok(())
    }
}
