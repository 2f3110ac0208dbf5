//! Ingestion - add confirmed reference images to the index
//!
//! Directory layout for bulk builds:
//!
//! ```text
//! root/
//! ├── Eiffel Tower/
//! │   ├── 001.jpg      <- reference (first by name)
//! │   └── 002.jpg
//! └── taj_mahal/
//!     └── front.png
//! ```

use crate::embeddings::ImageEmbedder;
use crate::engine::{AddOutcome, SimilarityEngine};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Canonical place name: words capitalized and joined with `_`
///
/// `"  eiffel   TOWER "` becomes `"Eiffel_Tower"`. Blank input becomes `"Unknown"`.
pub fn normalize_place_name(name: &str) -> String {
    let words: Vec<String> = name.split_whitespace().map(capitalize).collect();
    if words.is_empty() {
        return "Unknown".to_string();
    }
    words.join("_")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Embed one image and add it under its normalized place name
///
/// `place_name` is the raw name as entered; normalization happens here only,
/// since `normalize_place_name` is not idempotent (`Eiffel_Tower` would become
/// `Eiffel_tower`).
pub fn ingest_image(
    engine: &SimilarityEngine,
    embedder: &dyn ImageEmbedder,
    image: &[u8],
    place_name: &str,
    source_ref: &str,
) -> Result<AddOutcome> {
    let place_name = normalize_place_name(place_name);
    let embedding = embedder.embed(image)?;
    engine.add(&embedding, &place_name, source_ref)
}

/// Outcome of a directory build
#[derive(Debug, Default, Clone, Serialize)]
pub struct BuildReport {
    /// Place directories that contained at least one image
    pub places: usize,
    pub added: usize,
    pub already_present: usize,
    /// Directories with no image files
    pub skipped_empty: usize,
    pub failures: Vec<BuildFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Build the reference index from `root/<place>/<images>`
///
/// The first image of each place (sorted by file name) becomes its reference.
/// Per-image failures are recorded in the report; only an unreadable `root`
/// is an error.
pub fn build_from_directory(
    engine: &SimilarityEngine,
    embedder: &dyn ImageEmbedder,
    root: &Path,
) -> Result<BuildReport> {
    let mut report = BuildReport::default();

    for (label, dir) in label_dirs(root)? {
        let Some(image_path) = image_files(&dir).into_iter().next() else {
            report.skipped_empty += 1;
            continue;
        };
        report.places += 1;

        // Only for the pre-check and logging; ingest_image normalizes the raw label itself
        let place_name = normalize_place_name(&label);
        if engine.reference_vector(&place_name).is_some() {
            report.already_present += 1;
            continue;
        }

        let source_ref = image_path.to_string_lossy().to_string();
        let result = fs::read(&image_path)
            .map_err(|e| Error::io(&image_path, e))
            .and_then(|bytes| ingest_image(engine, embedder, &bytes, &label, &source_ref));

        match result {
            Ok(AddOutcome::Added { ordinal }) => {
                info!(ordinal, place = %place_name, path = %image_path.display(), "Added reference");
                report.added += 1;
            }
            Ok(AddOutcome::AlreadyExists { .. }) => report.already_present += 1,
            Err(e) => {
                warn!(path = %image_path.display(), "Failed to ingest: {}", e);
                report.failures.push(BuildFailure {
                    path: image_path,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Immediate subdirectories of `root` as `(label, path)`, sorted by label
pub(crate) fn label_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !root.is_dir() {
        return Err(Error::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut dirs: Vec<(String, PathBuf)> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| {
            let label = e.file_name().to_string_lossy().to_string();
            (label, e.into_path())
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Image files directly inside `dir`, sorted by file name
pub(crate) fn image_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// `.jpg`, `.jpeg` or `.png`, case-insensitive
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexStore;
    use tempfile::TempDir;

    const DIM: usize = 4;

    /// Maps the first byte of the image to an axis; `0xFF` fails
    struct ByteEmbedder;

    impl ImageEmbedder for ByteEmbedder {
        fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
            match image.first() {
                Some(&b) if (b as usize) < DIM => {
                    let mut v = vec![0.0; DIM];
                    v[b as usize] = 1.0;
                    Ok(v)
                }
                _ => Err(Error::EmbeddingFailure("undecodable".to_string())),
            }
        }
        fn dimension(&self) -> usize {
            DIM
        }
        fn model_name(&self) -> &str {
            "byte"
        }
    }

    #[test]
    fn test_normalize_place_name() {
        assert_eq!(normalize_place_name("eiffel tower"), "Eiffel_Tower");
        assert_eq!(normalize_place_name("  TAJ   mahal "), "Taj_Mahal");
        assert_eq!(normalize_place_name("Colosseum"), "Colosseum");
        assert_eq!(normalize_place_name("big_ben"), "Big_ben");
        assert_eq!(normalize_place_name(""), "Unknown");
        assert_eq!(normalize_place_name("   "), "Unknown");
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a/b.jpg")));
        assert!(is_image_file(Path::new("a/b.JPEG")));
        assert!(is_image_file(Path::new("b.Png")));
        assert!(!is_image_file(Path::new("b.gif")));
        assert!(!is_image_file(Path::new("README")));
    }

    #[test]
    fn test_ingest_image_normalizes_and_dedups() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let engine = SimilarityEngine::open(IndexStore::new(temp.path(), DIM))?;

        let first = ingest_image(&engine, &ByteEmbedder, &[0], "eiffel tower", "a.jpg")?;
        let second = ingest_image(&engine, &ByteEmbedder, &[1], "Eiffel  Tower", "b.jpg")?;

        assert_eq!(first, AddOutcome::Added { ordinal: 0 });
        assert_eq!(second, AddOutcome::AlreadyExists { ordinal: 0 });
        assert_eq!(engine.entries()[0].place_name, "Eiffel_Tower");
        Ok(())
    }

    #[test]
    fn test_build_from_directory() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("landmarks");
        let write = |rel: &str, bytes: &[u8]| {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, bytes).unwrap();
        };
        write("eiffel tower/002.jpg", &[3]);
        write("eiffel tower/001.jpg", &[0]);
        write("taj_mahal/front.PNG", &[1]);
        write("broken/only.jpg", &[0xFF]);
        write("notes/readme.txt", b"no images here");
        write("stray.jpg", &[2]);

        let engine = SimilarityEngine::open(IndexStore::new(temp.path().join("data"), DIM))?;
        let report = build_from_directory(&engine, &ByteEmbedder, &root)?;

        assert_eq!(report.places, 3);
        assert_eq!(report.added, 2);
        assert_eq!(report.skipped_empty, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken/only.jpg"));

        // First file by name is the reference
        assert_eq!(engine.reference_vector("Eiffel_Tower"), Some(vec![1.0, 0.0, 0.0, 0.0]));
        // Underscores are not word separators
        assert!(engine.reference_vector("Taj_mahal").is_some());
        assert!(engine.reference_vector("Taj_Mahal").is_none());

        // Rebuilding adds nothing
        let again = build_from_directory(&engine, &ByteEmbedder, &root)?;
        assert_eq!(again.added, 0);
        assert_eq!(again.already_present, 2);
        assert_eq!(engine.len(), 2);
        Ok(())
    }

    #[test]
    fn test_build_from_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let engine = SimilarityEngine::open(IndexStore::new(temp.path(), DIM)).unwrap();
        let result = build_from_directory(&engine, &ByteEmbedder, &temp.path().join("nope"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
