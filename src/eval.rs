//! Accuracy evaluation against a labeled test set
//!
//! Each image under `root/<label>/` is classified by its top-1 search result,
//! with no threshold, so every prediction is some known place.

use crate::embeddings::ImageEmbedder;
use crate::engine::SimilarityEngine;
use crate::error::{Error, Result};
use crate::ingest::{image_files, label_dirs, normalize_place_name};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct LabelAccuracy {
    pub total: usize,
    pub correct: usize,
}

impl LabelAccuracy {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct EvalReport {
    /// Images that produced a prediction inside the label set
    pub total: usize,
    pub correct: usize,
    /// Keyed by normalized label
    pub per_label: BTreeMap<String, LabelAccuracy>,
    /// Unreadable images, embedding failures, empty index, or predictions outside the label set
    pub skipped: usize,
}

impl EvalReport {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Classify every image under `root/<label>/` and tally accuracy
pub fn evaluate(engine: &SimilarityEngine, embedder: &dyn ImageEmbedder, root: &Path) -> Result<EvalReport> {
    let labels = label_dirs(root)?;
    let known: BTreeSet<String> = labels.iter().map(|(label, _)| normalize_place_name(label)).collect();
    let mut report = EvalReport::default();

    for (label, dir) in &labels {
        let label = normalize_place_name(label);
        for path in image_files(dir) {
            let predicted = match predict(engine, embedder, &path) {
                Ok(Some(place)) if known.contains(&place) => place,
                Ok(other) => {
                    debug!(path = %path.display(), predicted = ?other, "Prediction outside the label set");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), "Failed to classify: {}", e);
                    report.skipped += 1;
                    continue;
                }
            };

            let hit = predicted == label;
            let tally = report.per_label.entry(label.clone()).or_default();
            tally.total += 1;
            report.total += 1;
            if hit {
                tally.correct += 1;
                report.correct += 1;
            }
        }
    }

    Ok(report)
}

fn predict(engine: &SimilarityEngine, embedder: &dyn ImageEmbedder, path: &Path) -> Result<Option<String>> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let embedding = embedder.embed(&bytes)?;
    Ok(engine
        .search(&embedding, 1)?
        .into_iter()
        .next()
        .map(|m| m.place_name))
}
