pub mod add;
pub mod build;
pub mod evaluate;
pub mod recognize;
pub mod search;
pub mod status;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Read an image file given on the command line
fn read_image(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))
}
