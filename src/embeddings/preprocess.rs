//! CLIP image preprocessing
//!
//! Decode, resize the shortest side to 224 and center-crop, convert to RGB,
//! normalize with CLIP mean/std, lay out as an NCHW tensor.

use crate::error::{Error, Result};
use image::imageops::FilterType;
use ndarray::Array4;

/// CLIP image input size (224x224 pixels).
pub const CLIP_IMAGE_SIZE: u32 = 224;

/// CLIP RGB normalization mean values.
pub const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];

/// CLIP RGB normalization standard deviation values.
#[allow(clippy::excessive_precision)]
pub const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Preprocess encoded image bytes into a `[1, 3, 224, 224]` tensor
pub fn preprocess(bytes: &[u8]) -> Result<Array4<f32>> {
    if bytes.is_empty() {
        return Err(Error::EmbeddingFailure("empty image".to_string()));
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::EmbeddingFailure(format!("failed to decode image: {e}")))?;

    // Bicubic, matching CLIPProcessor
    let rgb = img
        .resize_to_fill(CLIP_IMAGE_SIZE, CLIP_IMAGE_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    let size = CLIP_IMAGE_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    Ok(tensor)
}
