//! ONNX Runtime embedder for the CLIP ViT-B/32 vision tower

use super::{l2_normalize, preprocess, ImageEmbedder};
use crate::error::{Error, Result};
use crate::paths;
use ort::{inputs, session::Session, value::Value};
use parking_lot::Mutex;
use std::path::Path;

/// Sole input of the vision tower
const PIXEL_VALUES: &str = "pixel_values";

/// Output of `CLIPVisionModelWithProjection` exports
const IMAGE_EMBEDS: &str = "image_embeds";

/// Vision-only export; full `CLIPModel` exports also need text inputs
const EXPORT_HINT: &str = "Export the vision tower with:\n  \
    python -c \"import torch; from transformers import CLIPVisionModelWithProjection as M; \
    m = M.from_pretrained('openai/clip-vit-base-patch32').eval(); \
    torch.onnx.export(m, torch.zeros(1, 3, 224, 224), 'model.onnx', \
    input_names=['pixel_values'], output_names=['image_embeds'], \
    dynamic_axes={'pixel_values': {0: 'batch'}}, opset_version=17)\"";

/// ONNX-based image embedding generator
///
/// The session needs exclusive access per run; concurrent callers queue on the mutex.
pub struct ClipEmbedder {
    session: Mutex<Session>,
    dimension: usize,
    model_name: String,
}

impl ClipEmbedder {
    /// Load from a model directory, preferring `model_quantized.onnx` when present
    pub fn from_dir(model_dir: &Path, model_name: &str, dimension: usize) -> Result<Self> {
        let quantized = paths::models::model_onnx_quantized(model_dir);
        let model_path = if quantized.exists() {
            quantized
        } else {
            paths::models::model_onnx(model_dir)
        };
        Self::new_from_path(&model_path, model_name, dimension)
    }

    /// Create a new ONNX embedder from a model file
    ///
    /// # Arguments
    /// * `model_path` - Path to the exported vision model (input `pixel_values`, output `image_embeds`)
    /// * `model_name` - Human-readable model name (e.g., "clip-vit-base-patch32")
    /// * `dimension` - Embedding dimension (512 for ViT-B/32)
    pub fn new_from_path(model_path: &Path, model_name: &str, dimension: usize) -> Result<Self> {
        if !model_path.exists() {
            return Err(Error::EmbeddingFailure(format!(
                "ONNX model not found at: {}\n\n{EXPORT_HINT}\n  (run it inside {})",
                model_path.display(),
                model_path.parent().unwrap_or(model_path).display()
            )));
        }

        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|e| Error::EmbeddingFailure(format!("Failed to load ONNX model: {e}")))?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        let output_names: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        check_signature(&input_names, &output_names)?;

        Ok(Self {
            session: Mutex::new(session),
            dimension,
            model_name: model_name.to_string(),
        })
    }
}

/// Accept only models fed by `pixel_values` alone that produce `image_embeds`
fn check_signature(inputs: &[&str], outputs: &[&str]) -> Result<()> {
    if inputs != [PIXEL_VALUES].as_slice() || !outputs.contains(&IMAGE_EMBEDS) {
        return Err(Error::EmbeddingFailure(format!(
            "Expected a vision-only CLIP model (inputs [{PIXEL_VALUES}], output {IMAGE_EMBEDS}), \
            got inputs {inputs:?} and outputs {outputs:?}\n\n{EXPORT_HINT}"
        )));
    }
    Ok(())
}

impl ImageEmbedder for ClipEmbedder {
    fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
        let pixels = preprocess(image)?;
        let input = Value::from_array(pixels)
            .map_err(|e| Error::EmbeddingFailure(format!("Failed to build input tensor: {e}")))?;

        // Run inference and copy the data out before the session lock drops
        let mut embedding = {
            let mut session = self.session.lock();
            let outputs = session
                .run(inputs![PIXEL_VALUES => input])
                .map_err(|e| Error::EmbeddingFailure(format!("ONNX inference failed: {e}")))?;

            let output = outputs.get(IMAGE_EMBEDS).ok_or_else(|| {
                Error::EmbeddingFailure(format!("model has no '{IMAGE_EMBEDS}' output"))
            })?;
            let (shape, data) = output.try_extract_tensor::<f32>().map_err(|e| {
                Error::EmbeddingFailure(format!("Failed to extract {IMAGE_EMBEDS} tensor: {e}"))
            })?;

            // Shape is [batch_size=1, dimension]
            let shape_dims = shape.as_ref();
            if shape_dims.len() != 2 || shape_dims[1] as usize != self.dimension {
                return Err(Error::EmbeddingFailure(format!(
                    "Expected [1, {}] embedding, got shape: {:?}",
                    self.dimension, shape_dims
                )));
            }
            data[..self.dimension].to_vec()
        };

        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
