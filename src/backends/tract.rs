//! Tract backend for salient-object segmentation models
//!
//! Runs single-output ONNX models (`ISNet` / `U2-Net` style) with Tract, a
//! pure Rust inference library with no external dependencies. The model sees
//! a letterboxed square tensor; its output is mapped back onto the exact
//! dimensions of the input image.

use crate::{
    error::{CutoutError, Result},
    segmentation::{SegmentationOutput, Segmenter},
    utils::{
        filters::round_to_u8,
        preprocessing::{ImagePreprocessor, LetterboxTransform, NormalizationConfig},
    },
};
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use ndarray::Array2;
use std::path::Path;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::Instant;

/// Default square input side for salient-object models
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 1024;

/// Tract segmenter holding one optimized, runnable model
///
/// The plan is immutable once built, so a single instance serves concurrent
/// requests through `&self`.
#[derive(Debug)]
pub struct TractSegmenter {
    model: TractModel,
    input_size: u32,
    normalization: NormalizationConfig,
    label: String,
}

impl TractSegmenter {
    /// Load an ONNX model from disk
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Io` when the file cannot be read and
    /// `CutoutError::Model` when Tract cannot load or optimize it.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        input_size: u32,
        normalization: NormalizationConfig,
    ) -> Result<Self> {
        let path_ref = path.as_ref();
        let model_data = std::fs::read(path_ref)?;
        let label = path_ref
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map_or_else(|| "tract".to_string(), |stem| format!("tract:{stem}"));

        let mut segmenter = Self::from_bytes(&model_data, input_size, normalization)?;
        segmenter.label = label;
        Ok(segmenter)
    }

    /// Load an ONNX model from memory
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Model` when the input size is zero or Tract
    /// cannot load or optimize the model.
    pub fn from_bytes(
        model_data: &[u8],
        input_size: u32,
        normalization: NormalizationConfig,
    ) -> Result<Self> {
        if input_size == 0 {
            return Err(CutoutError::model("Model input size must be positive"));
        }

        let load_start = Instant::now();

        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_data.len() as f64 / (1024.0 * 1024.0);
        log::info!("Initializing Tract segmenter");
        log::info!("  - Model size: {size_mb:.2} MB");
        log::info!("  - Input: 1x3x{input_size}x{input_size}");

        let side = input_size as usize;
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| CutoutError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| CutoutError::model(format!("Failed to set model input shape: {e}")))?
            .into_optimized()
            .map_err(|e| CutoutError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| CutoutError::model(format!("Failed to create runnable model: {e}")))?;

        log::info!(
            "Tract segmenter initialized in {}ms",
            load_start.elapsed().as_millis()
        );

        Ok(Self {
            model,
            input_size,
            normalization,
            label: "tract".to_string(),
        })
    }

    #[must_use]
    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Run the model and return its first output plane as `[height, width]`
    fn infer(&self, image: &DynamicImage) -> Result<(Array2<f32>, LetterboxTransform)> {
        let (input, transform) =
            ImagePreprocessor::letterbox_to_tensor(image, self.input_size, &self.normalization)?;

        log::debug!("Running Tract inference");
        log::debug!("  - Input tensor: {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input);
        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| CutoutError::segmentation(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| CutoutError::segmentation("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            CutoutError::segmentation(format!("Failed to convert output tensor: {e}"))
        })?;

        let shape = output_data.shape();
        let rank = shape.len();
        if rank < 2 {
            return Err(CutoutError::segmentation(format!(
                "Expected at least 2D output tensor, got {rank}D"
            )));
        }
        let (height, width) = (
            shape.get(rank - 2).copied().unwrap_or(0),
            shape.get(rank - 1).copied().unwrap_or(0),
        );
        let side = self.input_size as usize;
        if (height, width) != (side, side) {
            return Err(CutoutError::segmentation(format!(
                "Model output {width}x{height} does not match input size {side}x{side}"
            )));
        }

        // Leading axes are batch/channel; the first plane is the foreground.
        let plane: Vec<f32> = output_data.iter().take(height * width).copied().collect();
        let plane = Array2::from_shape_vec((height, width), plane).map_err(|e| {
            CutoutError::segmentation(format!("Failed to reshape output tensor: {e}"))
        })?;

        log::debug!(
            "Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            shape
        );

        Ok((plane, transform))
    }
}

impl Segmenter for TractSegmenter {
    fn name(&self) -> &str {
        &self.label
    }

    fn segment(&self, image: &DynamicImage) -> Result<SegmentationOutput> {
        let (mut plane, transform) = self.infer(image)?;
        normalize_probabilities(&mut plane);

        let (width, height) = image.dimensions();
        let mask = probabilities_to_mask(&plane, &transform, width, height);
        Ok(SegmentationOutput::Mask(mask))
    }
}

/// Bring raw model output into [0, 1]
///
/// Values outside [0, 1] are treated as logits and squashed with a sigmoid;
/// the result is then min-max stretched.
fn normalize_probabilities(values: &mut Array2<f32>) {
    if looks_like_logits(values) {
        values.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));
    }

    let (min_v, max_v) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max_v - min_v;
    if range > f32::EPSILON {
        values.mapv_inplace(|v| (v - min_v) / range);
    } else {
        values.mapv_inplace(|v| v.clamp(0.0, 1.0));
    }
}

fn looks_like_logits(values: &Array2<f32>) -> bool {
    values.iter().any(|&v| !(-0.01..=1.01).contains(&v))
}

/// Sample the model-space probabilities back onto a `width` x `height` mask
fn probabilities_to_mask(
    plane: &Array2<f32>,
    transform: &LetterboxTransform,
    width: u32,
    height: u32,
) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let value = transform
            .to_model_space(x, y)
            .and_then(|(mx, my)| plane.get((my, mx)).copied())
            .unwrap_or(0.0);
        Luma([round_to_u8(value * 255.0)])
    })
}
