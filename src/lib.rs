#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Cutout Studio
//!
//! Turns a product photo into a presentation-ready cutout: the foreground is
//! segmented, its mask cleaned up, the object centred on a square canvas and
//! given a soft ground shadow that suits how it rests.
//!
//! ## Pipeline
//!
//! 1. **Decode** the input and cap its longest side
//! 2. **Segment** the foreground with any [`Segmenter`]
//! 3. **Refine** the raw mask (morphological cleanup or alpha feathering)
//! 4. **Classify** the object as standing or lying
//! 5. **Compose** it onto a transparent or white square canvas
//! 6. **Shadow**: a drop shadow on transparent canvases, a darkened ground
//!    silhouette on white ones
//! 7. **Encode** as PNG (transparent) or JPEG (white)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout_studio::{
//!     CutoutProcessor, PrecomputedMaskSegmenter, ProcessingOptions, ProcessorConfig,
//! };
//!
//! # fn example(photo: &[u8], mask: image::GrayImage) -> cutout_studio::Result<()> {
//! let processor = CutoutProcessor::new(
//!     ProcessorConfig::default(),
//!     Box::new(PrecomputedMaskSegmenter::new(mask)),
//! );
//! let options = ProcessingOptions::from_json(r#"{"background":"white","shadow":{"blur":24}}"#)?;
//! let result = processor.process_bytes(photo, &options, Some("chair.jpg"))?;
//! std::fs::write(&result.output_name, &result.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust ONNX segmentation backend
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `tracing-json`, `tracing-files`: extra log outputs for the CLI
//! - `webp-support`: WebP input decoding

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod orientation;
pub mod processor;
pub mod refine;
pub mod segmentation;
pub mod services;
pub mod shadow;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use compositor::{Composed, Compositor};
pub use config::{BackgroundMode, ProcessingOptions, ShadowOptions};
pub use error::{CutoutError, ErrorKind, ErrorReport, Result};
pub use orientation::{OrientationClassifier, OrientationResult};
pub use processor::{CutoutProcessor, PipelineStage, ProcessorConfig, ProcessorConfigBuilder};
pub use refine::{MaskRefiner, RefinePolicy};
pub use segmentation::{SegmentationOutput, Segmenter};
pub use services::{ImageIOService, OutputFormat, OutputFormatHandler};
pub use shadow::{
    ShadowOutcome, ShadowParams, ShadowPolicy, ShadowPolicyKind, ShadowStatus, ShadowSynthesizer,
};
pub use types::{
    BoundingBox, Canvas, Composition, CutoutResult, CutoutSummary, OrientationLabel,
    PlacementRect, PlacementSummary, ProcessingMetadata, ProcessingTimings,
};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, spans, TracingConfig, TracingFormat, TracingOutput};

/// Process one encoded image with options given as JSON
///
/// Convenience for one-shot use; long-running callers should build a
/// [`CutoutProcessor`] once and reuse it. An empty `options_json` means
/// all defaults.
///
/// # Examples
///
/// ```rust,no_run
/// use cutout_studio::{process_image_bytes, AlphaChannelSegmenter};
///
/// # fn example(cutout_png: &[u8]) -> cutout_studio::Result<()> {
/// let result = process_image_bytes(
///     cutout_png,
///     r#"{"shadow":{"enabled":true,"offset":{"x":12,"y":18}}}"#,
///     Box::new(AlphaChannelSegmenter::new()),
///     Some("lamp.png"),
/// )?;
/// assert_eq!(result.output_name, "lamp_bg_shadow.png");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns `CutoutError::InvalidOption` for malformed or out-of-range
/// options, otherwise the same errors as [`CutoutProcessor::process_bytes`].
pub fn process_image_bytes(
    bytes: &[u8],
    options_json: &str,
    segmenter: Box<dyn Segmenter>,
    original_name: Option<&str>,
) -> Result<CutoutResult> {
    let options = ProcessingOptions::from_json(options_json)?;
    let processor = CutoutProcessor::new(ProcessorConfig::default(), segmenter);
    processor.process_bytes(bytes, &options, original_name)
}
