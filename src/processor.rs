//! Unified cutout processor
//!
//! This module provides the `CutoutProcessor` that runs the full pipeline
//! for one request: decode, ingestion cap, segmentation, mask refinement,
//! orientation classification, compositing, shadow synthesis and encoding.
//! The processor is read-only after construction so one instance can serve
//! concurrent requests.

use crate::{
    compositor::Compositor,
    config::ProcessingOptions,
    error::{CutoutError, Result},
    orientation::{OrientationClassifier, OrientationResult},
    refine::MaskRefiner,
    segmentation::Segmenter,
    services::{ImageIOService, OutputFormatHandler, DEFAULT_JPEG_QUALITY},
    shadow::{ShadowOutcome, ShadowStatus, ShadowSynthesizer},
    types::{Canvas, Composition, CutoutResult, ProcessingMetadata, ProcessingTimings},
    utils::ImagePreprocessor,
};
use image::{DynamicImage, GenericImageView};
use instant::Instant;
use log::{debug, info};
use tracing::{info as trace_info, span, Level};

/// Smallest accepted ingestion cap
const MIN_INPUT_SIDE: u32 = 16;

/// Pipeline stages, used to name spans and attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Decode,
    Segment,
    Refine,
    Classify,
    Compose,
    Shadow,
    Encode,
}

impl PipelineStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Segment => "segment",
            Self::Refine => "refine",
            Self::Classify => "classify",
            Self::Compose => "compose",
            Self::Shadow => "shadow",
            Self::Encode => "encode",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-processor configuration, shared read-only across requests
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Longest side allowed after decoding; larger inputs are downscaled once
    pub max_input_side: u32,
    /// JPEG quality (0-100) for white-background output
    pub jpeg_quality: u8,
    /// Suffix appended to derived output names
    pub output_suffix: String,
    /// Lift and sharpen the segmenter input
    pub enhance_for_segmentation: bool,
    /// Enable debug mode
    pub debug: bool,
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_input_side: 1600,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            output_suffix: "bg_shadow".to_string(),
            enhance_for_segmentation: true,
            debug: false,
        }
    }
}

/// Builder for `ProcessorConfig`
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    #[must_use]
    pub fn max_input_side(mut self, side: u32) -> Self {
        self.config.max_input_side = side;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(0, 100);
        self
    }

    #[must_use]
    pub fn output_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn enhance_for_segmentation(mut self, enhance: bool) -> Self {
        self.config.enhance_for_segmentation = enhance;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::InvalidOption` for:
    /// - An ingestion cap below 16 pixels
    /// - An empty output suffix
    pub fn build(self) -> Result<ProcessorConfig> {
        if self.config.max_input_side < MIN_INPUT_SIDE {
            return Err(CutoutError::option_value_error(
                "max_input_side",
                self.config.max_input_side,
                "at least 16",
            ));
        }
        if self.config.output_suffix.trim().is_empty() {
            return Err(CutoutError::invalid_option("Output suffix must not be empty"));
        }

        Ok(self.config)
    }
}

impl Default for ProcessorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the cutout pipeline with an injected segmentation capability
pub struct CutoutProcessor {
    config: ProcessorConfig,
    segmenter: Box<dyn Segmenter>,
    refiner: MaskRefiner,
    classifier: OrientationClassifier,
    compositor: Compositor,
    shadows: ShadowSynthesizer,
}

impl CutoutProcessor {
    /// Create a processor around a segmenter
    #[must_use]
    pub fn new(config: ProcessorConfig, segmenter: Box<dyn Segmenter>) -> Self {
        info!(
            "Creating cutout processor (segmenter: {}, max input side: {})",
            segmenter.name(),
            config.max_input_side
        );
        Self {
            config,
            segmenter,
            refiner: MaskRefiner::new(),
            classifier: OrientationClassifier::new(),
            compositor: Compositor::new(),
            shadows: ShadowSynthesizer::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    #[must_use]
    pub fn segmenter_name(&self) -> &str {
        self.segmenter.name()
    }

    /// Process encoded image bytes into an encoded cutout
    ///
    /// `original_name` only feeds the derived output name.
    ///
    /// # Errors
    ///
    /// Returns `CutoutError` for:
    /// - Invalid options (checked before any pipeline work)
    /// - Undecodable input
    /// - Segmentation failures and segmenter dimension mismatches
    /// - Encoder failures
    pub fn process_bytes(
        &self,
        bytes: &[u8],
        options: &ProcessingOptions,
        original_name: Option<&str>,
    ) -> Result<CutoutResult> {
        options.validate()?;

        let total_start = Instant::now();
        let mut metadata = ProcessingMetadata::new(self.segmenter.name().to_string());

        trace_info!(
            segmenter = %self.segmenter.name(),
            input_bytes = bytes.len(),
            background = %options.background,
            canvas = options.canvas_size,
            "Starting cutout processing"
        );

        let (image, decode_ms) = {
            let _span = span!(Level::DEBUG, "decode", bytes = bytes.len()).entered();
            let start = Instant::now();
            let decoded = ImageIOService::decode(bytes)
                .map_err(|e| stage_failed(PipelineStage::Decode, e))?;
            metadata.input_dimensions = decoded.dimensions();

            let capped = ImagePreprocessor::cap_longest_side(&decoded, self.config.max_input_side);
            metadata.ingested_dimensions = capped.dimensions();
            (capped, elapsed_ms(start))
        };

        if metadata.input_dimensions != metadata.ingested_dimensions {
            debug!(
                "Ingestion cap applied: {}x{} -> {}x{}",
                metadata.input_dimensions.0,
                metadata.input_dimensions.1,
                metadata.ingested_dimensions.0,
                metadata.ingested_dimensions.1
            );
        }

        let composition = self.compose_image(&image, options)?;

        let format = OutputFormatHandler::format_for(composition.background);
        let (bytes, encode_ms) = {
            let _span = span!(Level::DEBUG, "encode", format = %format).entered();
            let start = Instant::now();
            let encoded =
                OutputFormatHandler::encode(&composition.image, format, self.config.jpeg_quality)
                    .map_err(|e| stage_failed(PipelineStage::Encode, e))?;
            (encoded, elapsed_ms(start))
        };

        let mut timings = composition.timings;
        timings.decode_ms = decode_ms;
        timings.encode_ms = encode_ms;
        timings.total_ms = elapsed_ms(total_start);

        metadata.timings = timings;
        metadata.canvas_size = options.canvas_size;

        let output_name =
            OutputFormatHandler::output_name(original_name, &self.config.output_suffix, format);

        trace_info!(
            output = %output_name,
            orientation = %composition.orientation.label,
            shadow = ?composition.shadow.status,
            bytes = bytes.len(),
            total_ms = metadata.timings.total_ms,
            "Cutout complete"
        );
        if self.config.debug {
            debug!("{}", metadata.timings.summary());
        }

        Ok(CutoutResult {
            bytes,
            format,
            output_name,
            orientation: composition.orientation,
            placement: composition.placement,
            shadow: composition.shadow,
            metadata,
        })
    }

    /// Run the image-space pipeline on a decoded image
    ///
    /// Segmentation output must match the image dimensions exactly. An empty
    /// foreground is not an error here: the result is a blank canvas with
    /// `no_foreground` set.
    ///
    /// # Errors
    ///
    /// Returns `CutoutError` for:
    /// - Invalid options
    /// - Segmentation failures
    /// - Segmenter output whose dimensions differ from the image
    pub fn compose_image(
        &self,
        image: &DynamicImage,
        options: &ProcessingOptions,
    ) -> Result<Composition> {
        options.validate()?;

        let mut timings = ProcessingTimings::default();
        let dimensions = image.dimensions();
        let side = options.canvas_size;
        let background = options.background;

        let segmented = {
            let _span = span!(
                Level::INFO,
                "segment",
                segmenter = %self.segmenter.name(),
                width = dimensions.0,
                height = dimensions.1
            )
            .entered();
            let start = Instant::now();

            // Inputs that carry alpha go to the segmenter untouched
            let enhance = self.config.enhance_for_segmentation && !image.color().has_alpha();
            let output = if enhance {
                let enhanced = ImagePreprocessor::enhance_for_segmentation(image);
                self.segmenter.segment(&enhanced)
            } else {
                self.segmenter.segment(image)
            }
            .map_err(|e| stage_failed(PipelineStage::Segment, e))?;

            timings.segment_ms = elapsed_ms(start);
            output
        };

        if segmented.dimensions() != dimensions {
            return Err(stage_failed(
                PipelineStage::Segment,
                CutoutError::DimensionMismatch {
                    image: dimensions,
                    mask: segmented.dimensions(),
                },
            ));
        }

        let policy = segmented.refine_policy();
        let refined = {
            let _span = span!(Level::DEBUG, "refine", policy = ?policy).entered();
            let start = Instant::now();
            let refined = self.refiner.refine(&segmented.into_mask(), policy);
            timings.refine_ms = elapsed_ms(start);
            refined
        };

        let mask = match refined {
            Ok(mask) => mask,
            Err(CutoutError::EmptyForeground) => {
                tracing::warn!("No foreground found, returning blank canvas");
                return Ok(Composition {
                    image: Canvas::blank(side, background).into_dynamic(),
                    background,
                    orientation: OrientationResult::no_foreground()
                        .with_override(options.orientation_override()),
                    placement: None,
                    shadow: ShadowOutcome::not_applied(ShadowStatus::NoPlacement),
                    timings,
                });
            },
            Err(e) => return Err(stage_failed(PipelineStage::Refine, e)),
        };

        let orientation = {
            let _span = span!(Level::DEBUG, "classify").entered();
            let start = Instant::now();
            let result = self.classifier.classify(&mask, options.orientation_override());
            timings.classify_ms = elapsed_ms(start);
            result
        };

        tracing::debug!(
            label = %orientation.label,
            detected = %orientation.detected,
            overridden = orientation.overridden,
            aspect = orientation.aspect,
            contact_ratio = orientation.contact_ratio,
            "Orientation classified"
        );

        let mut composed = {
            let _span = span!(Level::DEBUG, "compose", canvas = side, background = %background)
                .entered();
            let start = Instant::now();
            let composed = self
                .compositor
                .compose(image, &mask, side, background)
                .map_err(|e| stage_failed(PipelineStage::Compose, e))?;
            timings.compose_ms = elapsed_ms(start);
            composed
        };

        let shadow = {
            let _span = span!(Level::DEBUG, "shadow").entered();
            let start = Instant::now();
            let outcome = self.shadows.synthesize(
                &mut composed.canvas,
                composed.placement.as_ref(),
                &options.shadow,
                orientation.label,
            );
            timings.shadow_ms = elapsed_ms(start);
            outcome
        };

        Ok(Composition {
            image: composed.canvas.into_dynamic(),
            background,
            orientation,
            placement: composed.placement.as_ref().map(crate::types::PlacementRect::summary),
            shadow,
            timings,
        })
    }

    /// Read an async stream to the end and process it
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Io` when the stream fails, otherwise the same
    /// errors as [`CutoutProcessor::process_bytes`].
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &self,
        reader: R,
        options: &ProcessingOptions,
        original_name: Option<&str>,
    ) -> Result<CutoutResult> {
        let bytes = ImageIOService::read_from_reader(reader).await?;
        self.process_bytes(&bytes, options, original_name)
    }
}

fn stage_failed(stage: PipelineStage, error: CutoutError) -> CutoutError {
    tracing::debug!(stage = %stage, kind = error.kind().as_str(), "Pipeline stage failed: {}", error);
    error
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}
