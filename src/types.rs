//! Core types shared by the pipeline stages

use crate::{
    config::BackgroundMode,
    orientation::OrientationResult,
    services::OutputFormat,
    shadow::ShadowOutcome,
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Inferred pose of the object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrientationLabel {
    Standing,
    Lying,
}

impl std::fmt::Display for OrientationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standing => write!(f, "standing"),
            Self::Lying => write!(f, "lying"),
        }
    }
}

/// Bounding box of mask pixels; `right` and `bottom` are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    /// Tight box around pixels whose value is strictly above `threshold`
    ///
    /// Returns `None` when no pixel qualifies.
    #[must_use]
    pub fn of_mask(mask: &GrayImage, threshold: u8) -> Option<Self> {
        let mut bbox: Option<Self> = None;

        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel[0] <= threshold {
                continue;
            }
            match bbox.as_mut() {
                Some(b) => {
                    b.left = b.left.min(x);
                    b.top = b.top.min(y);
                    b.right = b.right.max(x + 1);
                    b.bottom = b.bottom.max(y + 1);
                },
                None => {
                    bbox = Some(Self {
                        left: x,
                        top: y,
                        right: x + 1,
                        bottom: y + 1,
                    });
                },
            }
        }

        bbox
    }

    /// Bounding box of all non-zero pixels
    #[must_use]
    pub fn of_nonzero(mask: &GrayImage) -> Option<Self> {
        Self::of_mask(mask, 0)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Where the scaled object sits on the canvas, with its scaled mask
#[derive(Debug, Clone)]
pub struct PlacementRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Uniform scale applied to the cropped object
    pub scale: f32,
    /// Scaled mask crop, `width` x `height`
    pub mask: GrayImage,
}

impl PlacementRect {
    #[must_use]
    pub fn summary(&self) -> PlacementSummary {
        PlacementSummary {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            scale: self.scale,
        }
    }

    /// Whether the rect lies fully inside a square canvas of `side`
    #[must_use]
    pub fn fits_within(&self, side: u32) -> bool {
        self.x + self.width <= side && self.y + self.height <= side
    }
}

/// Serializable view of a [`PlacementRect`] without pixel data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementSummary {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

/// Square output buffer
///
/// Always stored as RGBA. Under [`BackgroundMode::White`] every pixel stays
/// opaque and the alpha channel is dropped when the canvas is finalized.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub image: RgbaImage,
    pub background: BackgroundMode,
}

impl Canvas {
    /// Blank canvas filled according to the background mode
    #[must_use]
    pub fn blank(side: u32, background: BackgroundMode) -> Self {
        let fill = match background {
            BackgroundMode::Transparent => Rgba([0, 0, 0, 0]),
            BackgroundMode::White => Rgba([255, 255, 255, 255]),
        };
        Self {
            image: RgbaImage::from_pixel(side, side, fill),
            background,
        }
    }

    #[must_use]
    pub fn side(&self) -> u32 {
        self.image.width()
    }

    /// Finalize: RGBA for transparent canvases, RGB for white ones
    #[must_use]
    pub fn into_dynamic(self) -> DynamicImage {
        match self.background {
            BackgroundMode::Transparent => DynamicImage::ImageRgba8(self.image),
            BackgroundMode::White => {
                DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(self.image).to_rgb8())
            },
        }
    }
}

/// Wall-clock time spent in each pipeline stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub decode_ms: u64,
    pub segment_ms: u64,
    pub refine_ms: u64,
    pub classify_ms: u64,
    pub compose_ms: u64,
    pub shadow_ms: u64,
    pub encode_ms: u64,
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Sum of the measured stages
    #[must_use]
    pub fn measured_ms(&self) -> u64 {
        self.decode_ms
            + self.segment_ms
            + self.refine_ms
            + self.classify_ms
            + self.compose_ms
            + self.shadow_ms
            + self.encode_ms
    }

    /// Time spent outside the measured stages
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        self.total_ms.saturating_sub(self.measured_ms())
    }

    /// One-line human readable breakdown
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Decode: {}ms | Segment: {}ms | Refine: {}ms | Classify: {}ms | Compose: {}ms | Shadow: {}ms | Encode: {}ms",
            self.total_ms,
            self.decode_ms,
            self.segment_ms,
            self.refine_ms,
            self.classify_ms,
            self.compose_ms,
            self.shadow_ms,
            self.encode_ms
        )
    }
}

/// Metadata about one processed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub timings: ProcessingTimings,
    /// Name of the segmentation backend
    pub segmenter: String,
    /// Dimensions of the decoded input
    pub input_dimensions: (u32, u32),
    /// Dimensions after the ingestion cap
    pub ingested_dimensions: (u32, u32),
    pub canvas_size: u32,
    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(segmenter: String) -> Self {
        Self {
            timings: ProcessingTimings::default(),
            segmenter,
            input_dimensions: (0, 0),
            ingested_dimensions: (0, 0),
            canvas_size: 0,
            processed_at: Utc::now(),
        }
    }
}

/// Finalized, not yet encoded, output of the image-space pipeline
#[derive(Debug, Clone)]
pub struct Composition {
    /// RGBA for transparent backgrounds, RGB for white ones
    pub image: DynamicImage,
    pub background: BackgroundMode,
    pub orientation: OrientationResult,
    pub placement: Option<PlacementSummary>,
    pub shadow: ShadowOutcome,
    pub timings: ProcessingTimings,
}

/// Encoded output of one request
#[derive(Debug, Clone)]
pub struct CutoutResult {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    /// Derived name, e.g. `chair_bg_shadow.png`
    pub output_name: String,
    pub orientation: OrientationResult,
    pub placement: Option<PlacementSummary>,
    pub shadow: ShadowOutcome,
    pub metadata: ProcessingMetadata,
}

impl CutoutResult {
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Serializable summary without the image bytes
    #[must_use]
    pub fn summary(&self) -> CutoutSummary {
        CutoutSummary {
            output_name: self.output_name.clone(),
            mime_type: self.mime_type(),
            size_bytes: self.bytes.len(),
            orientation: self.orientation.clone(),
            placement: self.placement,
            shadow: self.shadow.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// JSON-friendly summary of a [`CutoutResult`]
#[derive(Debug, Clone, Serialize)]
pub struct CutoutSummary {
    pub output_name: String,
    pub mime_type: &'static str,
    pub size_bytes: usize,
    pub orientation: OrientationResult,
    pub placement: Option<PlacementSummary>,
    pub shadow: ShadowOutcome,
    pub metadata: ProcessingMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_bounding_box_of_empty_mask() {
        let mask = GrayImage::new(8, 8);
        assert_eq!(BoundingBox::of_nonzero(&mask), None);
    }

    #[test]
    fn test_bounding_box_is_exclusive_on_far_edges() {
        let mut mask = GrayImage::new(10, 10);
        mask.put_pixel(2, 3, Luma([1]));
        mask.put_pixel(6, 8, Luma([255]));

        let bbox = BoundingBox::of_nonzero(&mask).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                left: 2,
                top: 3,
                right: 7,
                bottom: 9
            }
        );
        assert_eq!(bbox.width(), 5);
        assert_eq!(bbox.height(), 6);
    }

    #[test]
    fn test_bounding_box_threshold() {
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, Luma([10]));
        mask.put_pixel(3, 3, Luma([11]));

        let bbox = BoundingBox::of_mask(&mask, 10).unwrap();
        assert_eq!((bbox.left, bbox.top, bbox.right, bbox.bottom), (3, 3, 4, 4));
    }

    #[test]
    fn test_blank_canvas_fill() {
        let canvas = Canvas::blank(4, BackgroundMode::White);
        assert!(canvas.image.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
        assert!(matches!(canvas.into_dynamic(), DynamicImage::ImageRgb8(_)));

        let canvas = Canvas::blank(4, BackgroundMode::Transparent);
        assert!(canvas.image.pixels().all(|p| p[3] == 0));
        assert!(matches!(canvas.into_dynamic(), DynamicImage::ImageRgba8(_)));
    }

    #[test]
    fn test_timings_overhead() {
        let timings = ProcessingTimings {
            decode_ms: 5,
            segment_ms: 40,
            encode_ms: 5,
            total_ms: 60,
            ..ProcessingTimings::default()
        };
        assert_eq!(timings.measured_ms(), 50);
        assert_eq!(timings.other_overhead_ms(), 10);
        assert!(timings.summary().starts_with("Total: 60ms"));
    }
}
