//! Segmenter for inputs that already carry a cutout alpha channel

use crate::{
    error::{CutoutError, Result},
    segmentation::{SegmentationOutput, Segmenter},
};
use image::DynamicImage;

/// Uses the input image's own alpha channel as the foreground mask
///
/// Meant for PNGs that were cut out upstream. The alpha is treated as a
/// clean matte, so the processor only feathers it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaChannelSegmenter;

impl AlphaChannelSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Segmenter for AlphaChannelSegmenter {
    fn name(&self) -> &str {
        "alpha-channel"
    }

    fn segment(&self, image: &DynamicImage) -> Result<SegmentationOutput> {
        if !image.color().has_alpha() {
            return Err(CutoutError::segmentation(format!(
                "Input has no alpha channel ({:?}); an already cut-out image is required",
                image.color()
            )));
        }

        Ok(SegmentationOutput::Cutout(image.to_rgba8()))
    }
}
