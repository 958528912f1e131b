//! Segmenter that hands back a mask computed ahead of time

use crate::{
    error::Result,
    segmentation::{SegmentationOutput, Segmenter},
};
use image::{DynamicImage, GrayImage};

/// Returns a caller-supplied mask for every request
///
/// Useful when masks come from an external tool or a previous run. The mask
/// is returned as-is, so it must match the dimensions of the image it is
/// paired with; the processor rejects any mismatch.
#[derive(Debug, Clone)]
pub struct PrecomputedMaskSegmenter {
    mask: GrayImage,
}

impl PrecomputedMaskSegmenter {
    #[must_use]
    pub fn new(mask: GrayImage) -> Self {
        Self { mask }
    }

    /// Build from any decoded image, converting it to 8-bit luma
    #[must_use]
    pub fn from_image(image: &DynamicImage) -> Self {
        Self::new(image.to_luma8())
    }

    #[must_use]
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }
}

impl Segmenter for PrecomputedMaskSegmenter {
    fn name(&self) -> &str {
        "precomputed-mask"
    }

    fn segment(&self, _image: &DynamicImage) -> Result<SegmentationOutput> {
        log::debug!(
            "Using precomputed mask {}x{}",
            self.mask.width(),
            self.mask.height()
        );
        Ok(SegmentationOutput::Mask(self.mask.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refine::RefinePolicy;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_returns_supplied_mask() {
        let mask = GrayImage::from_fn(8, 6, |x, _| Luma([if x < 4 { 255 } else { 0 }]));
        let segmenter = PrecomputedMaskSegmenter::new(mask.clone());
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 6));

        let output = segmenter.segment(&image).unwrap();
        assert_eq!(output.refine_policy(), RefinePolicy::Morphological);
        assert_eq!(output.into_mask(), mask);
    }

    #[test]
    fn test_from_image_converts_to_luma() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([255, 255, 255])));
        let segmenter = PrecomputedMaskSegmenter::from_image(&source);
        assert_eq!(segmenter.mask().dimensions(), (3, 2));
        assert!(segmenter.mask().pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_does_not_resize_to_input() {
        let segmenter = PrecomputedMaskSegmenter::new(GrayImage::new(4, 4));
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let output = segmenter.segment(&image).unwrap();
        assert_eq!(output.dimensions(), (4, 4));
    }
}
