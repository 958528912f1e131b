//! Segmentation capability
//!
//! The pipeline treats foreground segmentation as an opaque collaborator. Any
//! type implementing [`Segmenter`] can be handed to the processor; concrete
//! implementations live in [`crate::backends`].

use crate::{error::Result, refine::RefinePolicy};
use image::{DynamicImage, GrayImage, RgbaImage};

/// What a segmenter produced for one image
#[derive(Debug, Clone)]
pub enum SegmentationOutput {
    /// Full RGBA cutout whose alpha channel holds the mask
    Cutout(RgbaImage),
    /// Standalone single-channel probability mask
    Mask(GrayImage),
}

impl SegmentationOutput {
    /// Pixel dimensions of the output
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Cutout(image) => image.dimensions(),
            Self::Mask(mask) => mask.dimensions(),
        }
    }

    /// Refinement policy matching the kind of output
    ///
    /// Cutouts already carry a clean alpha and only need feathering; raw masks
    /// go through the full morphological cleanup.
    #[must_use]
    pub fn refine_policy(&self) -> RefinePolicy {
        match self {
            Self::Cutout(_) => RefinePolicy::DirectAlpha,
            Self::Mask(_) => RefinePolicy::Morphological,
        }
    }

    /// The single-channel mask carried by this output
    #[must_use]
    pub fn into_mask(self) -> GrayImage {
        match self {
            Self::Cutout(image) => {
                let (width, height) = image.dimensions();
                GrayImage::from_fn(width, height, |x, y| image::Luma([image.get_pixel(x, y)[3]]))
            },
            Self::Mask(mask) => mask,
        }
    }
}

/// Foreground segmentation capability
///
/// Implementations must return output with exactly the same pixel dimensions
/// as the input. The processor rejects any mismatch rather than resizing.
/// Calls take `&self` so one loaded model can serve concurrent requests.
pub trait Segmenter: Send + Sync {
    /// Short backend name for logs and metadata
    fn name(&self) -> &str;

    /// Segment the foreground of `image`
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Segmentation` when the capability fails.
    fn segment(&self, image: &DynamicImage) -> Result<SegmentationOutput>;
}

impl<S: Segmenter + ?Sized> Segmenter for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn segment(&self, image: &DynamicImage) -> Result<SegmentationOutput> {
        (**self).segment(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    #[test]
    fn test_cutout_yields_alpha_and_direct_policy() {
        let mut cutout = RgbaImage::new(3, 2);
        cutout.put_pixel(1, 1, Rgba([9, 9, 9, 77]));
        let output = SegmentationOutput::Cutout(cutout);

        assert_eq!(output.dimensions(), (3, 2));
        assert_eq!(output.refine_policy(), RefinePolicy::DirectAlpha);

        let mask = output.into_mask();
        assert_eq!(mask.get_pixel(1, 1)[0], 77);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_mask_uses_morphological_policy() {
        let output = SegmentationOutput::Mask(GrayImage::from_pixel(4, 5, Luma([128])));
        assert_eq!(output.dimensions(), (4, 5));
        assert_eq!(output.refine_policy(), RefinePolicy::Morphological);
        assert_eq!(output.into_mask().dimensions(), (4, 5));
    }
}
