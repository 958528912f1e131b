//! Mask refinement
//!
//! Turns the segmenter's raw mask into a smooth alpha. Two policies exist:
//! raw probability masks are binarized and cleaned morphologically, while
//! masks that are already a clean alpha only get a light feather.

use crate::{
    error::{CutoutError, Result},
    types::BoundingBox,
    utils::filters::{blur_fixed_kernel, blur_sigma},
};
use image::{GrayImage, Luma};
use imageproc::{distance_transform::Norm, morphology};
use serde::Serialize;

/// Weight of the dilated mask in the edge blend, in tenths
const EXPAND_WEIGHT: u16 = 6;
/// Weight of the eroded mask in the edge blend, in tenths
const SHRINK_WEIGHT: u16 = 4;

/// How a raw mask is refined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinePolicy {
    /// Otsu binarization, open/close cleanup, erode/dilate blend, feather
    Morphological,
    /// Light feather of an existing alpha
    DirectAlpha,
}

/// Cleans raw segmentation masks into smooth alphas
#[derive(Debug, Clone)]
pub struct MaskRefiner {
    /// Kernel size of the final feather in the morphological policy
    pub feather_kernel: u32,
    /// Blur sigma for the direct-alpha policy
    pub alpha_feather_sigma: f32,
}

impl Default for MaskRefiner {
    fn default() -> Self {
        Self {
            feather_kernel: 5,
            alpha_feather_sigma: 1.0,
        }
    }
}

impl MaskRefiner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refine `mask` with the given policy
    ///
    /// The output always has the same dimensions as the input.
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::EmptyForeground` when the input has no non-zero
    /// pixel, or when nothing survives refinement.
    pub fn refine(&self, mask: &GrayImage, policy: RefinePolicy) -> Result<GrayImage> {
        if BoundingBox::of_nonzero(mask).is_none() {
            return Err(CutoutError::EmptyForeground);
        }

        let refined = match policy {
            RefinePolicy::Morphological => self.morphological(mask),
            RefinePolicy::DirectAlpha => blur_sigma(mask, self.alpha_feather_sigma),
        };

        if BoundingBox::of_nonzero(&refined).is_none() {
            return Err(CutoutError::EmptyForeground);
        }

        tracing::debug!(
            policy = ?policy,
            width = refined.width(),
            height = refined.height(),
            "Mask refined"
        );

        Ok(refined)
    }

    fn morphological(&self, mask: &GrayImage) -> GrayImage {
        let binary = binarize(mask, otsu_threshold(mask));

        let opened = morphology::open(&binary, Norm::LInf, 1);
        let cleaned = morphology::close(&opened, Norm::LInf, 1);

        let shrink = morphology::erode(&cleaned, Norm::LInf, 1);
        let expand = morphology::dilate(&cleaned, Norm::LInf, 1);

        let (width, height) = cleaned.dimensions();
        let blended = GrayImage::from_fn(width, height, |x, y| {
            let e = u16::from(expand.get_pixel(x, y)[0]);
            let s = u16::from(shrink.get_pixel(x, y)[0]);
            Luma([((EXPAND_WEIGHT * e + SHRINK_WEIGHT * s) / 10) as u8])
        });

        blur_fixed_kernel(&blended, self.feather_kernel)
    }
}

/// Otsu level for `mask`; pixels strictly above it are foreground
///
/// Single-valued masks have no between-class variance, so every non-zero
/// pixel is treated as foreground.
fn otsu_threshold(mask: &GrayImage) -> u8 {
    let (min, max) = mask
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if min == max {
        return max.saturating_sub(1);
    }
    imageproc::contrast::otsu_level(mask)
}

fn binarize(mask: &GrayImage, level: u8) -> GrayImage {
    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
