//! Shared image preprocessing utilities
//!
//! Ingestion downscale, segmentation-input enhancement and model tensor
//! preparation all live here so every segmentation backend sees the same input.

use crate::{
    error::{CutoutError, Result},
    utils::filters::round_to_u8,
};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;

/// Mean luma below which the gamma lift kicks in
const DARK_IMAGE_MEAN_LUMA: f32 = 110.0;
const ENHANCE_GAMMA: f32 = 1.3;
const UNSHARP_SIGMA: f32 = 1.0;
const UNSHARP_AMOUNT: f32 = 1.5;

/// Per-channel normalization applied to model input
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationConfig {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for NormalizationConfig {
    /// `ISNet` style normalization
    fn default() -> Self {
        Self {
            mean: [0.5, 0.5, 0.5],
            std: [1.0, 1.0, 1.0],
        }
    }
}

impl NormalizationConfig {
    /// `ImageNet` statistics, used by `U2-Net` style models
    #[must_use]
    pub fn imagenet() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// How an image was placed on the square model input
///
/// Used to map model output back onto the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    /// Scale factor applied to the source image
    pub scale: f32,
    /// X offset of the scaled image inside the square
    pub offset_x: u32,
    /// Y offset of the scaled image inside the square
    pub offset_y: u32,
    /// Side of the square model input
    pub target_size: u32,
}

impl LetterboxTransform {
    /// Compute the placement of a `width` x `height` image on a `target_size` square
    #[must_use]
    pub fn new(width: u32, height: u32, target_size: u32) -> Self {
        let target = target_size as f32;
        let scale = (target / width.max(1) as f32).min(target / height.max(1) as f32);

        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            target_size,
        }
    }

    /// Scaled dimensions of the source image inside the square
    #[must_use]
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        (
            ((width as f32 * self.scale).round() as u32).clamp(1, self.target_size),
            ((height as f32 * self.scale).round() as u32).clamp(1, self.target_size),
        )
    }

    /// Model-space coordinate for a source pixel, if it falls inside the square
    #[must_use]
    pub fn to_model_space(&self, x: u32, y: u32) -> Option<(usize, usize)> {
        let tx = (x as f32 * self.scale).round() as u32 + self.offset_x;
        let ty = (y as f32 * self.scale).round() as u32 + self.offset_y;

        if tx < self.target_size && ty < self.target_size {
            Some((tx as usize, ty as usize))
        } else {
            None
        }
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Downscale so the longest side is at most `max_side`
    ///
    /// Aspect ratio is preserved and images that already fit are returned
    /// unchanged. This is a hard resource cap applied once at ingestion.
    #[must_use]
    pub fn cap_longest_side(image: &DynamicImage, max_side: u32) -> DynamicImage {
        let (width, height) = image.dimensions();
        let longest = width.max(height);
        if longest <= max_side || max_side == 0 {
            return image.clone();
        }

        let scale = max_side as f32 / longest as f32;
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, max_side);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, max_side);

        tracing::debug!(
            from = %format!("{}x{}", width, height),
            to = %format!("{}x{}", new_width, new_height),
            "Capping input size"
        );

        image.resize_exact(new_width, new_height, FilterType::Lanczos3)
    }

    /// Prepare an image for the segmentation model
    ///
    /// Dark images (mean luma below 110) get a gamma 1.3 lift, then every
    /// image is sharpened with an unsharp mask `1.5·img − 0.5·blur(σ=1)`.
    /// The result is only ever fed to the segmenter, never composited.
    #[must_use]
    pub fn enhance_for_segmentation(image: &DynamicImage) -> DynamicImage {
        let mut rgb = image.to_rgb8();

        let mean_luma = Self::mean_luma(&rgb);
        if mean_luma < DARK_IMAGE_MEAN_LUMA {
            let lut = Self::gamma_lut(ENHANCE_GAMMA);
            for pixel in rgb.pixels_mut() {
                for channel in &mut pixel.0 {
                    *channel = lut[usize::from(*channel)];
                }
            }
        }

        let blurred = imageproc::filter::gaussian_blur_f32(&rgb, UNSHARP_SIGMA);
        let sharpened: RgbImage = ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
            let original = rgb.get_pixel(x, y);
            let soft = blurred.get_pixel(x, y);
            let mut out = [0u8; 3];
            for (c, value) in out.iter_mut().enumerate() {
                let o = f32::from(original.0.get(c).copied().unwrap_or(0));
                let s = f32::from(soft.0.get(c).copied().unwrap_or(0));
                *value = round_to_u8(UNSHARP_AMOUNT * o - (UNSHARP_AMOUNT - 1.0) * s);
            }
            Rgb(out)
        });

        DynamicImage::ImageRgb8(sharpened)
    }

    /// Mean ITU-R BT.601 luma
    fn mean_luma(image: &RgbImage) -> f32 {
        let count = u64::from(image.width()) * u64::from(image.height());
        if count == 0 {
            return 0.0;
        }
        let total: f64 = image
            .pixels()
            .map(|p| {
                0.299 * f64::from(p[0]) + 0.587 * f64::from(p[1]) + 0.114 * f64::from(p[2])
            })
            .sum();
        (total / count as f64) as f32
    }

    /// Lookup table for `out = (in/255)^(1/gamma) · 255`, truncated
    fn gamma_lut(gamma: f32) -> [u8; 256] {
        let inv = 1.0 / gamma;
        let mut lut = [0u8; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = ((i as f32 / 255.0).powf(inv) * 255.0).clamp(0.0, 255.0) as u8;
        }
        lut
    }

    /// Letterbox an image onto a white square and normalize it to NCHW
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Segmentation` when `target_size` is zero.
    pub fn letterbox_to_tensor(
        image: &DynamicImage,
        target_size: u32,
        normalization: &NormalizationConfig,
    ) -> Result<(Array4<f32>, LetterboxTransform)> {
        if target_size == 0 {
            return Err(CutoutError::segmentation("Model input size must be positive"));
        }

        let rgb_image = image.to_rgb8();
        let (orig_width, orig_height) = rgb_image.dimensions();
        let transform = LetterboxTransform::new(orig_width, orig_height, target_size);
        let (new_width, new_height) = transform.scaled_dimensions(orig_width, orig_height);

        let resized =
            image::imageops::resize(&rgb_image, new_width, new_height, FilterType::Triangle);

        let mut canvas = ImageBuffer::from_pixel(target_size, target_size, Rgb([255, 255, 255]));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(transform.offset_x),
            i64::from(transform.offset_y),
        );

        let side = target_size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (y, row) in canvas.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (f32::from(pixel[c]) / 255.0 - normalization.mean[c])
                        / normalization.std[c];
                }
            }
        }

        Ok((tensor, transform))
    }
}
