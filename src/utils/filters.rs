//! Grayscale filters used on masks
//!
//! Two blur flavours are provided. [`blur_fixed_kernel`] takes an explicit odd
//! kernel size and derives sigma from it, which is what the feather and the
//! luminance shadow need. [`blur_sigma`] takes sigma directly and delegates to
//! `imageproc`; [`blur_sigma_bounded`] caps its cost for very large sigmas.

use image::{
    imageops::{self, FilterType},
    GrayImage, Luma,
};

/// Smallest odd integer that is `>= n`
#[must_use]
pub fn nearest_odd_at_least(n: u32) -> u32 {
    if n % 2 == 1 {
        n
    } else {
        n + 1
    }
}

/// Sigma implied by a kernel size when none is given explicitly
#[must_use]
pub fn sigma_for_kernel(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian weights for an odd kernel size
///
/// Even sizes are rounded up to the next odd value.
#[must_use]
pub fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    let ksize = nearest_odd_at_least(ksize);

    // Binomial tables for the small sizes
    let table: Option<&[f32]> = match ksize {
        1 => Some(&[1.0]),
        3 => Some(&[1.0, 2.0, 1.0]),
        5 => Some(&[1.0, 4.0, 6.0, 4.0, 1.0]),
        7 => Some(&[1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0]),
        _ => None,
    };

    let weights: Vec<f32> = if let Some(table) = table {
        table.to_vec()
    } else {
        let sigma = sigma_for_kernel(ksize);
        let center = (ksize / 2) as f32;
        (0..ksize)
            .map(|i| {
                let d = i as f32 - center;
                (-(d * d) / (2.0 * sigma * sigma)).exp()
            })
            .collect()
    };

    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Mirror an out-of-range index back into `0..len` without repeating the edge
fn reflect_101(index: i64, len: i64) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as usize
}

/// Separable Gaussian blur with a fixed, odd kernel size
///
/// Borders are reflected without repeating the edge pixel and results are
/// rounded to the nearest integer.
#[must_use]
#[allow(clippy::indexing_slicing)]
// Safe: every index is reflected into bounds or iterates 0..w / 0..h
pub fn blur_fixed_kernel(image: &GrayImage, ksize: u32) -> GrayImage {
    let kernel = gaussian_kernel(ksize);
    if kernel.len() == 1 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return image.clone();
    }

    let radius = (kernel.len() / 2) as i64;
    let src = image.as_raw();

    // Horizontal pass into f32
    let mut horizontal = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x as i64 + k as i64 - radius, w as i64);
                acc += weight * f32::from(row[sx]);
            }
            horizontal[y * w + x] = acc;
        }
    }

    // Vertical pass, rounding back to u8
    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect_101(y as i64 + k as i64 - radius, h as i64);
                acc += weight * horizontal[sy * w + x];
            }
            out.put_pixel(x as u32, y as u32, Luma([round_to_u8(acc)]));
        }
    }

    out
}

/// Gaussian blur parameterized by sigma; `sigma <= 0` is the identity
#[must_use]
pub fn blur_sigma(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || !sigma.is_finite() || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Largest sigma [`blur_sigma_bounded`] blurs at full resolution
pub const MAX_DIRECT_SIGMA: f32 = 64.0;

/// Sigma blur whose kernel never exceeds that of [`MAX_DIRECT_SIGMA`]
///
/// Up to [`MAX_DIRECT_SIGMA`] this is exactly [`blur_sigma`]. Larger sigmas
/// blur a copy downscaled by `ceil(sigma / MAX_DIRECT_SIGMA)` and scale the
/// result back to the input size.
#[must_use]
pub fn blur_sigma_bounded(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= MAX_DIRECT_SIGMA || !sigma.is_finite() {
        return blur_sigma(image, sigma);
    }

    let (width, height) = image.dimensions();
    let factor = (sigma / MAX_DIRECT_SIGMA).ceil() as u32;
    let small_w = ((width + factor - 1) / factor).max(1);
    let small_h = ((height + factor - 1) / factor).max(1);

    let small = imageops::resize(image, small_w, small_h, FilterType::Triangle);
    let blurred = blur_sigma(&small, sigma / factor as f32);
    imageops::resize(&blurred, width, height, FilterType::Triangle)
}

/// Round a float to the nearest `u8`, saturating at the ends
#[must_use]
pub fn round_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_odd_at_least() {
        assert_eq!(nearest_odd_at_least(0), 1);
        assert_eq!(nearest_odd_at_least(5), 5);
        assert_eq!(nearest_odd_at_least(30), 31);
        assert_eq!(nearest_odd_at_least(33), 33);
    }

    #[test]
    fn test_small_kernels_match_binomial_tables() {
        assert_eq!(gaussian_kernel(1), vec![1.0]);
        assert_eq!(gaussian_kernel(3), vec![0.25, 0.5, 0.25]);

        let k5 = gaussian_kernel(5);
        let expected = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];
        for (a, b) in k5.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_large_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(31);
        assert_eq!(kernel.len(), 31);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        for i in 0..15 {
            assert!((kernel[i] - kernel[30 - i]).abs() < 1e-6);
        }
        assert!(kernel[15] > kernel[14]);
    }

    #[test]
    fn test_even_kernel_size_rounds_up() {
        assert_eq!(gaussian_kernel(30).len(), 31);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-7, 1), 0);
    }

    #[test]
    fn test_blur_preserves_constant_images() {
        let image = GrayImage::from_pixel(9, 7, Luma([200]));
        let blurred = blur_fixed_kernel(&image, 5);
        assert_eq!(blurred.dimensions(), (9, 7));
        assert!(blurred.pixels().all(|p| p[0] == 200));
    }

    #[test]
    fn test_blur_spreads_a_single_pixel() {
        let mut image = GrayImage::new(11, 11);
        image.put_pixel(5, 5, Luma([255]));

        let blurred = blur_fixed_kernel(&image, 5);
        let center = blurred.get_pixel(5, 5)[0];
        assert!(center < 255);
        assert!(blurred.get_pixel(6, 5)[0] > 0);
        assert_eq!(blurred.get_pixel(0, 0)[0], 0);
        assert_eq!(blurred.get_pixel(4, 5), blurred.get_pixel(6, 5));
    }

    #[test]
    fn test_blur_sigma_zero_is_identity() {
        let mut image = GrayImage::new(4, 4);
        image.put_pixel(1, 2, Luma([99]));
        assert_eq!(blur_sigma(&image, 0.0), image);
    }

    #[test]
    fn test_bounded_blur_matches_direct_blur_for_small_sigma() {
        let mut image = GrayImage::new(40, 30);
        image.put_pixel(20, 15, Luma([255]));
        image.put_pixel(5, 5, Luma([120]));

        for sigma in [0.0, 1.5, 12.0] {
            assert_eq!(blur_sigma_bounded(&image, sigma), blur_sigma(&image, sigma));
        }
    }

    #[test]
    fn test_bounded_blur_keeps_dimensions_for_large_sigma() {
        let image = GrayImage::from_fn(301, 97, |x, y| Luma([if (x / 40 + y / 40) % 2 == 0 { 255 } else { 0 }]));
        let blurred = blur_sigma_bounded(&image, 256.0);

        assert_eq!(blurred.dimensions(), (301, 97));
        // Everything is spread to a near-uniform grey
        let (min, max) = blurred
            .pixels()
            .fold((u8::MAX, 0u8), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        assert!(max - min < 64, "min {} max {}", min, max);
    }

    #[test]
    fn test_round_to_u8_saturates() {
        assert_eq!(round_to_u8(-3.0), 0);
        assert_eq!(round_to_u8(254.6), 255);
        assert_eq!(round_to_u8(900.0), 255);
        assert_eq!(round_to_u8(10.4), 10);
    }
}
