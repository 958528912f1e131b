//! Test utilities and mock segmenters
//!
//! Mock [`Segmenter`] implementations let the processor be tested without
//! model files or a real inference engine.

use crate::{
    error::{CutoutError, Result},
    segmentation::{SegmentationOutput, Segmenter},
};
use image::{DynamicImage, GenericImageView, GrayImage, Luma, Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

/// Shape of the output a [`MockSegmenter`] produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutput {
    /// Solid rectangle mask covering the central half of the image
    CenterRect,
    /// Same rectangle delivered as the alpha of an RGBA cutout
    CenterRectCutout,
    /// All-zero mask
    Empty,
    /// Mask one pixel narrower than the input
    WrongDimensions,
}

/// Mock segmenter for testing
#[derive(Debug, Clone)]
pub struct MockSegmenter {
    output: MockOutput,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    /// Whether to simulate segmentation failure
    should_fail: bool,
}

impl MockSegmenter {
    /// Create a new mock segmenter producing a centred rectangle mask
    #[must_use]
    pub fn new() -> Self {
        Self::with_output(MockOutput::CenterRect)
    }

    #[must_use]
    pub fn with_output(output: MockOutput) -> Self {
        Self {
            output,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    /// Create a mock segmenter that fails every call
    #[must_use]
    pub fn new_failing() -> Self {
        let mut segmenter = Self::new();
        segmenter.should_fail = true;
        segmenter
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    /// Clear the call history
    pub fn clear_call_history(&self) {
        self.call_history.lock().unwrap().clear();
    }

    /// Record a method call for testing verification
    fn record_call(&self, entry: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(entry);
        }
    }

    fn center_rect(width: u32, height: u32) -> GrayImage {
        let (x0, x1) = (width / 4, width - width / 4);
        let (y0, y1) = (height / 4, height - height / 4);
        GrayImage::from_fn(width, height, |x, y| {
            if x >= x0 && x < x1 && y >= y0 && y < y1 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }
}

impl Default for MockSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for MockSegmenter {
    fn name(&self) -> &str {
        "mock"
    }

    fn segment(&self, image: &DynamicImage) -> Result<SegmentationOutput> {
        let (width, height) = image.dimensions();
        self.record_call(format!("segment {width}x{height}"));

        if self.should_fail {
            return Err(CutoutError::segmentation("Mock segmenter failed"));
        }

        Ok(match self.output {
            MockOutput::CenterRect => SegmentationOutput::Mask(Self::center_rect(width, height)),
            MockOutput::CenterRectCutout => {
                let mask = Self::center_rect(width, height);
                let rgb = image.to_rgb8();
                SegmentationOutput::Cutout(RgbaImage::from_fn(width, height, |x, y| {
                    let p = rgb.get_pixel(x, y);
                    Rgba([p[0], p[1], p[2], mask.get_pixel(x, y)[0]])
                }))
            },
            MockOutput::Empty => SegmentationOutput::Mask(GrayImage::new(width, height)),
            MockOutput::WrongDimensions => {
                SegmentationOutput::Mask(GrayImage::new(width.saturating_sub(1).max(1), height))
            },
        })
    }
}

/// Helper functions for creating test images
pub mod test_helpers {
    use image::{DynamicImage, ImageBuffer, Rgb};

    /// Create a test image with a simple gradient pattern
    pub fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            Rgb([r, g, 128])
        });

        DynamicImage::ImageRgb8(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let segmenter = MockSegmenter::new();
        assert!(segmenter.get_call_history().is_empty());

        let image = test_helpers::create_test_image(40, 20);
        segmenter.segment(&image).unwrap();
        segmenter.segment(&image).unwrap();

        let history = segmenter.get_call_history();
        assert_eq!(history, vec!["segment 40x20".to_string(), "segment 40x20".to_string()]);

        segmenter.clear_call_history();
        assert!(segmenter.get_call_history().is_empty());
    }

    #[test]
    fn test_mock_failure() {
        let segmenter = MockSegmenter::new_failing();
        let result = segmenter.segment(&test_helpers::create_test_image(8, 8));
        assert!(matches!(result, Err(CutoutError::Segmentation(_))));
        assert_eq!(segmenter.get_call_history().len(), 1);
    }

    #[test]
    fn test_mock_outputs() {
        let image = test_helpers::create_test_image(40, 20);

        let rect = MockSegmenter::new().segment(&image).unwrap().into_mask();
        assert_eq!(rect.get_pixel(20, 10)[0], 255);
        assert_eq!(rect.get_pixel(0, 0)[0], 0);

        let cutout = MockSegmenter::with_output(MockOutput::CenterRectCutout)
            .segment(&image)
            .unwrap();
        assert!(matches!(cutout, SegmentationOutput::Cutout(_)));
        assert_eq!(cutout.into_mask(), rect);

        let wrong = MockSegmenter::with_output(MockOutput::WrongDimensions)
            .segment(&image)
            .unwrap();
        assert_eq!(wrong.dimensions(), (39, 20));
    }
}
