//! Shared fixtures for integration tests
//!
//! Scenes are synthesized in code so tests do not depend on image assets.

#![allow(dead_code)]

use cutout_studio::{CutoutProcessor, PrecomputedMaskSegmenter, ProcessorConfig};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

/// Half-open pixel rectangle `(x0, y0, x1, y1)`
pub type Rect = (u32, u32, u32, u32);

/// Textured product photo with a solid rectangular mask over `rect`
pub fn scene(width: u32, height: u32, rect: Rect) -> (DynamicImage, GrayImage) {
    let image = RgbImage::from_fn(width, height, |x, y| {
        if inside(rect, x, y) {
            Rgb([180, (x % 64) as u8 + 40, (y % 64) as u8 + 40])
        } else {
            Rgb([235, 235, 230])
        }
    });
    let mask = GrayImage::from_fn(width, height, |x, y| {
        Luma([if inside(rect, x, y) { 255 } else { 0 }])
    });
    (DynamicImage::ImageRgb8(image), mask)
}

/// Already cut-out RGBA image with an opaque rectangle over `rect`
pub fn cutout(width: u32, height: u32, rect: Rect) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        if inside(rect, x, y) {
            Rgba([30, 90, 160, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    }))
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Processor that replays `mask` for every request
pub fn processor_for(mask: GrayImage) -> CutoutProcessor {
    CutoutProcessor::new(
        ProcessorConfig::default(),
        Box::new(PrecomputedMaskSegmenter::new(mask)),
    )
}

fn inside(rect: Rect, x: u32, y: u32) -> bool {
    let (x0, y0, x1, y1) = rect;
    x >= x0 && x < x1 && y >= y0 && y < y1
}
