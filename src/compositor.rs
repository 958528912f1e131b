//! Object placement on the output canvas
//!
//! The object is cropped to its mask, scaled so its height fills three
//! quarters of the canvas, centred horizontally and sat slightly below the
//! vertical centre so it reads as resting on the ground.

use crate::{
    config::BackgroundMode,
    error::{CutoutError, Result},
    types::{BoundingBox, Canvas, PlacementRect},
};
use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage, Rgba, RgbaImage};

/// Canvas and placement produced by the compositor
#[derive(Debug, Clone)]
pub struct Composed {
    pub canvas: Canvas,
    /// `None` when the mask had nothing above the crop threshold
    pub placement: Option<PlacementRect>,
}

/// Crops, scales and pastes the object onto a square canvas
#[derive(Debug, Clone)]
pub struct Compositor {
    /// Mask values strictly above this belong to the crop
    pub crop_threshold: u8,
    /// Object height as a fraction of the canvas side
    pub target_height_ratio: f32,
    /// Fraction of the free vertical space placed above the object
    pub vertical_bias: f32,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            crop_threshold: 10,
            target_height_ratio: 0.75,
            vertical_bias: 0.55,
        }
    }
}

impl Compositor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `image`, cut out by `mask`, on a `side` x `side` canvas
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::DimensionMismatch` when the image and mask
    /// dimensions differ.
    pub fn compose(
        &self,
        image: &DynamicImage,
        mask: &GrayImage,
        side: u32,
        background: BackgroundMode,
    ) -> Result<Composed> {
        let image_dims = image.dimensions();
        if image_dims != mask.dimensions() {
            return Err(CutoutError::DimensionMismatch {
                image: image_dims,
                mask: mask.dimensions(),
            });
        }

        let mut canvas = Canvas::blank(side, background);

        let Some(bbox) = BoundingBox::of_mask(mask, self.crop_threshold) else {
            tracing::debug!("Nothing above crop threshold, returning blank canvas");
            return Ok(Composed {
                canvas,
                placement: None,
            });
        };

        let (ow, oh) = (bbox.width(), bbox.height());
        let object = image
            .crop_imm(bbox.left, bbox.top, ow, oh)
            .to_rgba8();
        let object_mask =
            image::imageops::crop_imm(mask, bbox.left, bbox.top, ow, oh).to_image();

        let (scale, nw, nh) = self.scaled_size(ow, oh, side);
        let object = image::imageops::resize(&object, nw, nh, FilterType::CatmullRom);
        let object_mask = image::imageops::resize(&object_mask, nw, nh, FilterType::Triangle);

        let x = (side - nw) / 2;
        let y = ((side - nh) as f32 * self.vertical_bias).round() as u32;

        paste_with_mask(&mut canvas, &object, &object_mask, x, y);

        let placement = PlacementRect {
            x,
            y,
            width: nw,
            height: nh,
            scale,
            mask: object_mask,
        };

        tracing::debug!(
            crop = %format!("{}x{}", ow, oh),
            placed = %format!("{}x{}+{}+{}", nw, nh, x, y),
            scale = scale,
            "Object placed"
        );

        Ok(Composed {
            canvas,
            placement: Some(placement),
        })
    }

    /// Uniform scale and truncated size for a crop of `ow` x `oh`
    ///
    /// The scale targets the configured height but never lets the width
    /// exceed the canvas.
    #[must_use]
    pub fn scaled_size(&self, ow: u32, oh: u32, side: u32) -> (f32, u32, u32) {
        let target_h = (side as f32 * self.target_height_ratio) as u32;
        let height_scale = target_h as f32 / oh.max(1) as f32;
        let width_limit = side as f32 / ow.max(1) as f32;
        let scale = height_scale.min(width_limit);

        let nw = ((ow as f32 * scale) as u32).clamp(1, side);
        let nh = ((oh as f32 * scale) as u32).clamp(1, side);
        (scale, nw, nh)
    }
}

/// Paste `object` at (`x`, `y`) using `mask` as alpha
///
/// Transparent canvases keep straight colour with alpha taken from the mask;
/// white canvases blend the colour against white.
fn paste_with_mask(canvas: &mut Canvas, object: &RgbaImage, mask: &GrayImage, x: u32, y: u32) {
    let background = canvas.background;
    let side = canvas.side();

    for (ox, oy, pixel) in object.enumerate_pixels() {
        let (cx, cy) = (x + ox, y + oy);
        if cx >= side || cy >= side {
            continue;
        }
        let m = u32::from(mask.get_pixel(ox, oy)[0]);

        let out = match background {
            BackgroundMode::Transparent => {
                let alpha = (u32::from(pixel[3]) * m + 127) / 255;
                Rgba([pixel[0], pixel[1], pixel[2], alpha as u8])
            },
            BackgroundMode::White => {
                let blend = |c: u8| ((u32::from(c) * m + 255 * (255 - m) + 127) / 255) as u8;
                Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255])
            },
        };
        canvas.image.put_pixel(cx, cy, out);
    }
}
