//! Soft shadow synthesis
//!
//! Two policies sit behind [`ShadowPolicy`] and are selected by background
//! mode:
//!
//! - [`AlphaCompositeShadow`] (transparent canvases) blurs an intensity-scaled
//!   copy of the object alpha, lays it underneath the object as a black layer
//!   and composites the object over it. Parameters depend on orientation.
//! - [`LuminanceShadow`] (white canvases) darkens canvas pixels in place under
//!   a blurred, eroded copy of the placement mask.
//!
//! Whether a shadow is drawn at all is decided by [`resolve_shadow`].

use crate::{
    config::{BackgroundMode, ShadowOptions},
    types::{Canvas, OrientationLabel, PlacementRect},
    utils::filters::{blur_fixed_kernel, blur_sigma_bounded, nearest_odd_at_least},
};
use image::{GrayImage, Luma, Pixel, Rgba};
use imageproc::morphology::{grayscale_erode, Mask};
use serde::{Deserialize, Serialize};

/// Effective shadow parameters after orientation scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowParams {
    pub intensity: f32,
    pub blur: u32,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl ShadowParams {
    /// Base parameters straight from the caller's options
    #[must_use]
    pub fn from_options(options: &ShadowOptions) -> Self {
        Self {
            intensity: options.intensity,
            blur: options.blur,
            offset_x: options.offset_x,
            offset_y: options.offset_y,
        }
    }

    /// Apply the orientation scaling table
    ///
    /// | orientation | blur     | offsets  | intensity |
    /// |-------------|----------|----------|-----------|
    /// | standing    | base·1.1 | base·1.2 | base      |
    /// | lying       | base·0.7 | base·0.5 | base·0.7  |
    ///
    /// Integer values truncate toward zero.
    #[must_use]
    pub fn scaled_for(self, label: OrientationLabel) -> Self {
        let (blur_factor, offset_factor, intensity_factor) = match label {
            OrientationLabel::Standing => (1.1, 1.2, 1.0),
            OrientationLabel::Lying => (0.7, 0.5, 0.7),
        };
        Self {
            intensity: self.intensity * intensity_factor as f32,
            blur: (f64::from(self.blur) * blur_factor) as u32,
            offset_x: (f64::from(self.offset_x) * offset_factor) as i32,
            offset_y: (f64::from(self.offset_y) * offset_factor) as i32,
        }
    }
}

/// Shadow policy identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowPolicyKind {
    AlphaComposite,
    LuminanceSubtraction,
}

impl ShadowPolicyKind {
    /// Policy used for a background mode
    #[must_use]
    pub fn for_background(background: BackgroundMode) -> Self {
        match background {
            BackgroundMode::Transparent => Self::AlphaComposite,
            BackgroundMode::White => Self::LuminanceSubtraction,
        }
    }
}

/// Whether a shadow is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowDecision {
    Enabled,
    /// Not requested either way; a lying object on a transparent canvas
    DisabledByDefault,
    DisabledExplicitly,
}

/// Decide whether to draw a shadow
///
/// An explicit `enabled` always wins. Left unset, lying objects on
/// transparent canvases get no shadow and everything else does.
#[must_use]
pub fn resolve_shadow(
    explicit: Option<bool>,
    background: BackgroundMode,
    label: OrientationLabel,
) -> ShadowDecision {
    match (explicit, background, label) {
        (Some(true), _, _) => ShadowDecision::Enabled,
        (Some(false), _, _) => ShadowDecision::DisabledExplicitly,
        (None, BackgroundMode::Transparent, OrientationLabel::Lying) => {
            ShadowDecision::DisabledByDefault
        },
        (None, BackgroundMode::Transparent, OrientationLabel::Standing)
        | (None, BackgroundMode::White, _) => ShadowDecision::Enabled,
    }
}

/// What happened to the shadow for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowStatus {
    Applied,
    DisabledByDefault,
    DisabledExplicitly,
    /// Nothing was placed on the canvas
    NoPlacement,
}

/// Shadow report for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowOutcome {
    pub status: ShadowStatus,
    pub policy: Option<ShadowPolicyKind>,
    /// Parameters actually used, when applied
    pub params: Option<ShadowParams>,
}

impl ShadowOutcome {
    #[must_use]
    pub fn not_applied(status: ShadowStatus) -> Self {
        Self {
            status,
            policy: None,
            params: None,
        }
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.status == ShadowStatus::Applied
    }
}

/// A way of drawing a shadow onto a canvas
pub trait ShadowPolicy: Send + Sync {
    fn kind(&self) -> ShadowPolicyKind;

    /// Parameters this policy uses for the given base options and orientation
    fn effective_params(&self, base: &ShadowOptions, label: OrientationLabel) -> ShadowParams;

    /// Draw the shadow for `placement` onto `canvas`
    fn apply(&self, canvas: &mut Canvas, placement: &PlacementRect, params: &ShadowParams);
}

/// Blurred alpha shadow composited underneath the object
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaCompositeShadow;

/// Visible part of a blurred shadow layer, in canvas coordinates
#[derive(Debug)]
struct ShadowLayer {
    alpha: GrayImage,
    x: u32,
    y: u32,
}

impl AlphaCompositeShadow {
    /// Padding that keeps the blurred edge from being clipped
    fn padding_for(sigma: f32) -> u32 {
        if sigma <= 0.0 {
            0
        } else {
            (3.0 * sigma).ceil() as u32
        }
    }

    /// Intensity-scaled placement mask, padded, offset and blurred
    ///
    /// Only the window that lands on a `side` x `side` canvas is returned.
    /// The blur runs over that window widened by the padding, which covers
    /// the kernel reach, so the result matches blurring the whole padded
    /// layer. `None` when nothing lands on the canvas.
    fn shadow_layer(
        placement: &PlacementRect,
        params: &ShadowParams,
        side: u32,
    ) -> Option<ShadowLayer> {
        let sigma = params.blur as f32;
        let pad = i64::from(Self::padding_for(sigma));
        let side = i64::from(side);

        // Unshifted mask pasted at the offset position
        let src_x0 = i64::from(placement.x) + i64::from(params.offset_x);
        let src_y0 = i64::from(placement.y) + i64::from(params.offset_y);
        let src_x1 = src_x0 + i64::from(placement.width);
        let src_y1 = src_y0 + i64::from(placement.height);

        // Padded layer clipped to the canvas
        let vx0 = (src_x0 - pad).max(0);
        let vy0 = (src_y0 - pad).max(0);
        let vx1 = (src_x1 + pad).min(side);
        let vy1 = (src_y1 + pad).min(side);
        if vx1 <= vx0 || vy1 <= vy0 {
            return None;
        }

        // Blur input: the visible window plus the reach, inside the padded layer
        let ix0 = (vx0 - pad).max(src_x0 - pad);
        let iy0 = (vy0 - pad).max(src_y0 - pad);
        let ix1 = (vx1 + pad).min(src_x1 + pad);
        let iy1 = (vy1 + pad).min(src_y1 + pad);

        let mut input = GrayImage::new((ix1 - ix0) as u32, (iy1 - iy0) as u32);
        for (x, y, pixel) in placement.mask.enumerate_pixels() {
            let lx = src_x0 + i64::from(x);
            let ly = src_y0 + i64::from(y);
            if lx < ix0 || ly < iy0 || lx >= ix1 || ly >= iy1 {
                continue;
            }
            let scaled = (f32::from(pixel[0]) * params.intensity) as u8;
            input.put_pixel((lx - ix0) as u32, (ly - iy0) as u32, Luma([scaled]));
        }

        let blurred = blur_sigma_bounded(&input, sigma);
        let alpha = image::imageops::crop_imm(
            &blurred,
            (vx0 - ix0) as u32,
            (vy0 - iy0) as u32,
            (vx1 - vx0) as u32,
            (vy1 - vy0) as u32,
        )
        .to_image();

        Some(ShadowLayer {
            alpha,
            x: vx0 as u32,
            y: vy0 as u32,
        })
    }
}

impl ShadowPolicy for AlphaCompositeShadow {
    fn kind(&self) -> ShadowPolicyKind {
        ShadowPolicyKind::AlphaComposite
    }

    fn effective_params(&self, base: &ShadowOptions, label: OrientationLabel) -> ShadowParams {
        ShadowParams::from_options(base).scaled_for(label)
    }

    fn apply(&self, canvas: &mut Canvas, placement: &PlacementRect, params: &ShadowParams) {
        let Some(layer) = Self::shadow_layer(placement, params, canvas.side()) else {
            return;
        };

        // Object over a black shadow layer, only where the layer has coverage
        for (sx, sy, pixel) in layer.alpha.enumerate_pixels() {
            let shadow_alpha = pixel[0];
            if shadow_alpha == 0 {
                continue;
            }
            let (cx, cy) = (layer.x + sx, layer.y + sy);
            let object = *canvas.image.get_pixel(cx, cy);
            let mut composed = Rgba([0, 0, 0, shadow_alpha]);
            composed.blend(&object);
            canvas.image.put_pixel(cx, cy, composed);
        }
    }
}

/// In-place darkening under a blurred contact silhouette
#[derive(Debug, Clone, Copy, Default)]
pub struct LuminanceShadow;

impl LuminanceShadow {
    /// Blur kernel size actually used for a configured blur
    #[must_use]
    pub fn kernel_size(blur: u32) -> u32 {
        nearest_odd_at_least(blur)
    }
}

impl ShadowPolicy for LuminanceShadow {
    fn kind(&self) -> ShadowPolicyKind {
        ShadowPolicyKind::LuminanceSubtraction
    }

    fn effective_params(&self, base: &ShadowOptions, _label: OrientationLabel) -> ShadowParams {
        ShadowParams::from_options(base)
    }

    fn apply(&self, canvas: &mut Canvas, placement: &PlacementRect, params: &ShadowParams) {
        if canvas.background != BackgroundMode::White {
            return;
        }

        let side = canvas.side();
        let silhouette = grayscale_erode(&placement.mask, &Mask::square(1));

        // Clamped translation: the copy starts at the clamped corner and is
        // always read from the silhouette origin
        let x1 = (i64::from(placement.x) + i64::from(params.offset_x)).clamp(0, i64::from(side))
            as u32;
        let y1 = (i64::from(placement.y) + i64::from(params.offset_y)).clamp(0, i64::from(side))
            as u32;
        let x2 = (x1 + placement.width).min(side);
        let y2 = (y1 + placement.height).min(side);
        if x2 <= x1 || y2 <= y1 {
            return;
        }

        let ksize = Self::kernel_size(params.blur);
        let radius = ksize / 2;

        // Everything beyond `radius` of the silhouette blurs to zero, so only
        // that window needs to be filtered
        let wx0 = x1.saturating_sub(radius);
        let wy0 = y1.saturating_sub(radius);
        let wx1 = (x2 + radius).min(side);
        let wy1 = (y2 + radius).min(side);

        let mut window = GrayImage::new(wx1 - wx0, wy1 - wy0);
        for y in y1..y2 {
            for x in x1..x2 {
                let value = silhouette.get_pixel(x - x1, y - y1)[0];
                window.put_pixel(x - wx0, y - wy0, Luma([value]));
            }
        }
        let blurred = blur_fixed_kernel(&window, ksize);

        for (wx, wy, pixel) in blurred.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            let alpha = f32::from(pixel[0]) / 255.0 * params.intensity;
            let canvas_pixel = canvas.image.get_pixel_mut(wx + wx0, wy + wy0);
            for channel in canvas_pixel.0.iter_mut().take(3) {
                *channel = ((1.0 - alpha) * f32::from(*channel)) as u8;
            }
        }
    }
}

/// Resolves, parameterizes and applies the shadow for one request
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowSynthesizer;

impl ShadowSynthesizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Policy selected by background mode
    #[must_use]
    pub fn policy_for(background: BackgroundMode) -> &'static dyn ShadowPolicy {
        match ShadowPolicyKind::for_background(background) {
            ShadowPolicyKind::AlphaComposite => &AlphaCompositeShadow,
            ShadowPolicyKind::LuminanceSubtraction => &LuminanceShadow,
        }
    }

    /// Draw the shadow onto `canvas` if the options and orientation call for one
    pub fn synthesize(
        &self,
        canvas: &mut Canvas,
        placement: Option<&PlacementRect>,
        options: &ShadowOptions,
        label: OrientationLabel,
    ) -> ShadowOutcome {
        let Some(placement) = placement else {
            return ShadowOutcome::not_applied(ShadowStatus::NoPlacement);
        };

        match resolve_shadow(options.enabled, canvas.background, label) {
            ShadowDecision::DisabledByDefault => {
                tracing::debug!(orientation = %label, "Shadow disabled by default");
                ShadowOutcome::not_applied(ShadowStatus::DisabledByDefault)
            },
            ShadowDecision::DisabledExplicitly => {
                ShadowOutcome::not_applied(ShadowStatus::DisabledExplicitly)
            },
            ShadowDecision::Enabled => {
                let policy = Self::policy_for(canvas.background);
                let params = policy.effective_params(options, label);

                tracing::debug!(
                    policy = ?policy.kind(),
                    intensity = params.intensity,
                    blur = params.blur,
                    offset_x = params.offset_x,
                    offset_y = params.offset_y,
                    "Applying shadow"
                );

                policy.apply(canvas, placement, &params);

                ShadowOutcome {
                    status: ShadowStatus::Applied,
                    policy: Some(policy.kind()),
                    params: Some(params),
                }
            },
        }
    }
}
