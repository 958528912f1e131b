//! Per-request processing options
//!
//! Options arrive as a loosely structured JSON document. They are decoded into
//! [`ProcessingOptions`] and validated once, before any pixel work happens.

use crate::{
    error::{CutoutError, Result},
    types::OrientationLabel,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default shadow opacity for a standing object
pub const DEFAULT_SHADOW_INTENSITY: f32 = 0.20;
/// Default shadow blur in pixels
pub const DEFAULT_SHADOW_BLUR: u32 = 30;
/// Default horizontal shadow offset in pixels
pub const DEFAULT_SHADOW_OFFSET_X: i32 = 20;
/// Default vertical shadow offset in pixels
pub const DEFAULT_SHADOW_OFFSET_Y: i32 = 24;
/// Default output canvas side in pixels
pub const DEFAULT_CANVAS_SIZE: u32 = 1600;

const MIN_CANVAS_SIZE: u32 = 16;
const MAX_CANVAS_SIZE: u32 = 8192;
const MAX_SHADOW_BLUR: u32 = 256;

/// Background mode of the output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Fully transparent canvas, encoded as PNG
    Transparent,
    /// Opaque white canvas, encoded as JPEG
    White,
}

impl Default for BackgroundMode {
    fn default() -> Self {
        Self::Transparent
    }
}

impl std::fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transparent => write!(f, "transparent"),
            Self::White => write!(f, "white"),
        }
    }
}

impl FromStr for BackgroundMode {
    type Err = CutoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transparent" => Ok(Self::Transparent),
            "white" => Ok(Self::White),
            other => Err(CutoutError::invalid_option(format!(
                "unsupported background '{}' (expected 'transparent' or 'white')",
                other
            ))),
        }
    }
}

/// Shadow settings as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowOptions {
    /// `None` when the caller did not say; orientation then decides
    pub enabled: Option<bool>,
    /// Base opacity in [0, 1]
    pub intensity: f32,
    /// Base blur in pixels
    pub blur: u32,
    /// Base horizontal offset in pixels
    pub offset_x: i32,
    /// Base vertical offset in pixels
    pub offset_y: i32,
}

impl Default for ShadowOptions {
    fn default() -> Self {
        Self {
            enabled: None,
            intensity: DEFAULT_SHADOW_INTENSITY,
            blur: DEFAULT_SHADOW_BLUR,
            offset_x: DEFAULT_SHADOW_OFFSET_X,
            offset_y: DEFAULT_SHADOW_OFFSET_Y,
        }
    }
}

/// Options for one request; immutable once validated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingOptions {
    pub shadow: ShadowOptions,
    pub background: BackgroundMode,
    /// Side length of the square output canvas
    pub canvas_size: u32,
    /// Raw orientation override string, if any
    pub orientation: Option<String>,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            shadow: ShadowOptions::default(),
            background: BackgroundMode::default(),
            canvas_size: DEFAULT_CANVAS_SIZE,
            orientation: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOptions {
    shadow: Option<RawShadow>,
    background: Option<String>,
    #[serde(alias = "maxSize", alias = "canvasSize", alias = "canvas_size")]
    max_size: Option<u32>,
    orientation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawShadow {
    enabled: Option<bool>,
    intensity: Option<f32>,
    blur: Option<u32>,
    #[serde(alias = "offsetX")]
    offset_x: Option<i32>,
    #[serde(alias = "offsetY")]
    offset_y: Option<i32>,
    offset: Option<RawOffset>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOffset {
    x: Option<i32>,
    y: Option<i32>,
}

impl ProcessingOptions {
    /// Decode and validate an options JSON document
    ///
    /// An empty or whitespace-only document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::InvalidOption` for malformed JSON, wrongly typed
    /// values, unsupported background modes and out-of-range numbers.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: RawOptions = serde_json::from_str(json)
            .map_err(|e| CutoutError::invalid_option(format!("malformed options JSON: {}", e)))?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawOptions) -> Result<Self> {
        let mut options = Self::default();

        if let Some(background) = raw.background {
            options.background = background.parse()?;
        }
        if let Some(size) = raw.max_size {
            options.canvas_size = size;
        }
        options.orientation = raw.orientation;

        let mut supplied_offsets = Vec::new();
        if let Some(shadow) = raw.shadow {
            let defaults = ShadowOptions::default();
            // Nested `offset: {x, y}` wins over the flat keys
            let nested = shadow.offset.unwrap_or_default();
            let offset_x = nested.x.or(shadow.offset_x);
            let offset_y = nested.y.or(shadow.offset_y);
            supplied_offsets.extend(offset_x.map(|v| ("shadow.offsetX", v)));
            supplied_offsets.extend(offset_y.map(|v| ("shadow.offsetY", v)));

            options.shadow = ShadowOptions {
                enabled: shadow.enabled,
                intensity: shadow.intensity.unwrap_or(defaults.intensity),
                blur: shadow.blur.unwrap_or(defaults.blur),
                offset_x: offset_x.unwrap_or(defaults.offset_x),
                offset_y: offset_y.unwrap_or(defaults.offset_y),
            };
        }

        options.validate()?;

        // Only offsets the caller wrote are held to the canvas
        let limit = i64::from(options.canvas_size);
        for (name, value) in supplied_offsets {
            if i64::from(value).abs() > limit {
                return Err(CutoutError::option_value_error(
                    name,
                    value,
                    &format!("-{}..{}", limit, limit),
                ));
            }
        }

        Ok(options)
    }

    /// Check numeric ranges
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::InvalidOption` naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        let intensity = self.shadow.intensity;
        if !intensity.is_finite() || !(0.0..=1.0).contains(&intensity) {
            return Err(CutoutError::option_value_error(
                "shadow.intensity",
                intensity,
                "0-1",
            ));
        }
        if self.shadow.blur > MAX_SHADOW_BLUR {
            return Err(CutoutError::option_value_error(
                "shadow.blur",
                self.shadow.blur,
                &format!("0-{}", MAX_SHADOW_BLUR),
            ));
        }
        if !(MIN_CANVAS_SIZE..=MAX_CANVAS_SIZE).contains(&self.canvas_size) {
            return Err(CutoutError::option_value_error(
                "maxSize",
                self.canvas_size,
                &format!("{}-{}", MIN_CANVAS_SIZE, MAX_CANVAS_SIZE),
            ));
        }

        Ok(())
    }

    /// Parsed orientation override; `None` when absent or empty
    #[must_use]
    pub fn orientation_override(&self) -> Option<OrientationLabel> {
        let raw = self.orientation.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.to_ascii_lowercase().as_str() {
            "lying" => Some(OrientationLabel::Lying),
            "standing" => Some(OrientationLabel::Standing),
            other => {
                tracing::warn!(
                    orientation = %other,
                    "Unrecognized orientation override, treating as standing"
                );
                Some(OrientationLabel::Standing)
            },
        }
    }

    #[must_use]
    pub fn with_background(mut self, background: BackgroundMode) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub fn with_canvas_size(mut self, size: u32) -> Self {
        self.canvas_size = size;
        self
    }

    #[must_use]
    pub fn with_shadow_enabled(mut self, enabled: Option<bool>) -> Self {
        self.shadow.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_orientation<S: Into<String>>(mut self, orientation: S) -> Self {
        self.orientation = Some(orientation.into());
        self
    }
}
