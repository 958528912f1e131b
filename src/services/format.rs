//! Output format handling service
//!
//! Chooses the container for a background mode, finalizes canvas pixels for
//! it and encodes them. Transparent canvases become PNG, white canvases JPEG.

use crate::{
    config::BackgroundMode,
    error::{CutoutError, Result},
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ExtendedColorType, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Default JPEG quality for white-background output
pub const DEFAULT_JPEG_QUALITY: u8 = 88;

/// Encoded output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Output container for a background mode
    #[must_use]
    pub fn format_for(background: BackgroundMode) -> OutputFormat {
        match background {
            BackgroundMode::Transparent => OutputFormat::Png,
            BackgroundMode::White => OutputFormat::Jpeg,
        }
    }

    /// Encode an image
    ///
    /// `jpeg_quality` is clamped to 1-100 and ignored for PNG.
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Encode` when the encoder fails.
    pub fn encode(image: &DynamicImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();

        match format {
            OutputFormat::Png => {
                let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
                rgba.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                    .map_err(|e| CutoutError::encode(format!("PNG encoding failed: {}", e)))?;
            },
            OutputFormat::Jpeg => {
                let rgb = image.to_rgb8();
                let mut encoder =
                    JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100));
                encoder
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                    .map_err(|e| CutoutError::encode(format!("JPEG encoding failed: {}", e)))?;
            },
        }

        log::debug!("Encoded {} bytes as {}", buffer.len(), format);
        Ok(buffer)
    }

    /// Derive the output name `{base}_{suffix}.{ext}`
    ///
    /// `base` is the file name of `original` up to its last `.`, or `image`
    /// when no usable name is given. Directory components are dropped.
    #[must_use]
    pub fn output_name(original: Option<&str>, suffix: &str, format: OutputFormat) -> String {
        let file_name = original
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .unwrap_or("");

        let base = match file_name.rsplit_once('.') {
            Some((base, _)) => base,
            None => file_name,
        };
        let base = if base.is_empty() { "image" } else { base };

        format!("{}_{}.{}", base, suffix, format.extension())
    }
}
