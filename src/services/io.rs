//! Image I/O operations service
//!
//! Keeps file and stream handling out of the pipeline so the processor only
//! ever deals with bytes and decoded pixels.

use crate::error::{CutoutError, Result};
use image::DynamicImage;
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image from bytes, detecting the container from content
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Decode` for empty, truncated or unknown data.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(CutoutError::decode("Input is empty"));
        }
        image::load_from_memory(bytes)
            .map_err(|e| CutoutError::decode(format!("Failed to decode image from bytes: {}", e)))
    }

    /// Read a file into memory
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Io` when the file cannot be read.
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        std::fs::read(path_ref).map_err(|e| {
            log::debug!("Failed to read {}: {}", path_ref.display(), e);
            CutoutError::Io(e)
        })
    }

    /// Load and decode an image file
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Io` for unreadable files and
    /// `CutoutError::Decode` for undecodable contents.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let bytes = Self::read_bytes(path_ref)?;
        Self::decode(&bytes).map_err(|e| match e {
            CutoutError::Decode(msg) => {
                CutoutError::decode(format!("{} (path: {})", msg, path_ref.display()))
            },
            other => other,
        })
    }

    /// Write bytes to a file, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Io` when the directory or file cannot be written.
    pub fn write_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path_ref, bytes)?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| {
                matches!(
                    ext.as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif"
                )
            })
    }

    /// Read an async stream to the end
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::Io` when the stream fails.
    pub async fn read_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
    ) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
        Ok(buffer)
    }
}
