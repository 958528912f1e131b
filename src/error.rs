//! Error types for cutout processing

use serde::Serialize;
use thiserror::Error;

/// Result type alias for cutout operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Errors produced by the cutout pipeline
///
/// Every variant except [`CutoutError::EmptyForeground`] aborts the request.
/// `EmptyForeground` is handled inside the pipeline by rendering a blank canvas.
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input bytes could not be decoded as an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// The segmentation capability failed
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// The mask contains no foreground pixels
    #[error("Mask has no foreground pixels")]
    EmptyForeground,

    /// Unsupported or out-of-range option value
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Output encoding failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// An image and its paired mask disagree on dimensions
    #[error("Dimension mismatch: image is {}x{}, mask is {}x{}", image.0, image.1, mask.0, mask.1)]
    DimensionMismatch {
        image: (u32, u32),
        mask: (u32, u32),
    },

    /// Segmentation model could not be loaded
    #[error("Model error: {0}")]
    Model(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind tag for a [`CutoutError`], stable across releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DecodeError,
    SegmentationError,
    EmptyForeground,
    InvalidOption,
    EncodeError,
    DimensionMismatch,
    ModelError,
    IoError,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DecodeError => "decode_error",
            Self::SegmentationError => "segmentation_error",
            Self::EmptyForeground => "empty_foreground",
            Self::InvalidOption => "invalid_option",
            Self::EncodeError => "encode_error",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::ModelError => "model_error",
            Self::IoError => "io_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured, kind-tagged error suitable for returning to a caller
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl CutoutError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new invalid option error
    pub fn invalid_option<S: Into<String>>(msg: S) -> Self {
        Self::InvalidOption(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create an option error naming the parameter and its valid range
    pub fn option_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidOption(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Kind tag of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::DecodeError,
            Self::Segmentation(_) => ErrorKind::SegmentationError,
            Self::EmptyForeground => ErrorKind::EmptyForeground,
            Self::InvalidOption(_) => ErrorKind::InvalidOption,
            Self::Encode(_) => ErrorKind::EncodeError,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::Model(_) => ErrorKind::ModelError,
            Self::Io(_) => ErrorKind::IoError,
        }
    }

    /// Whether the pipeline has a defined fallback for this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyForeground)
    }

    #[must_use]
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CutoutError::invalid_option("background 'sepia'");
        assert!(matches!(err, CutoutError::InvalidOption(_)));

        let err = CutoutError::decode("truncated PNG");
        assert!(matches!(err, CutoutError::Decode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CutoutError::invalid_option("unsupported background 'sepia'");
        assert_eq!(
            err.to_string(),
            "Invalid option: unsupported background 'sepia'"
        );

        let err = CutoutError::DimensionMismatch {
            image: (640, 480),
            mask: (320, 240),
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: image is 640x480, mask is 320x240"
        );
    }

    #[test]
    fn test_only_empty_foreground_is_recoverable() {
        assert!(CutoutError::EmptyForeground.is_recoverable());
        assert!(!CutoutError::segmentation("model crashed").is_recoverable());
        assert!(!CutoutError::invalid_option("x").is_recoverable());
        assert!(!CutoutError::DimensionMismatch {
            image: (1, 1),
            mask: (2, 2)
        }
        .is_recoverable());
    }

    #[test]
    fn test_option_value_error_context() {
        let err = CutoutError::option_value_error("shadow.intensity", 1.5, "0-1");
        let message = err.to_string();
        assert!(message.contains("shadow.intensity"));
        assert!(message.contains("1.5"));
        assert!(message.contains("0-1"));
        assert_eq!(err.kind(), ErrorKind::InvalidOption);
    }

    #[test]
    fn test_report_serializes_kind_tag() {
        let report = CutoutError::encode("jpeg writer failed").to_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "encode_error");
        assert_eq!(json["message"], "Encode error: jpeg writer failed");
    }
}
