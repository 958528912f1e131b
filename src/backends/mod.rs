//! Segmentation backends
//!
//! This module provides the concrete [`Segmenter`](crate::segmentation::Segmenter)
//! implementations:
//! - Precomputed mask backend (masks produced elsewhere)
//! - Alpha channel backend (inputs that are already cut out)
//! - Tract backend (pure Rust ONNX inference, feature `tract`)

pub mod alpha;
pub mod precomputed;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

pub use self::alpha::AlphaChannelSegmenter;
pub use self::precomputed::PrecomputedMaskSegmenter;

#[cfg(feature = "tract")]
pub use self::tract::TractSegmenter;
