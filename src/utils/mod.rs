//! Image-space helpers shared by the pipeline stages

pub mod filters;
pub mod preprocessing;

pub use preprocessing::{ImagePreprocessor, LetterboxTransform, NormalizationConfig};
