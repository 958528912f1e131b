//! Segmenter selection for the CLI

use crate::cli::main_impl::Cli;
use crate::{
    backends::{AlphaChannelSegmenter, PrecomputedMaskSegmenter},
    segmentation::Segmenter,
    services::ImageIOService,
    utils::ImagePreprocessor,
};
use anyhow::{Context, Result};

/// Which segmentation source the command line asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmenterSource {
    Model(std::path::PathBuf),
    Mask(std::path::PathBuf),
    Alpha,
}

impl SegmenterSource {
    /// Resolve the single segmentation source from the arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<Self> {
        match (&cli.model, &cli.mask, cli.use_alpha) {
            (Some(model), None, false) => Ok(Self::Model(model.clone())),
            (None, Some(mask), false) => Ok(Self::Mask(mask.clone())),
            (None, None, true) => Ok(Self::Alpha),
            (None, None, false) => {
                anyhow::bail!("A segmentation source is required: --model, --mask or --use-alpha")
            },
            _ => anyhow::bail!("Use exactly one of --model, --mask or --use-alpha"),
        }
    }
}

/// Builds the segmenter the CLI hands to the processor
#[derive(Debug)]
pub(crate) struct CliSegmenterFactory;

impl CliSegmenterFactory {
    /// Create the segmenter for `cli`
    ///
    /// A precomputed mask goes through the same ingestion cap as the image so
    /// the two stay the same size.
    pub(crate) fn create(cli: &Cli) -> Result<Box<dyn Segmenter>> {
        match SegmenterSource::from_cli(cli)? {
            SegmenterSource::Model(path) => Self::create_model(cli, &path),
            SegmenterSource::Mask(path) => {
                let mask = ImageIOService::load_image(&path)
                    .with_context(|| format!("Failed to load mask: {}", path.display()))?;
                let mask = ImagePreprocessor::cap_longest_side(&mask, cli.max_input_side);
                Ok(Box::new(PrecomputedMaskSegmenter::from_image(&mask)))
            },
            SegmenterSource::Alpha => Ok(Box::new(AlphaChannelSegmenter::new())),
        }
    }

    #[cfg(feature = "tract")]
    fn create_model(cli: &Cli, path: &std::path::Path) -> Result<Box<dyn Segmenter>> {
        use crate::{backends::TractSegmenter, utils::NormalizationConfig};

        let _span = crate::tracing_config::spans::model_loading(path, cli.model_input_size).entered();
        let normalization = if cli.imagenet_norm {
            NormalizationConfig::imagenet()
        } else {
            NormalizationConfig::default()
        };
        let segmenter = TractSegmenter::from_path(path, cli.model_input_size, normalization)
            .with_context(|| format!("Failed to load model: {}", path.display()))?;
        Ok(Box::new(segmenter))
    }

    #[cfg(not(feature = "tract"))]
    fn create_model(_cli: &Cli, path: &std::path::Path) -> Result<Box<dyn Segmenter>> {
        anyhow::bail!(
            "Cannot load {}: model support requires the `tract` feature",
            path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use image::{DynamicImage, GenericImageView, Luma, GrayImage};
    use tempfile::tempdir;

    #[test]
    fn test_source_resolution() {
        let cli = Cli::parse_from(["cutout-studio", "--use-alpha", "in.png"]);
        assert_eq!(SegmenterSource::from_cli(&cli).unwrap(), SegmenterSource::Alpha);

        let cli = Cli::parse_from(["cutout-studio", "--mask", "m.png", "in.png"]);
        assert_eq!(
            SegmenterSource::from_cli(&cli).unwrap(),
            SegmenterSource::Mask("m.png".into())
        );

        let cli = Cli::parse_from(["cutout-studio", "in.png"]);
        assert!(SegmenterSource::from_cli(&cli).is_err());
    }

    #[test]
    fn test_mask_is_capped_like_the_image() {
        let dir = tempdir().unwrap();
        let mask_path = dir.path().join("mask.png");
        DynamicImage::ImageLuma8(GrayImage::from_pixel(400, 200, Luma([255])))
            .save(&mask_path)
            .unwrap();

        let cli = Cli::parse_from([
            "cutout-studio",
            "--max-input-side",
            "100",
            "--mask",
            mask_path.to_str().unwrap(),
            "in.png",
        ]);
        let segmenter = CliSegmenterFactory::create(&cli).unwrap();
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(100, 50));
        let output = segmenter.segment(&image).unwrap();
        assert_eq!(output.dimensions(), image.dimensions());
    }

    #[test]
    fn test_missing_mask_file() {
        let cli = Cli::parse_from(["cutout-studio", "--mask", "/nonexistent/mask.png", "in.png"]);
        assert!(CliSegmenterFactory::create(&cli).is_err());
    }
}
