//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliBackground, CliOrientation};
use crate::{
    config::{BackgroundMode, ProcessingOptions},
    processor::{ProcessorConfig, ProcessorConfigBuilder},
};
use anyhow::{Context, Result};
use std::path::Path;

/// Convert CLI arguments to processor configuration and request options
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `ProcessorConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ProcessorConfig> {
        ProcessorConfigBuilder::new()
            .max_input_side(cli.max_input_side)
            .jpeg_quality(cli.jpeg_quality)
            .output_suffix(cli.suffix.clone())
            .enhance_for_segmentation(!cli.no_enhance)
            .debug(cli.verbose >= 2)
            .build()
            .context("Invalid processor configuration")
    }

    /// Build per-request options: `--options` JSON first, then flag overrides
    pub(crate) fn options_from_cli(cli: &Cli) -> Result<ProcessingOptions> {
        let json = match cli.options.as_deref() {
            Some(value) => Self::read_options_argument(value)?,
            None => String::new(),
        };

        let mut options =
            ProcessingOptions::from_json(&json).context("Invalid --options JSON")?;

        if let Some(background) = cli.background {
            options = options.with_background(match background {
                CliBackground::Transparent => BackgroundMode::Transparent,
                CliBackground::White => BackgroundMode::White,
            });
        }
        if cli.shadow {
            options = options.with_shadow_enabled(Some(true));
        } else if cli.no_shadow {
            options = options.with_shadow_enabled(Some(false));
        }
        if let Some(orientation) = cli.orientation {
            options = options.with_orientation(match orientation {
                CliOrientation::Standing => "standing",
                CliOrientation::Lying => "lying",
            });
        }
        if let Some(size) = cli.canvas_size {
            options = options.with_canvas_size(size);
        }

        options.validate().context("Invalid processing options")?;
        Ok(options)
    }

    /// Inline JSON, or `@path` to read it from a file
    fn read_options_argument(value: &str) -> Result<String> {
        match value.strip_prefix('@') {
            Some(path) => std::fs::read_to_string(Path::new(path))
                .with_context(|| format!("Failed to read options file: {path}")),
            None => Ok(value.to_string()),
        }
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.jobs == 0 {
            anyhow::bail!("--jobs must be at least 1");
        }
        if cli.jpeg_quality > 100 {
            anyhow::bail!("--jpeg-quality must be 0-100");
        }
        if cli.mask.is_some() {
            let single_file = cli.input.len() == 1
                && cli.input.first().is_some_and(|input| Path::new(input).is_file());
            if !single_file {
                anyhow::bail!("--mask can only be used with a single input file");
            }
        }
        if let Some(pattern) = cli.pattern.as_deref() {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid --pattern: {pattern}"))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CANVAS_SIZE;
    use clap::Parser;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["cutout-studio"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_cli_config_conversion() {
        let cli = parse(&["--use-alpha", "--jpeg-quality", "70", "--max-input-side", "900", "a.jpg"]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();

        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.max_input_side, 900);
        assert_eq!(config.output_suffix, "bg_shadow");
        assert!(config.enhance_for_segmentation);
        assert!(!config.debug);
    }

    #[test]
    fn test_default_options() {
        let cli = parse(&["--use-alpha", "a.png"]);
        let options = CliConfigBuilder::options_from_cli(&cli).unwrap();
        assert_eq!(options.background, BackgroundMode::Transparent);
        assert_eq!(options.canvas_size, DEFAULT_CANVAS_SIZE);
        assert_eq!(options.shadow.enabled, None);
    }

    #[test]
    fn test_flags_override_json() {
        let cli = parse(&[
            "--use-alpha",
            "--options",
            r#"{"background":"white","shadow":{"enabled":true},"maxSize":800}"#,
            "--no-shadow",
            "--canvas-size",
            "400",
            "--orientation",
            "lying",
            "a.png",
        ]);
        let options = CliConfigBuilder::options_from_cli(&cli).unwrap();

        assert_eq!(options.background, BackgroundMode::White);
        assert_eq!(options.shadow.enabled, Some(false));
        assert_eq!(options.canvas_size, 400);
        assert_eq!(options.orientation.as_deref(), Some("lying"));
    }

    #[test]
    fn test_options_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"shadow":{{"intensity":0.5}}}}"#).unwrap();
        let argument = format!("@{}", file.path().display());

        let cli = parse(&["--use-alpha", "--options", &argument, "a.png"]);
        let options = CliConfigBuilder::options_from_cli(&cli).unwrap();
        assert!((options.shadow.intensity - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_options_json() {
        let cli = parse(&["--use-alpha", "--options", r#"{"background":"sepia"}"#, "a.png"]);
        assert!(CliConfigBuilder::options_from_cli(&cli).is_err());
    }

    #[test]
    fn test_cli_validation() {
        let cli = parse(&["--use-alpha", "a.png"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_ok());

        let cli = parse(&["--use-alpha", "--jobs", "0", "a.png"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["--mask", "m.png", "a.png", "b.png"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());
    }
}
