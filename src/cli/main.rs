//! Cutout Studio CLI
//!
//! Command-line interface for turning product photos into presentation-ready
//! cutouts using the unified processor.

use super::backend_factory::CliSegmenterFactory;
use super::config::CliConfigBuilder;
use crate::{
    config::ProcessingOptions,
    error::CutoutError,
    processor::CutoutProcessor,
    services::ImageIOService,
    tracing_config::{init_cli_tracing, spans},
    types::CutoutSummary,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn, Instrument};

/// Product cutout CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cutout-studio")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<String>,

    /// ONNX salient-object model used for segmentation
    #[arg(long, value_name = "ONNX", conflicts_with_all = ["mask", "use_alpha"])]
    pub model: Option<PathBuf>,

    /// Square input side of the model
    #[arg(long, default_value_t = 1024)]
    pub model_input_size: u32,

    /// Normalize model input with `ImageNet` statistics instead of mean 0.5
    #[arg(long)]
    pub imagenet_norm: bool,

    /// Precomputed foreground mask (single input only)
    #[arg(long, value_name = "IMAGE", conflicts_with_all = ["model", "use_alpha"])]
    pub mask: Option<PathBuf>,

    /// Use the input's own alpha channel as the mask
    #[arg(long, conflicts_with_all = ["model", "mask"])]
    pub use_alpha: bool,

    /// Processing options as JSON, or @file to read them from a file
    #[arg(long, value_name = "JSON")]
    pub options: Option<String>,

    /// Canvas background (overrides --options)
    #[arg(long, value_enum)]
    pub background: Option<CliBackground>,

    /// Force the shadow on
    #[arg(long, conflicts_with = "no_shadow")]
    pub shadow: bool,

    /// Force the shadow off
    #[arg(long)]
    pub no_shadow: bool,

    /// Skip orientation detection
    #[arg(long, value_enum)]
    pub orientation: Option<CliOrientation>,

    /// Side of the square output canvas
    #[arg(long)]
    pub canvas_size: Option<u32>,

    /// Output directory [default: next to each input]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// JPEG quality (0-100) for white backgrounds
    #[arg(long, default_value_t = 88)]
    pub jpeg_quality: u8,

    /// Longest side kept after decoding; larger inputs are downscaled
    #[arg(long, default_value_t = 1600)]
    pub max_input_side: u32,

    /// Suffix for output file names
    #[arg(long, default_value = "bg_shadow")]
    pub suffix: String,

    /// Do not enhance the image before segmentation
    #[arg(long)]
    pub no_enhance: bool,

    /// Number of inputs processed concurrently
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Print one JSON line per input instead of log lines
    #[arg(long)]
    pub json: bool,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for batch processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackground {
    Transparent,
    White,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOrientation {
    Standing,
    Lying,
}

/// Result of processing one input file
#[derive(Debug)]
struct FileOutcome {
    input: PathBuf,
    result: std::result::Result<(PathBuf, CutoutSummary), FileError>,
}

#[derive(Debug)]
enum FileError {
    Pipeline(CutoutError),
    Task(String),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pipeline(e) => write!(f, "{e}"),
            Self::Task(msg) => write!(f, "{msg}"),
        }
    }
}

impl FileError {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Pipeline(e) => serde_json::to_value(e.to_report())
                .unwrap_or_else(|_| serde_json::json!({ "message": e.to_string() })),
            Self::Task(msg) => serde_json::json!({ "kind": "task_error", "message": msg }),
        }
    }
}

pub async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let _tracing_guard = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli)?;
    let options = CliConfigBuilder::options_from_cli(&cli)?;
    let segmenter = CliSegmenterFactory::create(&cli)?;

    let processor = Arc::new(CutoutProcessor::new(config, segmenter));
    let session_id = uuid::Uuid::new_v4().to_string();
    let session = spans::session(&session_id, processor.segmenter_name());

    info!(
        inputs = %cli.input.join(", "),
        background = %options.background,
        canvas = options.canvas_size,
        jobs = cli.jobs,
        "Starting cutout-studio"
    );

    let files = collect_input_files(&cli)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(ExitCode::FAILURE);
    }

    if let Some(output_dir) = &cli.output {
        prepare_output_dir(output_dir)?;
    }

    let batch = spans::batch_processing(files.len(), cli.jobs);
    let outcomes = process_files(&cli, &processor, &options, files)
        .instrument(batch)
        .instrument(session)
        .await;
    let failed = report_outcomes(&cli, &outcomes);

    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Expand file and directory inputs into a sorted list of image files
fn collect_input_files(cli: &Cli) -> Result<Vec<PathBuf>> {
    let mut all_files = Vec::new();

    for input in &cli.input {
        let path = PathBuf::from(input);

        if path.is_file() {
            if ImageIOService::is_supported_format(&path) {
                all_files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            all_files.extend(find_image_files(&path, cli.recursive, cli.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    // Sort for a stable processing order
    all_files.sort();
    all_files.dedup();
    Ok(all_files)
}

fn prepare_output_dir(output_dir: &Path) -> Result<()> {
    if output_dir.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output_dir.display()
        );
    }
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })
}

/// Run every file through the processor, at most `--jobs` at a time
async fn process_files(
    cli: &Cli,
    processor: &Arc<CutoutProcessor>,
    options: &ProcessingOptions,
    files: Vec<PathBuf>,
) -> Vec<FileOutcome> {
    let file_count = files.len();
    let batch_start = Instant::now();

    let progress = (file_count > 1 && !cli.json).then(|| {
        let pb = ProgressBar::new(file_count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    });

    let semaphore = Arc::new(Semaphore::new(cli.jobs));
    let mut handles = Vec::with_capacity(file_count);

    for input in files {
        let processor = Arc::clone(processor);
        let options = options.clone();
        let output_dir = cli.output.clone();
        let semaphore = Arc::clone(&semaphore);

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return FileOutcome {
                    input,
                    result: Err(FileError::Task("Worker pool closed".to_string())),
                };
            };
            let task_input = input.clone();
            let joined = tokio::task::spawn_blocking(move || {
                process_single_file(&processor, &options, &task_input, output_dir.as_deref())
            })
            .await;

            let result = match joined {
                Ok(result) => result.map_err(FileError::Pipeline),
                Err(e) => Err(FileError::Task(format!("Worker panicked: {e}"))),
            };
            FileOutcome { input, result }
        }));
    }

    let mut outcomes = Vec::with_capacity(file_count);
    for handle in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => FileOutcome {
                input: PathBuf::new(),
                result: Err(FileError::Task(format!("Task failed: {e}"))),
            },
        };
        if let Some(pb) = &progress {
            pb.set_message(outcome.input.display().to_string());
            pb.inc(1);
        }
        outcomes.push(outcome);
    }

    if let Some(pb) = progress {
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        pb.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {failed}",
            file_count - failed
        ));
    }

    info!(
        files = file_count,
        elapsed_s = batch_start.elapsed().as_secs_f64(),
        "Batch finished"
    );
    outcomes
}

/// Process one file and write the result next to it or into `output_dir`
fn process_single_file(
    processor: &CutoutProcessor,
    options: &ProcessingOptions,
    input: &Path,
    output_dir: Option<&Path>,
) -> crate::error::Result<(PathBuf, CutoutSummary)> {
    let _span = spans::file_processing(input).entered();

    let bytes = ImageIOService::read_bytes(input)?;
    let name = input.file_name().and_then(|n| n.to_str());
    let result = processor.process_bytes(&bytes, options, name)?;

    let directory = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let output_path = directory.join(&result.output_name);
    ImageIOService::write_bytes(&output_path, &result.bytes)?;

    Ok((output_path, result.summary()))
}

/// Print per-file results; returns the number of failures
fn report_outcomes(cli: &Cli, outcomes: &[FileOutcome]) -> usize {
    let mut failed = 0;

    for outcome in outcomes {
        match &outcome.result {
            Ok((output, summary)) => {
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "input": outcome.input.display().to_string(),
                            "output": output.display().to_string(),
                            "result": summary,
                        })
                    );
                } else {
                    info!(
                        orientation = %summary.orientation.label,
                        shadow = ?summary.shadow.status,
                        "{} -> {}",
                        outcome.input.display(),
                        output.display()
                    );
                }
            },
            Err(e) => {
                failed += 1;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "input": outcome.input.display().to_string(),
                            "error": e.to_json(),
                        })
                    );
                } else {
                    error!("Failed to process {}: {}", outcome.input.display(), e);
                }
            },
        }
    }

    if failed > 0 {
        warn!(
            "Some files failed to process. Processed: {}, Failed: {failed}",
            outcomes.len() - failed
        );
    }
    failed
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if ImageIOService::is_supported_format(path) && matches_pattern(path, pattern) {
                    files.push(path.to_path_buf());
                }
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if ImageIOService::is_supported_format(&path) && matches_pattern(&path, pattern) {
                    files.push(path);
                }
            }
        }
    }

    Ok(files)
}

/// Check if the file name matches the given glob pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::PrecomputedMaskSegmenter;
    use crate::processor::ProcessorConfig;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 60, 30])))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern(Path::new("dir/a.jpg"), Some("*.jpg")));
        assert!(!matches_pattern(Path::new("dir/a.png"), Some("*.jpg")));
        assert!(matches_pattern(Path::new("dir/a.png"), None));
    }

    #[test]
    fn test_find_image_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        write_png(&dir.path().join("a.png"), 4, 4);
        write_png(&nested.join("b.png"), 4, 4);
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let flat = find_image_files(dir.path(), false, None).unwrap();
        assert_eq!(flat.len(), 1);

        let recursive = find_image_files(dir.path(), true, None).unwrap();
        assert_eq!(recursive.len(), 2);

        let filtered = find_image_files(dir.path(), true, Some("b.*")).unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_collect_rejects_missing_input() {
        let cli = Cli::parse_from(["cutout-studio", "--use-alpha", "/nonexistent/photo.png"]);
        assert!(collect_input_files(&cli).is_err());
    }

    #[test]
    fn test_process_single_file_writes_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("stool.png");
        write_png(&input, 40, 40);

        let mask = GrayImage::from_fn(40, 40, |x, y| {
            Luma([if (10..30).contains(&x) && (5..35).contains(&y) { 255 } else { 0 }])
        });
        let processor = CutoutProcessor::new(
            ProcessorConfig::default(),
            Box::new(PrecomputedMaskSegmenter::new(mask)),
        );
        let options = ProcessingOptions::default().with_canvas_size(64);
        let out_dir = dir.path().join("out");

        let (output, summary) =
            process_single_file(&processor, &options, &input, Some(&out_dir)).unwrap();

        assert_eq!(output, out_dir.join("stool_bg_shadow.png"));
        assert!(output.is_file());
        assert_eq!(summary.output_name, "stool_bg_shadow.png");
    }

    #[tokio::test]
    async fn test_failed_files_are_reported() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.png");
        let bad = dir.path().join("bad.png");
        write_png(&good, 32, 32);
        std::fs::write(&bad, b"not a png").unwrap();

        let cli = Cli::parse_from([
            "cutout-studio",
            "--use-alpha",
            "--jobs",
            "2",
            "--json",
            good.to_str().unwrap(),
            bad.to_str().unwrap(),
        ]);
        let processor = Arc::new(CutoutProcessor::new(
            ProcessorConfig::default(),
            Box::new(PrecomputedMaskSegmenter::new(GrayImage::from_pixel(32, 32, Luma([255])))),
        ));
        let options = ProcessingOptions::default().with_canvas_size(64);
        let files = collect_input_files(&cli).unwrap();

        let outcomes = process_files(&cli, &processor, &options, files).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(report_outcomes(&cli, &outcomes), 1);

        let bad_outcome = outcomes.iter().find(|o| o.input == bad).unwrap();
        assert!(matches!(
            bad_outcome.result,
            Err(FileError::Pipeline(CutoutError::Decode(_)))
        ));
    }
}
