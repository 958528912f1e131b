//! Cutout Studio CLI Tool
//!
//! Command-line interface for producing product cutouts with soft shadows.

#[cfg(feature = "cli")]
use cutout_studio::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<std::process::ExitCode> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
