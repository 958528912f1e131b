//! Services that keep I/O and encoding out of the pipeline

pub mod format;
pub mod io;

pub use format::{OutputFormat, OutputFormatHandler, DEFAULT_JPEG_QUALITY};
pub use io::ImageIOService;
