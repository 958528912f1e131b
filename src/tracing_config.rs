//! Tracing subscriber setup for the command-line front end
//!
//! The library only emits spans and events; installing a subscriber is the
//! binary's job. Verbosity maps onto an `EnvFilter`, and every CLI run logs a
//! session id so batch output can be correlated.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable, coloured output (default for interactive use)
    Console,
    /// Uncoloured compact output for CI logs
    Compact,
    /// One JSON object per event
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Standard error (default)
    Console,
    /// A log file, written by a background worker
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
}

/// Keeps background log writers alive; drop it only at process exit
#[must_use = "dropping the guard stops buffered file logging"]
#[derive(Debug, Default)]
pub struct TracingGuard {
    #[cfg(feature = "tracing-files")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// 0 = info, 1 = debug, 2+ = trace
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Explicit filter directives, overriding `verbosity`
    pub env_filter: Option<String>,
    /// Session id logged at startup
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Filter directive for the configured verbosity
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn build_filter(&self) -> anyhow::Result<EnvFilter> {
        let directives = self
            .env_filter
            .as_deref()
            .unwrap_or_else(|| self.verbosity_to_filter());
        Ok(EnvFilter::try_new(directives)?)
    }

    /// Install the global subscriber
    ///
    /// # Errors
    ///
    /// Fails when the filter directives do not parse or a global subscriber
    /// is already installed.
    pub fn init(self) -> anyhow::Result<TracingGuard> {
        let registry = Registry::default().with(self.build_filter()?);
        #[allow(unused_mut)]
        let mut guard = TracingGuard::default();

        match (&self.format, &self.output) {
            (TracingFormat::Console, TracingOutput::Console) => {
                let layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .compact();
                registry.with(layer).try_init()?;
            },
            (TracingFormat::Compact, TracingOutput::Console) => {
                let layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(false)
                    .compact();
                registry.with(layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            (TracingFormat::Json, TracingOutput::Console) => {
                let layer = fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(layer).try_init()?;
            },
            #[cfg(feature = "tracing-files")]
            (format, TracingOutput::File(path)) => {
                use tracing_appender::{non_blocking, rolling};

                let directory = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| std::path::Path::new("."));
                let file_name = path
                    .file_name()
                    .unwrap_or_else(|| std::ffi::OsStr::new("cutout-studio.log"));
                let (writer, file_guard) = non_blocking(rolling::never(directory, file_name));
                guard._file_guard = Some(file_guard);

                match format {
                    TracingFormat::Console | TracingFormat::Compact => {
                        let layer = fmt::layer().with_ansi(false).with_writer(writer).compact();
                        registry.with(layer).try_init()?;
                    },
                    #[cfg(feature = "tracing-json")]
                    TracingFormat::Json => {
                        let layer = fmt::layer()
                            .json()
                            .with_writer(writer)
                            .with_current_span(true)
                            .with_span_list(true);
                        registry.with(layer).try_init()?;
                    },
                }
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::info!(session_id = %session_id, "Cutout session started");
        }

        Ok(guard)
    }
}

/// Initialize tracing with CLI defaults and a fresh session id
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<TracingGuard> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Console)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
}

/// Span helpers for CLI-level operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one whole CLI run
    pub fn session(session_id: &str, segmenter: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            segmenter = %segmenter
        )
    }

    /// Span for a batch of inputs
    pub fn batch_processing(file_count: usize, jobs: usize) -> Span {
        tracing::span!(Level::INFO, "batch_processing", file_count = file_count, jobs = jobs)
    }

    /// Span for a single input file
    pub fn file_processing(file_path: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "file_processing",
            file_path = %file_path.display()
        )
    }

    pub fn model_loading(model_path: &std::path::Path, input_size: u32) -> Span {
        tracing::span!(
            Level::INFO,
            "model_loading",
            model_path = %model_path.display(),
            input_size = input_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().with_verbosity(0).verbosity_to_filter(), "info");
        assert_eq!(TracingConfig::new().with_verbosity(1).verbosity_to_filter(), "debug");
        assert_eq!(TracingConfig::new().with_verbosity(2).verbosity_to_filter(), "trace");
        assert_eq!(TracingConfig::new().with_verbosity(9).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_env_filter("cutout_studio=debug")
            .with_session_id("test-session");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.env_filter.as_deref(), Some("cutout_studio=debug"));
        assert_eq!(config.session_id.as_deref(), Some("test-session"));
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.format, TracingFormat::Console);
        assert_eq!(config.output, TracingOutput::Console);
        assert!(config.env_filter.is_none());
        assert!(config.session_id.is_none());
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = TracingConfig::new().with_env_filter("cutout_studio=loudest");
        assert!(config.build_filter().is_err());
    }
}
