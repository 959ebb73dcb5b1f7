//! Structured logging setup for tilecache
//!
//! Installs a `tracing-subscriber` registry shared by every tilecache crate.
//! Console output is JSONL by default, or pretty for interactive use; a
//! rolling JSONL file can be added alongside. RUST_LOG overrides the
//! configured level.
//!
//! ```ignore
//! use tilecache_logging::{ConsoleFormat, FileConfig, TilecacheSubscriberBuilder};
//!
//! let _guard = TilecacheSubscriberBuilder::new()
//!     .with_console(Some(ConsoleFormat::Pretty))
//!     .with_file_output(FileConfig::new("/var/log/tilecache"))
//!     .init()?;
//! ```

pub mod config;

pub use config::{ConsoleFormat, FileConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};
use std::io;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{MakeWriter, TestWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Log directory error: {0}")]
    Io(#[from] io::Error),

    #[error("Rolling file appender error: {0}")]
    Appender(#[from] InitError),

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Keeps the background file writer alive; drop it to flush
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Builder for configuring and initializing the tilecache logging subscriber
#[derive(Debug, Clone, Default)]
pub struct TilecacheSubscriberBuilder {
    config: LogConfig,
}

impl TilecacheSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Choose the console format, or `None` for no console output
    pub fn with_console(mut self, format: Option<ConsoleFormat>) -> Self {
        self.config.console = format;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Install the subscriber as the global default
    ///
    /// Keep the returned guard alive for as long as file output is needed.
    ///
    /// # Errors
    ///
    /// Fails if the log directory cannot be prepared, a filter directive is
    /// invalid, or a global subscriber has already been set.
    pub fn init(self) -> Result<LogGuard, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.config.level))
            .map_err(|e| LoggingError::Filter(e.to_string()))?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = LogGuard::default();

        match self.config.console {
            Some(ConsoleFormat::Test) => {
                layers.push(self.console_layer(ConsoleFormat::Test, TestWriter::new()));
            }
            Some(format) => layers.push(self.console_layer(format, io::stdout)),
            None => {}
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            layers.push(self.jsonl_layer(writer));
            guard._file = Some(file_guard);
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init()?;

        Ok(guard)
    }

    fn console_layer<W>(&self, format: ConsoleFormat, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let location = self.config.include_location;
        match format {
            ConsoleFormat::Json => self.jsonl_layer(writer),
            ConsoleFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(self.config.ansi)
                .with_file(location)
                .with_line_number(location)
                .with_writer(writer)
                .boxed(),
            ConsoleFormat::Test => tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(false)
                .with_file(location)
                .with_line_number(location)
                .with_writer(writer)
                .boxed(),
        }
    }

    fn jsonl_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(self.config.include_spans)
            .with_span_list(self.config.include_spans)
            .flatten_event(true)
            .with_file(self.config.include_location)
            .with_line_number(self.config.include_location)
            .with_writer(writer)
            .boxed()
    }
}

/// Create the file writer; `Never` truncates a single file, others append with rotation
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }

    Ok(tracing_appender::non_blocking(builder.build(&config.directory)?))
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = TilecacheSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Collects console output in memory
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn render(builder: &TilecacheSubscriberBuilder, format: ConsoleFormat) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let layer = builder.console_layer(format, move || writer.clone());
        tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), || {
            tracing::info!(layer = "topp:states", removed = 3u64, "Deleted layer");
        });
        captured.text()
    }

    #[test]
    fn test_builder_defaults_to_jsonl_console() {
        let builder = TilecacheSubscriberBuilder::new();
        assert_eq!(builder.config.level, "info");
        assert_eq!(builder.config.console, Some(ConsoleFormat::Json));
    }

    #[test]
    fn test_builder_with_level_and_console() {
        let builder = TilecacheSubscriberBuilder::new()
            .with_level("trace")
            .with_console(None);
        assert_eq!(builder.config.level, "trace");
        assert!(builder.config.console.is_none());
    }

    #[test]
    fn test_json_console_is_one_line_per_event() {
        let output = render(&TilecacheSubscriberBuilder::new(), ConsoleFormat::Json);
        assert_eq!(output.lines().count(), 1);

        let event: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(event["message"], "Deleted layer");
        assert_eq!(event["removed"], 3);
    }

    #[test]
    fn test_pretty_console_spans_several_lines() {
        let builder = TilecacheSubscriberBuilder::new();
        let output = render(&builder, ConsoleFormat::Pretty);
        assert!(output.contains("Deleted layer"));
        assert!(output.lines().count() > 1, "not pretty: {output:?}");
        assert!(!output.trim_start().starts_with('{'));
        assert!(!output.contains('\u{1b}'), "ansi is off by default");
    }

    #[test]
    fn test_test_console_is_compact() {
        let builder = TilecacheSubscriberBuilder::new().with_config(LogConfig::testing());
        let output = render(&builder, ConsoleFormat::Test);
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("Deleted layer"));
    }
}
