//! Configuration types for the logging system

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Logging configuration for a process hosting a blob store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when RUST_LOG is unset, e.g. `tilecache_storage=debug`
    pub level: String,

    /// Console output format; `None` disables console output
    pub console: Option<ConsoleFormat>,

    /// ANSI colors on the pretty console
    pub ansi: bool,

    /// JSONL file output
    pub file: Option<FileConfig>,

    /// Record source file and line with each event
    pub include_location: bool,

    /// Record the enclosing spans (blob, layer, range) with JSONL events
    pub include_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: Some(ConsoleFormat::Json),
            ansi: false,
            file: None,
            include_location: true,
            include_spans: true,
        }
    }
}

impl LogConfig {
    /// Warnings and above, routed through the test harness's captured output
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            console: Some(ConsoleFormat::Test),
            include_location: false,
            ..Default::default()
        }
    }
}

/// How events are rendered on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// One JSON object per line on stdout
    #[default]
    Json,
    /// Multi-line human-readable output on stdout
    Pretty,
    /// Single-line output captured by `cargo test`
    Test,
}

/// File output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Maximum rotated files to retain
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "tilecache".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

impl FileConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_rotation(mut self, rotation: RotationStrategy) -> Self {
        self.rotation = rotation;
        self
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// Single file, truncated on start
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.console, Some(ConsoleFormat::Json));
        assert!(config.file.is_none());
    }

    #[test]
    fn test_testing_config_is_quiet() {
        let config = LogConfig::testing();
        assert_eq!(config.level, "warn");
        assert_eq!(config.console, Some(ConsoleFormat::Test));
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: LogConfig = serde_json::from_str(
            r#"{"level":"tilecache_storage=trace","console":"pretty","file":{"directory":"/var/log/tiles"}}"#,
        )
        .unwrap();
        assert_eq!(config.level, "tilecache_storage=trace");
        assert_eq!(config.console, Some(ConsoleFormat::Pretty));
        assert!(config.include_spans);

        let file = config.file.unwrap();
        assert_eq!(file.directory, PathBuf::from("/var/log/tiles"));
        assert_eq!(file.prefix, "tilecache");
        assert_eq!(file.rotation, RotationStrategy::Daily);
    }

    #[test]
    fn test_console_can_be_disabled() {
        let config: LogConfig = serde_json::from_str(r#"{"console":null}"#).unwrap();
        assert!(config.console.is_none());
    }
}
