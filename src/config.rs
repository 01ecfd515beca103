//! Logging configuration.
//!
//! There is no config file: values come from code, from the environment, or
//! both (`LogConfig::from_env()?.level(Level::Debug)`).

use crate::error::Error;
use crate::format::FormatChoice;
use crate::level::Level;
use crate::sink::Stream;

/// Minimum level, e.g. `LOG_LEVEL=debug`.
pub const LEVEL_ENV: &str = "LOG_LEVEL";
/// `auto`, `text` or `json`.
pub const FORMAT_ENV: &str = "LOG_FORMAT";
/// `stdout`, `stderr` or a file path.
pub const STREAM_ENV: &str = "LOG_STREAM";

/// Input to [`setup_logging`](crate::setup_logging).
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: Level,
    pub stream: Stream,
    pub format: FormatChoice,
    /// Route `tracing` events through the same pipeline.
    pub capture_tracing: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            stream: Stream::Stdout,
            format: FormatChoice::Auto,
            capture_tracing: true,
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `LOG_LEVEL`, `LOG_FORMAT` and `LOG_STREAM`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(level) = lookup(LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Some(format) = lookup(FORMAT_ENV) {
            config.format = format.parse()?;
        }
        if let Some(stream) = lookup(STREAM_ENV) {
            config.stream = stream.parse()?;
        }
        Ok(config)
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }

    pub fn format(mut self, format: FormatChoice) -> Self {
        self.format = format;
        self
    }

    pub fn capture_tracing(mut self, enabled: bool) -> Self {
        self.capture_tracing = enabled;
        self
    }
}
