//! Named loggers and the pipeline they share.
//!
//! # Ownership
//!
//! ```text
//! LoggerRegistry ──owns──▶ Arc<ArcSwap<Pipeline>> ◀──shares── Logger("app")
//!       │                        │                 ◀──shares── Logger("http.access")
//!       └── name → Logger map    └── Formatter + Sink + min level
//! ```
//!
//! Reconfiguring swaps the whole pipeline in one atomic store. Emitters only
//! ever `load()` it, which never blocks, and a handle obtained before the
//! swap writes through the new pipeline afterwards. Nothing stacks: there is
//! exactly one sink per registry at any time.
//!
//! The process-wide registry behind [`setup_logging`] and [`get_logger`] is
//! just one `LoggerRegistry` in a `LazyLock`. Tests and embedders can own
//! their own.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, Once, PoisonError};

use arc_swap::ArcSwap;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::bridge::TracingBridge;
use crate::config::LogConfig;
use crate::context::current_context;
use crate::error::Error;
use crate::field::IntoFields;
use crate::format::{FormatChoice, Formatter, FormatterConfig};
use crate::level::Level;
use crate::record::LogRecord;
use crate::sink::Sink;

/// Name used by `get_logger(None)`.
pub const DEFAULT_LOGGER: &str = "app";

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub(crate) struct Pipeline {
    formatter: Formatter,
    formatter_config: FormatterConfig,
    min_level: Level,
    sink: Sink,
}

impl Pipeline {
    fn build(config: &LogConfig) -> Result<Self, Error> {
        let sink = Sink::open(&config.stream)?;
        Ok(Self::with_sink(sink, config.format, config.level))
    }

    /// What loggers write through before `setup_logging` runs.
    fn unconfigured() -> Self {
        Self::with_sink(Sink::stdout(), FormatChoice::Auto, Level::Info)
    }

    fn with_sink(sink: Sink, format: FormatChoice, min_level: Level) -> Self {
        let formatter_config = FormatterConfig::resolve(format, sink.is_interactive());
        Self {
            formatter: Formatter::from_config(formatter_config),
            formatter_config,
            min_level,
            sink,
        }
    }

    #[inline]
    pub(crate) fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    pub(crate) fn emit(&self, record: &LogRecord) {
        self.sink.write_line(&self.formatter.render(record));
    }
}

pub(crate) type SharedPipeline = Arc<ArcSwap<Pipeline>>;

// ── Registry ──────────────────────────────────────────────────────────────────

/// Owns one pipeline and hands out named [`Logger`]s bound to it.
pub struct LoggerRegistry {
    pipeline: SharedPipeline,
    loggers: Mutex<HashMap<String, Logger>>,
}

impl LoggerRegistry {
    pub fn new(config: &LogConfig) -> Result<Self, Error> {
        Ok(Self::from_pipeline(Pipeline::build(config)?))
    }

    fn from_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(ArcSwap::from_pointee(pipeline)),
            loggers: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the pipeline. On error the previous one stays in place.
    pub fn configure(&self, config: &LogConfig) -> Result<(), Error> {
        let pipeline = Pipeline::build(config)?;
        self.pipeline.store(Arc::new(pipeline));
        Ok(())
    }

    /// The logger called `name`, created on first use.
    pub fn logger(&self, name: &str) -> Logger {
        let mut loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
        loggers
            .entry(name.to_owned())
            .or_insert_with(|| Logger {
                name: Arc::from(name),
                pipeline: Arc::clone(&self.pipeline),
            })
            .clone()
    }

    /// The formatter decision of the active pipeline.
    pub fn formatter_config(&self) -> FormatterConfig {
        self.pipeline.load().formatter_config
    }

    /// A `tracing` layer writing through this registry's pipeline.
    pub fn tracing_layer(&self) -> TracingBridge {
        TracingBridge::new(Arc::clone(&self.pipeline))
    }
}

impl fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("formatter", &self.formatter_config())
            .finish_non_exhaustive()
    }
}

// ── Process-wide registry ─────────────────────────────────────────────────────

static GLOBAL: LazyLock<LoggerRegistry> =
    LazyLock::new(|| LoggerRegistry::from_pipeline(Pipeline::unconfigured()));

static TRACING_BRIDGE: Once = Once::new();

/// The registry behind [`setup_logging`] and [`get_logger`].
pub fn global() -> &'static LoggerRegistry {
    &GLOBAL
}

/// Configures process-wide logging.
///
/// Safe to call repeatedly: each call replaces the previous configuration.
/// With `capture_tracing`, the first successful call also installs the
/// tracing bridge as the global `tracing` subscriber. If another subscriber
/// is already installed, that one is left alone.
pub fn setup_logging(config: LogConfig) -> Result<(), Error> {
    GLOBAL.configure(&config)?;
    if config.capture_tracing {
        TRACING_BRIDGE.call_once(|| {
            let _ = tracing_subscriber::registry().with(GLOBAL.tracing_layer()).try_init();
        });
    }
    Ok(())
}

/// A handle to the process-wide logger called `name` (default [`DEFAULT_LOGGER`]).
pub fn get_logger(name: Option<&str>) -> Logger {
    GLOBAL.logger(name.unwrap_or(DEFAULT_LOGGER))
}

// ── Logger ────────────────────────────────────────────────────────────────────

/// A named, cloneable logging handle.
///
/// Every call merges the ambient context with the call-site fields (the
/// call site wins on collisions) and writes one line synchronously.
///
/// ```rust
/// use tsu_logging::{fields, get_logger};
///
/// let log = get_logger(None);
/// log.info("user signed in", fields! { "user" => "alice", "attempt" => 2 });
/// log.debug("no fields", ());
/// ```
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    pipeline: SharedPipeline,
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        self.pipeline.load().enabled(level)
    }

    pub fn log(&self, level: Level, message: impl Into<String>, fields: impl IntoFields) {
        let pipeline = self.pipeline.load();
        if !pipeline.enabled(level) {
            return;
        }
        let record = LogRecord::compose(level, &self.name, message, current_context(), fields.into_fields());
        pipeline.emit(&record);
    }

    pub fn debug(&self, message: impl Into<String>, fields: impl IntoFields) {
        self.log(Level::Debug, message, fields);
    }

    pub fn info(&self, message: impl Into<String>, fields: impl IntoFields) {
        self.log(Level::Info, message, fields);
    }

    pub fn warning(&self, message: impl Into<String>, fields: impl IntoFields) {
        self.log(Level::Warning, message, fields);
    }

    pub fn error(&self, message: impl Into<String>, fields: impl IntoFields) {
        self.log(Level::Error, message, fields);
    }

    pub fn critical(&self, message: impl Into<String>, fields: impl IntoFields) {
        self.log(Level::Critical, message, fields);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish_non_exhaustive()
    }
}
