//! Record rendering: colorized text for terminals, JSON lines for everything else.
//!
//! # Structured wire format
//!
//! One JSON object per line. Fixed keys come first, always in this order:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.000000Z","level":"info","logger":"app","message":"hello","user":"bob"}
//! ```
//!
//! Context fields follow, flattened at the top level in insertion order. A
//! field whose name collides with a fixed key is written as `field.<name>`.
//! A field whose name already starts with `field.` gets the same prefix, so
//! [`parse_structured`] strips exactly one and every name comes back intact.
//!
//! # Text format
//!
//! ```text
//! INFO      2024-05-01T12:00:00.000Z  app: hello  user=bob attempt=3
//! ```

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use colored::{ColoredString, Colorize};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::Error;
use crate::field::Fields;
use crate::level::Level;
use crate::record::LogRecord;

const TIMESTAMP: &str = "timestamp";
const LEVEL: &str = "level";
const LOGGER: &str = "logger";
const MESSAGE: &str = "message";
const RESERVED: [&str; 4] = [TIMESTAMP, LEVEL, LOGGER, MESSAGE];
const SHADOW_PREFIX: &str = "field.";

/// Width the text renderer pads level labels to. `CRITICAL` is the longest.
const LEVEL_WIDTH: usize = 8;

// ── Configuration ─────────────────────────────────────────────────────────────

/// The two output modes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Text,
    Structured,
}

/// Requested output format. `Auto` decides from the stream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FormatChoice {
    #[default]
    Auto,
    Text,
    Json,
}

impl FromStr for FormatChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto"                 => Ok(Self::Auto),
            "text" | "console"     => Ok(Self::Text),
            "json" | "structured"  => Ok(Self::Json),
            _                      => Err(Error::InvalidFormat(s.to_owned())),
        }
    }
}

/// The resolved formatter decision for one configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormatterConfig {
    pub mode: Mode,
    pub stream_is_interactive: bool,
}

impl FormatterConfig {
    pub fn resolve(choice: FormatChoice, stream_is_interactive: bool) -> Self {
        let mode = match choice {
            FormatChoice::Auto if stream_is_interactive => Mode::Text,
            FormatChoice::Auto                          => Mode::Structured,
            FormatChoice::Text                          => Mode::Text,
            FormatChoice::Json                          => Mode::Structured,
        };
        Self { mode, stream_is_interactive }
    }
}

// ── Formatter ─────────────────────────────────────────────────────────────────

/// Renders a [`LogRecord`] into one line, without the trailing newline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Formatter {
    /// Human-readable. `ansi` colors the level, logger and keys.
    Text { ansi: bool },
    /// One JSON object per record.
    Structured,
}

/// Text with colors for a terminal, JSON otherwise.
pub fn select_formatter(stream_is_interactive: bool) -> Formatter {
    Formatter::from_config(FormatterConfig::resolve(FormatChoice::Auto, stream_is_interactive))
}

impl Formatter {
    pub fn from_config(config: FormatterConfig) -> Self {
        match config.mode {
            Mode::Text       => Self::Text { ansi: config.stream_is_interactive },
            Mode::Structured => Self::Structured,
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Text { .. } => Mode::Text,
            Self::Structured  => Mode::Structured,
        }
    }

    pub fn render(&self, record: &LogRecord) -> String {
        match *self {
            Self::Text { ansi } => render_text(record, ansi),
            Self::Structured    => render_structured(record),
        }
    }
}

// ── Structured ────────────────────────────────────────────────────────────────

struct Structured<'a>(&'a LogRecord);

impl Serialize for Structured<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.0;
        let mut map = serializer.serialize_map(Some(RESERVED.len() + record.fields().len()))?;
        map.serialize_entry(TIMESTAMP, &wire_timestamp(record.timestamp()))?;
        map.serialize_entry(LEVEL, record.level().as_str())?;
        map.serialize_entry(LOGGER, record.logger())?;
        map.serialize_entry(MESSAGE, record.message())?;
        for (key, value) in record.fields() {
            if needs_shadow(key) {
                map.serialize_entry(&format!("{SHADOW_PREFIX}{key}"), value)?;
            } else {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

fn needs_shadow(key: &str) -> bool {
    RESERVED.contains(&key) || key.starts_with(SHADOW_PREFIX)
}

fn render_structured(record: &LogRecord) -> String {
    // Every field is already a `Value`, so this only fails on a bug in serde_json.
    serde_json::to_string(&Structured(record)).unwrap_or_else(|e| {
        let mut fallback = Fields::new();
        fallback.insert(TIMESTAMP.to_owned(), Value::String(wire_timestamp(record.timestamp())));
        fallback.insert(LEVEL.to_owned(), Value::from(Level::Error.as_str()));
        fallback.insert(LOGGER.to_owned(), Value::from(record.logger()));
        fallback.insert(MESSAGE.to_owned(), Value::String(format!("unrenderable record: {e}")));
        Value::Object(fallback).to_string()
    })
}

fn wire_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses one structured line back into a [`LogRecord`].
pub fn parse_structured(line: &str) -> Result<LogRecord, Error> {
    let value: Value = serde_json::from_str(line.trim_end())
        .map_err(|e| Error::MalformedRecord(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(Error::MalformedRecord("expected a JSON object".to_owned()));
    };

    let get = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedRecord(format!("missing string key `{key}`")))
    };

    let timestamp = DateTime::parse_from_rfc3339(get(TIMESTAMP)?)
        .map_err(|e| Error::MalformedRecord(format!("bad timestamp: {e}")))?
        .with_timezone(&Utc);
    let level = get(LEVEL)?
        .parse::<Level>()
        .map_err(|e| Error::MalformedRecord(e.to_string()))?;
    let logger = get(LOGGER)?;
    let message = get(MESSAGE)?;

    let fields: Fields = object
        .iter()
        .filter(|(key, _)| !RESERVED.contains(&key.as_str()))
        .map(|(key, value)| {
            let key = key.strip_prefix(SHADOW_PREFIX).unwrap_or(key);
            (key.to_owned(), value.clone())
        })
        .collect();

    Ok(LogRecord::at(timestamp, level, logger, message, fields))
}

// ── Text ──────────────────────────────────────────────────────────────────────

fn render_text(record: &LogRecord, ansi: bool) -> String {
    let mut line = String::with_capacity(96 + record.message().len());

    let label = format!("{:<width$}", record.level().label(), width = LEVEL_WIDTH);
    if ansi {
        line.push_str(&paint_level(record.level(), &label).to_string());
    } else {
        line.push_str(&label);
    }

    line.push_str("  ");
    line.push_str(&record.timestamp().to_rfc3339_opts(SecondsFormat::Millis, true));
    line.push_str("  ");
    let logger = escape_controls(record.logger());
    if ansi {
        line.push_str(&logger.bold().to_string());
    } else {
        line.push_str(&logger);
    }
    line.push_str(": ");
    line.push_str(&escape_controls(record.message()));

    for (i, (key, value)) in record.fields().iter().enumerate() {
        line.push_str(if i == 0 { "  " } else { " " });
        let key = text_token(key);
        if ansi {
            line.push_str(&key.cyan().to_string());
        } else {
            line.push_str(&key);
        }
        line.push('=');
        line.push_str(&text_value(value));
    }

    line
}

fn paint_level(level: Level, label: &str) -> ColoredString {
    match level {
        Level::Debug    => label.blue(),
        Level::Info     => label.green(),
        Level::Warning  => label.yellow(),
        Level::Error    => label.red(),
        Level::Critical => label.bright_red().bold(),
    }
}

/// Keeps the line single and the terminal state untouched.
fn escape_controls(s: &str) -> String {
    if !s.chars().any(char::is_control) {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}

/// Bare token when unambiguous, JSON string otherwise.
fn text_token(s: &str) -> String {
    if is_bare(s) {
        s.to_owned()
    } else {
        Value::from(s).to_string()
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => text_token(s),
        other => other.to_string(),
    }
}

fn is_bare(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| !c.is_whitespace() && !c.is_control() && c != '"' && c != '=')
}
