//! Log severity as a typed enum.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Severity of a log record, ordered from least to most severe.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// Lowercase wire name, as written to the `level` key of structured records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug    => "debug",
            Self::Info     => "info",
            Self::Warning  => "warning",
            Self::Error    => "error",
            Self::Critical => "critical",
        }
    }

    /// Uppercase label used by the text renderer.
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug    => "DEBUG",
            Self::Info     => "INFO",
            Self::Warning  => "WARNING",
            Self::Error    => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Case-insensitive. Accepts `trace`, `warn` and `fatal` as aliases.
impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug"     => Ok(Self::Debug),
            "info"                => Ok(Self::Info),
            "warn" | "warning"    => Ok(Self::Warning),
            "error"               => Ok(Self::Error),
            "critical" | "fatal"  => Ok(Self::Critical),
            _                     => Err(Error::InvalidLevel(s.to_owned())),
        }
    }
}

/// `tracing` has no critical level and one more verbose level than we keep.
impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO                          => Self::Info,
            tracing::Level::WARN                          => Self::Warning,
            tracing::Level::ERROR                         => Self::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("INFO".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!(" Critical ".parse::<Level>().unwrap(), Level::Critical);
        assert_eq!("trace".parse::<Level>().unwrap(), Level::Debug);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "verbose".parse::<Level>().unwrap_err();
        assert!(matches!(err, Error::InvalidLevel(ref name) if name == "verbose"));
    }

    #[test]
    fn ordering_follows_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
    }

    #[test]
    fn maps_tracing_levels() {
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Debug);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warning);
    }
}
