//! Unified error type.

use std::path::PathBuf;

/// The error type returned by the crate's fallible operations.
///
/// Logging itself never fails: serialization problems fall back to strings
/// and sink write failures are dropped. What does surface is configuration
/// (bad level names, unopenable log files) and server infrastructure
/// (binding to a port).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid log level `{0}` (expected debug, info, warning, error or critical)")]
    InvalidLevel(String),

    #[error("invalid log format `{0}` (expected auto, text or json)")]
    InvalidFormat(String),

    #[error("invalid log stream `{0}` (expected stdout, stderr or a file path)")]
    InvalidStream(String),

    #[error("cannot open log file {}: {source}", .path.display())]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed structured record: {0}")]
    MalformedRecord(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
