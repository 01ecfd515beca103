//! Output streams.
//!
//! A [`Sink`] is the one shared write resource of a pipeline. Each record is
//! written with a single `write_all` under a mutex, so concurrent emitters
//! never interleave bytes within a line. Write errors are dropped.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Error;
use crate::format::parse_structured;
use crate::record::LogRecord;

/// Where records go.
#[derive(Clone, Debug, Default)]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
    /// Appended to; created if missing. The parent directory must exist.
    File(PathBuf),
    /// In-memory buffer, for tests and embedding.
    Capture(Capture),
}

/// `stdout`, `stderr`, or anything else as a file path.
impl FromStr for Stream {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ""               => Err(Error::InvalidStream(s.to_owned())),
            "stdout" | "-"   => Ok(Self::Stdout),
            "stderr"         => Ok(Self::Stderr),
            path             => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

// ── Capture ───────────────────────────────────────────────────────────────────

/// A cloneable in-memory stream. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    interactive: bool,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capture that reports itself as a terminal, for exercising text mode.
    pub fn interactive() -> Self {
        Self { interactive: true, ..Self::default() }
    }

    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    /// Parses every captured line as a structured record.
    pub fn records(&self) -> Result<Vec<LogRecord>, Error> {
        self.lines().iter().map(|line| parse_structured(line)).collect()
    }

    pub fn clear(&self) {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Write for Capture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Sink ──────────────────────────────────────────────────────────────────────

pub(crate) struct Sink {
    writer: Mutex<Box<dyn Write + Send>>,
    interactive: bool,
}

impl Sink {
    pub(crate) fn new(writer: Box<dyn Write + Send>, interactive: bool) -> Self {
        Self { writer: Mutex::new(writer), interactive }
    }

    /// Opens the stream. Failing to open a log file is a configuration error.
    pub(crate) fn open(stream: &Stream) -> Result<Self, Error> {
        let sink = match stream {
            Stream::Stdout => Self::stdout(),
            Stream::Stderr => {
                let err = io::stderr();
                let tty = err.is_terminal();
                Self::new(Box::new(err), tty)
            }
            Stream::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| Error::OpenLogFile { path: path.clone(), source })?;
                Self::new(Box::new(file), false)
            }
            Stream::Capture(capture) => Self::new(Box::new(capture.clone()), capture.interactive),
        };
        Ok(sink)
    }

    /// The standard output sink; opening it cannot fail.
    pub(crate) fn stdout() -> Self {
        let out = io::stdout();
        let interactive = out.is_terminal();
        Self::new(Box::new(out), interactive)
    }

    pub(crate) fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Appends `line` plus a newline as one write.
    pub(crate) fn write_line(&self, line: &str) {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.write_all(&buf).and_then(|()| writer.flush());
    }
}
