//! The structured log record.

use chrono::{DateTime, Utc};

use crate::field::Fields;
use crate::level::Level;

/// One log emission: standard fields plus merged context.
///
/// Built fresh for every call and never mutated afterwards; the accessors
/// are the only way to read it.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: Level,
    logger: String,
    message: String,
    fields: Fields,
}

impl LogRecord {
    /// A record stamped with the current time.
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>, fields: Fields) -> Self {
        Self::at(Utc::now(), level, logger, message, fields)
    }

    /// A record with an explicit timestamp.
    pub fn at(
        timestamp: DateTime<Utc>,
        level: Level,
        logger: impl Into<String>,
        message: impl Into<String>,
        fields: Fields,
    ) -> Self {
        Self { timestamp, level, logger: logger.into(), message: message.into(), fields }
    }

    /// Merges the ambient context with the call-site fields.
    ///
    /// Call-site fields win on key collision.
    pub(crate) fn compose(
        level: Level,
        logger: &str,
        message: impl Into<String>,
        ambient: Fields,
        explicit: Fields,
    ) -> Self {
        let mut fields = ambient;
        fields.extend(explicit);
        Self::new(level, logger, message, fields)
    }

    pub fn timestamp(&self) -> DateTime<Utc> { self.timestamp }
    pub fn level(&self) -> Level { self.level }
    pub fn logger(&self) -> &str { &self.logger }
    pub fn message(&self) -> &str { &self.message }
    pub fn fields(&self) -> &Fields { &self.fields }

    /// Shorthand for `fields().get(key)`.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }
}
