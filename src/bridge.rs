//! `tracing` → pipeline bridge.
//!
//! The host server and most libraries log through `tracing` macros. This
//! layer turns each event into a [`LogRecord`] so those lines share the
//! formatter, the sink and the ambient context with [`Logger`] calls. The
//! event target becomes the logger name.
//!
//! Records from the `log` crate reach here through `tracing-log`. Their
//! metadata is normalized so the `log` target names the logger, and the
//! `log.*` bookkeeping fields are dropped.
//!
//! Level filtering happens per event against the live pipeline, never in
//! `register_callsite`, because interest is cached per callsite and would
//! outlive a reconfiguration.
//!
//! [`Logger`]: crate::Logger

use std::fmt;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_log::NormalizeEvent;
use tracing_subscriber::layer::{Context, Layer};

use crate::context::current_context;
use crate::field::Fields;
use crate::level::Level;
use crate::logger::SharedPipeline;
use crate::record::LogRecord;

/// Obtained from [`LoggerRegistry::tracing_layer`](crate::LoggerRegistry::tracing_layer).
pub struct TracingBridge {
    pipeline: SharedPipeline,
}

impl TracingBridge {
    pub(crate) fn new(pipeline: SharedPipeline) -> Self {
        Self { pipeline }
    }
}

impl<S: Subscriber> Layer<S> for TracingBridge {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let normalized = event.normalized_metadata();
        let metadata = normalized.as_ref().unwrap_or_else(|| event.metadata());
        let level = Level::from(*metadata.level());
        let pipeline = self.pipeline.load();
        if !pipeline.enabled(level) {
            return;
        }

        let mut visitor = EventVisitor { from_log: event.is_log(), ..EventVisitor::default() };
        event.record(&mut visitor);

        let record = LogRecord::compose(
            level,
            metadata.target(),
            visitor.message,
            current_context(),
            visitor.fields,
        );
        pipeline.emit(&record);
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Fields,
    from_log: bool,
}

impl EventVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        if self.from_log && field.name().starts_with("log.") {
            return;
        }
        if field.name() == "message" {
            self.message = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}
