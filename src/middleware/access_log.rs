//! Access logging: exactly one structured record per request.
//!
//! # Lifecycle
//!
//! ```text
//! request ─▶ resolve request_id ─▶ enter context scope {request_id, method, path, client_addr}
//!         ─▶ first poll: start timer ─▶ next.run(req)
//!                             ├─ returns    ─▶ emit(status)                 ─▶ response (+ x-request-id)
//!                             ├─ panics     ─▶ emit(500, error=<message>)   ─▶ resume the panic
//!                             └─ is dropped ─▶ emit(499, error=cancelled) from the drop guard
//! ```
//!
//! The emission guard is built before the request future is first polled
//! and is consumed by its first `finish`, so each of the three exits
//! produces one record and nothing produces a second.
//!
//! Every log call made by the handler runs inside the scope and carries the
//! same `request_id`. Fields the handler binds with
//! [`bind_context`](crate::bind_context) also appear on the access record.
//!
//! # Record
//!
//! ```text
//! {"timestamp":"…","level":"info","logger":"http.access",
//!  "message":"127.0.0.1:52100 - \"GET /hello?who=Bob HTTP/1.1\" 200",
//!  "request_id":"…","method":"GET","path":"/hello","client_addr":"127.0.0.1:52100",
//!  "query":"who=Bob","http_version":"HTTP/1.1","status_code":200,"duration_ms":0.412}
//! ```
//!
//! Level follows status: `info` below 400, `warning` for 4xx, `error` for 5xx.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use http::{HeaderName, HeaderValue, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use crate::context::with_context;
use crate::field::Fields;
use crate::handler::BoxFuture;
use crate::level::Level;
use crate::logger::{Logger, get_logger};
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// Logger name used by [`AccessLog::new`].
pub const ACCESS_LOGGER: &str = "http.access";

/// Default correlation header, read on the way in and echoed on the way out.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest inbound request id that is trusted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Nginx's "client closed request".
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// The access-log middleware.
///
/// ```rust,no_run
/// use tsu_logging::{AccessLog, Router};
///
/// let app = Router::new().layer(AccessLog::new());
/// ```
#[derive(Clone, Debug)]
pub struct AccessLog {
    logger: Logger,
    header: HeaderName,
    echo: bool,
}

impl AccessLog {
    /// Logs through the process-wide `http.access` logger.
    pub fn new() -> Self {
        Self::with_logger(get_logger(Some(ACCESS_LOGGER)))
    }

    pub fn with_logger(logger: Logger) -> Self {
        Self { logger, header: HeaderName::from_static(REQUEST_ID_HEADER), echo: true }
    }

    /// Reads and echoes the request id under a different header name.
    pub fn request_id_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// Whether the request id is set on the response. On by default.
    pub fn echo_request_id(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for AccessLog {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let request = RequestInfo::observe(&req, &self.header);
        let request_id = request.request_id.clone();
        let scope = request.scope_fields();
        let echo = self.echo.then(|| self.header.clone());

        // Built outside the async block: a future dropped before its first
        // poll must still emit.
        let mut emission = Emission::start(self.logger.clone(), request);

        Box::pin(with_context(scope, async move {
            emission.restart_clock();
            match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                Ok(mut res) => {
                    emission.finish(Outcome::Responded(res.status_code()));
                    if let Some(header) = echo {
                        if let Ok(value) = HeaderValue::from_str(&request_id) {
                            res.headers_mut().insert(header, value);
                        }
                    }
                    res
                }
                Err(payload) => {
                    emission.finish(Outcome::Panicked(panic_message(payload.as_ref())));
                    panic::resume_unwind(payload)
                }
            }
        }))
    }
}

// ── Request id ────────────────────────────────────────────────────────────────

/// Reuses a sane inbound id, otherwise mints a UUID v4.
fn resolve_request_id(inbound: Option<&HeaderValue>) -> String {
    inbound
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| is_valid_request_id(id))
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Bounded and free of whitespace or control bytes, so it cannot break a
/// text-mode line or a response header.
fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN && id.bytes().all(|b| b.is_ascii_graphic())
}

// ── Event ─────────────────────────────────────────────────────────────────────

/// What is known about a request before the handler runs.
#[derive(Debug)]
struct RequestInfo {
    request_id: String,
    method: String,
    path: String,
    query: Option<String>,
    http_version: String,
    client_addr: Option<SocketAddr>,
    forwarded_for: Option<String>,
    user_agent: Option<String>,
}

impl RequestInfo {
    fn observe(req: &Request, id_header: &HeaderName) -> Self {
        Self {
            request_id: resolve_request_id(req.headers().get(id_header)),
            method: req.method().as_str().to_owned(),
            path: req.path().to_owned(),
            query: req.query().map(str::to_owned),
            http_version: format!("{:?}", req.version()),
            client_addr: req.remote_addr(),
            forwarded_for: req
                .header("x-forwarded-for")
                .and_then(|chain| chain.split(',').next())
                .map(|ip| ip.trim().to_owned())
                .filter(|ip| !ip.is_empty()),
            user_agent: req.header("user-agent").map(str::to_owned),
        }
    }

    /// Fields visible to every log call made while the request is handled.
    fn scope_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("request_id".to_owned(), Value::from(self.request_id.as_str()));
        fields.insert("method".to_owned(), Value::from(self.method.as_str()));
        fields.insert("path".to_owned(), Value::from(self.path.as_str()));
        if let Some(addr) = self.client_addr {
            fields.insert("client_addr".to_owned(), Value::String(addr.to_string()));
        }
        fields
    }
}

enum Outcome {
    Responded(StatusCode),
    Panicked(String),
    Cancelled,
}

/// One finished request, as reported by the access record.
#[derive(Debug)]
struct AccessLogEvent {
    request: RequestInfo,
    status_code: u16,
    duration_ms: f64,
    error: Option<String>,
}

impl AccessLogEvent {
    fn new(request: RequestInfo, outcome: Outcome, elapsed: Duration) -> Self {
        let (status_code, error) = match outcome {
            Outcome::Responded(status) => (status.as_u16(), None),
            Outcome::Panicked(message) => (StatusCode::INTERNAL_SERVER_ERROR.as_u16(), Some(message)),
            Outcome::Cancelled => (CLIENT_CLOSED_REQUEST, Some("request cancelled".to_owned())),
        };
        // Microsecond resolution, expressed in milliseconds.
        let duration_ms = (elapsed.as_secs_f64() * 1_000_000.0).round() / 1_000.0;
        Self { request, status_code, duration_ms, error }
    }

    fn level(&self) -> Level {
        match self.status_code {
            500.. => Level::Error,
            400..=499 => Level::Warning,
            _ => Level::Info,
        }
    }

    /// `client - "METHOD target VERSION" status`, as servers traditionally log it.
    fn message(&self) -> String {
        let r = &self.request;
        let client = r.client_addr.map_or_else(|| "-".to_owned(), |addr| addr.to_string());
        let target = match &r.query {
            Some(query) => format!("{}?{query}", r.path),
            None => r.path.clone(),
        };
        format!("{client} - \"{} {target} {}\" {}", r.method, r.http_version, self.status_code)
    }

    fn fields(&self) -> Fields {
        let r = &self.request;
        let mut fields = r.scope_fields();
        if let Some(query) = &r.query {
            fields.insert("query".to_owned(), Value::from(query.as_str()));
        }
        fields.insert("http_version".to_owned(), Value::from(r.http_version.as_str()));
        fields.insert("status_code".to_owned(), Value::from(self.status_code));
        fields.insert("duration_ms".to_owned(), Value::from(self.duration_ms));
        if let Some(ip) = &r.forwarded_for {
            fields.insert("forwarded_for".to_owned(), Value::from(ip.as_str()));
        }
        if let Some(agent) = &r.user_agent {
            fields.insert("user_agent".to_owned(), Value::from(agent.as_str()));
        }
        if let Some(error) = &self.error {
            fields.insert("error".to_owned(), Value::from(error.as_str()));
        }
        fields
    }
}

// ── Emission guard ────────────────────────────────────────────────────────────

struct Emission {
    logger: Logger,
    request: Option<RequestInfo>,
    started: Instant,
}

impl Emission {
    fn start(logger: Logger, request: RequestInfo) -> Self {
        Self { logger, request: Some(request), started: Instant::now() }
    }

    /// Measures from the first poll. A never-polled request keeps the
    /// construction instant.
    fn restart_clock(&mut self) {
        self.started = Instant::now();
    }

    fn finish(&mut self, outcome: Outcome) {
        let Some(request) = self.request.take() else {
            return;
        };
        let event = AccessLogEvent::new(request, outcome, self.started.elapsed());
        self.logger.log(event.level(), event.message(), event.fields());
    }
}

impl Drop for Emission {
    fn drop(&mut self) {
        self.finish(Outcome::Cancelled);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}
