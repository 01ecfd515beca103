//! # tsu-logging
//!
//! Structured logging for tsu HTTP services, plus an access-log middleware
//! that writes one record per request.
//!
//! ## The contract
//!
//! - **One line per record.** Colorized text on a terminal, a JSON object
//!   everywhere else. The choice is made once, at [`setup_logging`].
//! - **Ambient context.** Fields bound to a request follow it across
//!   `.await` points and never leak into a concurrent request.
//! - **One access record per request.** This holds whether the handler
//!   returns, panics or is cancelled.
//! - **Logging never fails the request.** Unserializable values become
//!   strings and write errors are dropped.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tsu_logging::{AccessLog, LogConfig, Request, Response, Router, Server};
//! use tsu_logging::{fields, get_logger, setup_logging};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsu_logging::Error> {
//!     // Text if stdout is a terminal, JSON lines if not.
//!     setup_logging(LogConfig::from_env()?)?;
//!
//!     let app = Router::new()
//!         .layer(AccessLog::new())
//!         .get("/hello", hello);
//!
//!     Server::bind(([0, 0, 0, 0], 8000).into()).serve(app).await
//! }
//!
//! async fn hello(req: Request) -> Response {
//!     // Carries request_id, method, path and client_addr automatically.
//!     get_logger(None).info("saying hello", fields! { "who" => req.query_param("who") });
//!     Response::text("hello")
//! }
//! ```

mod bridge;
mod config;
mod error;
mod format;
mod handler;
mod level;
mod logger;
mod record;
mod request;
mod response;
mod router;
mod server;
mod sink;

pub mod context;
pub mod field;
pub mod middleware;

pub use bridge::TracingBridge;
pub use config::{FORMAT_ENV, LEVEL_ENV, LogConfig, STREAM_ENV};
pub use context::{bind_context, clear_context, current_context, unbind_context, with_context, with_context_sync};
pub use error::Error;
pub use field::{Fields, IntoFields, Value};
pub use format::{FormatChoice, Formatter, FormatterConfig, Mode, parse_structured, select_formatter};
pub use handler::{BoxFuture, Handler};
pub use level::Level;
pub use logger::{DEFAULT_LOGGER, Logger, LoggerRegistry, get_logger, global, setup_logging};
pub use middleware::{AccessLog, Middleware, Next};
pub use record::LogRecord;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use sink::{Capture, Stream};
