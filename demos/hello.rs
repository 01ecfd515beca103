//! The two-endpoint service from the README, with structured access logs.
//!
//! Run with:
//!   cargo run --example hello                   # text on a terminal
//!   cargo run --example hello | cat             # JSON lines when piped
//!   LOG_LEVEL=debug LOG_FORMAT=json cargo run --example hello
//!
//! Try:
//!   curl http://localhost:8000/
//!   curl 'http://localhost:8000/hello?who=Bob'
//!   curl -H 'x-request-id: trace-me' 'http://localhost:8000/hello?who=Al'

use http::StatusCode;
use serde_json::json;
use tsu_logging::{AccessLog, LogConfig, Request, Response, Router, Server};
use tsu_logging::{fields, get_logger, setup_logging};

#[tokio::main]
async fn main() -> Result<(), tsu_logging::Error> {
    setup_logging(LogConfig::from_env()?)?;

    let app = Router::new()
        .layer(AccessLog::new())
        .get("/", root)
        .get("/hello", hello);

    Server::bind(([0, 0, 0, 0], 8000).into()).serve(app).await
}

// GET /
async fn root(_req: Request) -> Response {
    get_logger(None).info("Handling root endpoint accessed", ());
    Response::json(json!({ "message": "Hello World" }).to_string())
}

// GET /hello?who=…  → 422 without `who`, like a required query parameter.
async fn hello(req: Request) -> Response {
    let Some(who) = req.query_param("who") else {
        return Response::status(StatusCode::UNPROCESSABLE_ENTITY);
    };

    get_logger(None).info(
        "log line message",
        fields! { "context_info1" => "value1", "context_info2" => "value2" },
    );
    Response::json(json!({ "message": format!("Hello {who}") }).to_string())
}
