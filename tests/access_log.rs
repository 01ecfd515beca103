use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde_json::json;
use tsu_logging::{
    AccessLog, Capture, Level, LogConfig, LogRecord, LoggerRegistry, Request, Response, Router, Stream,
    bind_context, fields,
};

struct Harness {
    app: Arc<Router>,
    capture: Capture,
    _registry: LoggerRegistry,
}

impl Harness {
    fn new() -> Self {
        let capture = Capture::new();
        let config = LogConfig::default().stream(Stream::Capture(capture.clone()));
        let registry = LoggerRegistry::new(&config).unwrap();

        let log = registry.logger("app");
        let hello = move |req: Request| {
            let log = log.clone();
            async move {
                let who = req.query_param("who").unwrap_or("world").to_owned();
                log.info("log line message", fields! { "context_info1" => "value1", "context_info2" => "value2" });
                Response::text(format!("Hello {who}"))
            }
        };

        let log = registry.logger("app");
        let work = move |req: Request| {
            let log = log.clone();
            async move {
                let n = req.query_param("n").unwrap_or("?").to_owned();
                for _ in 0..3 {
                    tokio::task::yield_now().await;
                }
                log.info("working", fields! { "n" => n });
                bind_context(fields! { "bound" => n });
                tokio::task::yield_now().await;
                log.info("done", ());
                Response::text(n)
            }
        };

        let app = Router::new()
            .layer(AccessLog::with_logger(registry.logger("http.access")))
            .get("/hello", hello)
            .get("/work", work)
            .get("/boom", boom)
            .get("/hang", hang)
            .get("/login", login);

        Self { app: Arc::new(app), capture, _registry: registry }
    }

    async fn send(&self, req: Request) -> Response {
        Arc::clone(&self.app).call(req).await
    }

    fn records(&self) -> Vec<LogRecord> {
        self.capture.records().unwrap()
    }

    fn access_records(&self) -> Vec<LogRecord> {
        self.records().into_iter().filter(|r| r.logger() == "http.access").collect()
    }
}

async fn boom(_req: Request) -> Response {
    panic!("boom")
}

async fn hang(_req: Request) -> Response {
    std::future::pending::<()>().await;
    Response::text("unreachable")
}

async fn login(_req: Request) -> Response {
    bind_context(fields! { "user" => "alice" });
    Response::status(StatusCode::NO_CONTENT)
}

fn get(uri: &'static str) -> Request {
    Request::new(Method::GET, Uri::from_static(uri)).with_remote_addr("127.0.0.1:52100".parse().unwrap())
}

#[tokio::test]
async fn hello_without_correlation_header() {
    let h = Harness::new();
    let res = h.send(get("/hello?who=Bob")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.body(), b"Hello Bob");

    let records = h.records();
    assert_eq!(records.len(), 2);
    let (app, access) = (&records[0], &records[1]);

    let request_id = access.field("request_id").and_then(|v| v.as_str()).unwrap().to_owned();
    assert!(uuid::Uuid::parse_str(&request_id).is_ok());
    assert_eq!(res.headers()["x-request-id"], request_id.as_str());

    assert_eq!(app.logger(), "app");
    assert_eq!(app.message(), "log line message");
    assert_eq!(app.field("request_id"), Some(&json!(request_id)));
    assert_eq!(app.field("context_info1"), Some(&json!("value1")));
    assert_eq!(app.field("path"), Some(&json!("/hello")));

    assert_eq!(access.logger(), "http.access");
    assert_eq!(access.level(), Level::Info);
    assert_eq!(access.message(), r#"127.0.0.1:52100 - "GET /hello?who=Bob HTTP/1.1" 200"#);
    assert_eq!(access.field("method"), Some(&json!("GET")));
    assert_eq!(access.field("path"), Some(&json!("/hello")));
    assert_eq!(access.field("query"), Some(&json!("who=Bob")));
    assert_eq!(access.field("status_code"), Some(&json!(200)));
    assert_eq!(access.field("client_addr"), Some(&json!("127.0.0.1:52100")));
    assert!(access.field("duration_ms").and_then(|v| v.as_f64()).unwrap() >= 0.0);
}

#[tokio::test]
async fn inbound_request_id_is_reused() {
    let h = Harness::new();
    let req = get("/hello?who=Al")
        .with_header(HeaderName::from_static("x-request-id"), HeaderValue::from_static("trace-me"));
    let res = h.send(req).await;

    assert_eq!(res.headers()["x-request-id"], "trace-me");
    for record in h.records() {
        assert_eq!(record.field("request_id"), Some(&json!("trace-me")));
    }
}

#[tokio::test]
async fn custom_header_and_no_echo() {
    let capture = Capture::new();
    let registry = LoggerRegistry::new(&LogConfig::default().stream(Stream::Capture(capture.clone()))).unwrap();
    let access = AccessLog::with_logger(registry.logger("http.access"))
        .request_id_header(HeaderName::from_static("x-correlation-id"))
        .echo_request_id(false);
    let app = Arc::new(Router::new().layer(access));

    let req = get("/").with_header(HeaderName::from_static("x-correlation-id"), HeaderValue::from_static("c-1"));
    let res = app.call(req).await;

    assert!(res.headers().get("x-correlation-id").is_none());
    assert_eq!(capture.records().unwrap()[0].field("request_id"), Some(&json!("c-1")));
}

#[tokio::test]
async fn unmatched_route_logs_once_as_warning() {
    let h = Harness::new();
    let res = h.send(get("/nope")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

    let access = h.access_records();
    assert_eq!(h.records().len(), 1);
    assert_eq!(access[0].level(), Level::Warning);
    assert_eq!(access[0].field("status_code"), Some(&json!(404)));
}

#[tokio::test]
async fn panic_is_logged_once_and_propagates_unchanged() {
    let h = Harness::new();
    let outcome = AssertUnwindSafe(h.send(get("/boom"))).catch_unwind().await;

    let payload = outcome.err().expect("panic must reach the caller");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));

    let access = h.access_records();
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].level(), Level::Error);
    assert_eq!(access[0].field("status_code"), Some(&json!(500)));
    assert_eq!(access[0].field("error"), Some(&json!("boom")));
}

#[tokio::test]
async fn cancelled_request_is_logged_once() {
    let h = Harness::new();
    let timed_out = tokio::time::timeout(Duration::from_millis(20), h.send(get("/hang"))).await;
    assert!(timed_out.is_err());

    let access = h.access_records();
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].field("status_code"), Some(&json!(499)));
    assert_eq!(access[0].field("error"), Some(&json!("request cancelled")));
}

#[tokio::test]
async fn never_polled_request_is_logged_once() {
    let h = Harness::new();
    let fut = Arc::clone(&h.app).call(get("/hello?who=Bob"));
    drop(fut);

    let access = h.access_records();
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].field("status_code"), Some(&json!(499)));
}

#[tokio::test]
async fn duration_excludes_time_before_first_poll() {
    let h = Harness::new();
    let fut = Arc::clone(&h.app).call(get("/hello?who=Bob"));
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(fut.await.status_code(), StatusCode::OK);

    let access = h.access_records();
    let duration_ms = access[0].field("duration_ms").and_then(|v| v.as_f64()).unwrap();
    assert!(duration_ms < 80.0, "measured {duration_ms}ms");
}

#[tokio::test]
async fn handler_bound_fields_reach_the_access_record() {
    let h = Harness::new();
    h.send(get("/login")).await;

    let access = h.access_records();
    assert_eq!(access[0].field("user"), Some(&json!("alice")));
    assert_eq!(access[0].field("status_code"), Some(&json!(204)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_share_context() {
    let h = Harness::new();

    let handles: Vec<_> = (0..64)
        .map(|n| {
            let uri: Uri = format!("/work?n={n}").parse().unwrap();
            let id = HeaderValue::from_str(&format!("req-{n}")).unwrap();
            let req = Request::new(Method::GET, uri).with_header(HeaderName::from_static("x-request-id"), id);
            tokio::spawn(Arc::clone(&h.app).call(req))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().status_code(), StatusCode::OK);
    }

    let records = h.records();
    assert_eq!(records.len(), 64 * 3);
    assert_eq!(h.access_records().len(), 64);

    for record in records.iter().filter(|r| r.message() == "working") {
        let n = record.field("n").and_then(|v| v.as_str()).unwrap();
        assert_eq!(record.field("request_id"), Some(&json!(format!("req-{n}"))));
    }
    for record in records.iter().filter(|r| r.message() == "done") {
        let id = record.field("request_id").and_then(|v| v.as_str()).unwrap();
        let bound = record.field("bound").and_then(|v| v.as_str()).unwrap();
        assert_eq!(id, format!("req-{bound}"));
    }
}
