//! Exercises the process-wide registry. Kept to a single test so nothing
//! else in this binary races on the global configuration.

use serde_json::json;
use tsu_logging::{
    Capture, FormatChoice, Level, LogConfig, Mode, Stream, fields, get_logger, global, setup_logging,
    with_context_sync,
};

#[test]
fn setup_logging_is_idempotent_and_bridges_tracing() {
    let first = Capture::new();
    let config = LogConfig::default().level(Level::Debug).stream(Stream::Capture(first.clone()));
    setup_logging(config.clone()).unwrap();
    setup_logging(config).unwrap();

    let log = get_logger(None);
    log.debug("debug visible", fields! { "n" => 1 });
    with_context_sync(fields! { "request_id" => "g-1" }, || {
        tracing::info!(target: "tsu::server", "from tracing");
    });

    let records = first.records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].logger(), "app");
    assert_eq!(records[1].logger(), "tsu::server");
    assert_eq!(records[1].field("request_id"), Some(&json!("g-1")));

    // Reconfigure: the earlier handle follows, the old stream goes quiet.
    let second = Capture::interactive();
    let text = LogConfig::default().stream(Stream::Capture(second.clone())).format(FormatChoice::Auto);
    setup_logging(text).unwrap();
    assert_eq!(global().formatter_config().mode, Mode::Text);

    log.info("plain text", fields! { "user" => "bob" });
    log.debug("filtered", ());

    assert_eq!(first.lines().len(), 2);
    let lines = second.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("plain text"));
    assert!(lines[0].contains("user"));

    assert!(setup_logging(LogConfig::default().stream(Stream::File("/nonexistent-dir/x.log".into()))).is_err());
}
