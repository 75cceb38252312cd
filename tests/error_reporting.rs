//! End-to-end tests for remote error reporting.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use service_observability::config::ObservanceConfig;
use service_observability::observability::sink::MemoryWriter;
use service_observability::observability::stacktrace::{Frame, Stacktrace};
use service_observability::observability::{ErrorReport, Logger, Observance};

mod common;

fn config_with_dsn(dsn: String) -> ObservanceConfig {
    let mut config = ObservanceConfig {
        app_name: "checkout".into(),
        version: Some("2.3.1".into()),
        environment: Some("staging".into()),
        ..ObservanceConfig::default()
    };
    config.error_tracking.dsn = Some(dsn);
    config.error_tracking.message_prefix = "[checkout] ".into();
    config.error_tracking.tags.insert("team".into(), "payments".into());
    config
}

fn quiet(observance: &Observance) -> MemoryWriter {
    let memory = MemoryWriter::new();
    observance.logger().set_output(Box::new(memory.clone()));
    memory
}

#[tokio::test]
async fn test_error_with_stack_reaches_collector_without_dependency_frames() {
    let collector = common::MockCollector::start().await;
    let observance = Observance::new(&config_with_dsn(collector.dsn("17"))).unwrap();
    let output = quiet(&observance);

    let trace = Stacktrace::new(vec![
        Frame::new("checkout::payment::capture", "/srv/checkout/src/payment.rs", 88),
        Frame::new(
            "tokio::runtime::task::harness::poll",
            "/home/ci/.cargo/registry/src/index.crates.io-6f17d22bba15001f/tokio-1.40.0/src/runtime/task/harness.rs",
            473,
        ),
        Frame::new("checkout::main", "/srv/checkout/src/main.rs", 12),
    ]);
    let report = ErrorReport::new("CaptureFailed", "card issuer unavailable").with_stacktrace(trace);

    observance
        .logger()
        .with_field("orderId", json!("o-551"))
        .with_error_report(report)
        .error("Payment capture failed");

    assert!(observance.flush(Duration::from_secs(5)).await);

    let events = collector.events();
    assert_eq!(events.len(), 1);
    let captured = &events[0];
    assert_eq!(captured.path_param, "17");
    assert!(captured.auth.as_deref().unwrap().contains("sentry_key=public-key"));

    let body = &captured.body;
    assert_eq!(body["level"], "error");
    assert_eq!(body["message"], "[checkout] Payment capture failed");
    assert_eq!(body["release"], "2.3.1");
    assert_eq!(body["environment"], "staging");
    assert_eq!(body["tags"]["team"], "payments");
    assert_eq!(body["extra"]["orderId"], "o-551");
    assert_eq!(body["extra"]["error"], "card issuer unavailable");

    let exception = &body["exception"]["values"][0];
    assert_eq!(exception["type"], "CaptureFailed");
    assert_eq!(exception["value"], "card issuer unavailable");
    let frames = exception["stacktrace"]["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["function"], "checkout::main");
    assert_eq!(frames[1]["function"], "checkout::payment::capture");

    assert_eq!(output.lines().len(), 1);
}

#[tokio::test]
async fn test_levels_below_error_are_not_reported() {
    let collector = common::MockCollector::start().await;
    let observance = Observance::new(&config_with_dsn(collector.dsn("1"))).unwrap();
    let output = quiet(&observance);

    observance.logger().warn("cache miss storm");
    observance.logger().info("order placed");
    assert!(observance.flush(Duration::from_secs(2)).await);

    assert!(collector.events().is_empty());
    assert_eq!(output.lines().len(), 2);
}

#[tokio::test]
async fn test_recovered_panic_is_reported() {
    let collector = common::MockCollector::start().await;
    let observance = Observance::new(&config_with_dsn(collector.dsn("1"))).unwrap();
    let output = quiet(&observance);

    let result: Option<()> = observance.recover_and_log(|| panic!("inventory index corrupted"));
    assert!(result.is_none());
    assert!(observance.flush(Duration::from_secs(5)).await);

    let events = collector.events();
    assert_eq!(events.len(), 1);
    let exception = &events[0].body["exception"]["values"][0];
    assert_eq!(exception["type"], "panic");
    assert_eq!(exception["value"], "inventory index corrupted");

    let line: Value = serde_json::from_str(&output.lines()[0]).unwrap();
    assert_eq!(line["level"], "error");
    assert!(line["stack"].as_str().is_some());
}

#[tokio::test]
async fn test_unreachable_collector_is_invisible_to_callers() {
    let addr = common::closed_addr().await;
    let observance = Observance::new(&config_with_dsn(format!("http://key@{addr}/3"))).unwrap();
    let output = quiet(&observance);

    observance.logger().error("database unreachable");
    observance.logger().error("database still unreachable");

    assert!(observance.flush(Duration::from_secs(5)).await);
    assert_eq!(output.lines().len(), 2);
}

#[tokio::test]
async fn test_flush_with_zero_timeout_returns_promptly() {
    let addr = common::closed_addr().await;
    let observance = Observance::new(&config_with_dsn(format!("http://key@{addr}/3"))).unwrap();
    quiet(&observance);

    for i in 0..20 {
        observance.logger().error(&format!("failure {i}"));
    }

    let started = Instant::now();
    observance.flush(Duration::ZERO).await;
    assert!(started.elapsed() < Duration::from_millis(250));
}
