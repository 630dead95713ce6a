//! Probe strategies against local stubs

mod common;

use std::time::{Duration, Instant};

use common::{HangingServer, HttpStub, closed_port};
use watchdog_service::monitoring::{ProbeFactory, ProbeOptions, ProbeStatus};

fn options(path: &str) -> ProbeOptions {
    ProbeOptions { path: Some(path.to_string()) }
}

#[tokio::test]
async fn test_http_status_mapping() {
    let _ = tracing_subscriber::fmt::try_init();
    let stub = HttpStub::start(200).await;
    let checker =
        ProbeFactory::create("http", "127.0.0.1", stub.port, Duration::from_secs(2), &options("/health")).unwrap();

    let outcome = checker.check().await;
    assert_eq!(outcome.status, ProbeStatus::Up);
    assert!(outcome.error.is_none());
    assert!(outcome.latency_seconds().is_some());

    stub.set_status(304);
    assert_eq!(checker.check().await.status, ProbeStatus::Up);

    stub.set_status(404);
    let outcome = checker.check().await;
    assert_eq!(outcome.status, ProbeStatus::Down);
    assert_eq!(outcome.error.as_deref(), Some("HTTP 404: Not Found"));
    assert!(outcome.latency.is_some());

    stub.set_status(500);
    let outcome = checker.check().await;
    assert_eq!(outcome.error.as_deref(), Some("HTTP 500: Internal Server Error"));

    let requests = stub.requests().await;
    assert_eq!(requests.len(), 4);
    assert!(requests[0].starts_with("GET /health HTTP/1.1"));
}

#[tokio::test]
async fn test_http_connection_error() {
    let port = closed_port().await;
    let checker = ProbeFactory::create("HTTP", "127.0.0.1", port, Duration::from_secs(2), &ProbeOptions::default())
        .unwrap();

    let outcome = checker.check().await;
    assert_eq!(outcome.status, ProbeStatus::Down);
    assert_eq!(
        outcome.error.as_deref(),
        Some(format!("HTTP connection error for http://127.0.0.1:{port}/").as_str())
    );
}

#[tokio::test]
async fn test_http_timeout_is_bounded() {
    let hanging = HangingServer::start().await;
    let checker = ProbeFactory::create(
        "http",
        "127.0.0.1",
        hanging.port,
        Duration::from_millis(500),
        &ProbeOptions::default(),
    )
    .unwrap();

    let start = Instant::now();
    let outcome = checker.check().await;
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.status, ProbeStatus::Down);
    assert_eq!(
        outcome.error.as_deref(),
        Some(format!("HTTP timeout for http://127.0.0.1:{}/", hanging.port).as_str())
    );
}

#[tokio::test]
async fn test_https_against_plain_listener_is_down() {
    // TLS handshake against a plain HTTP server fails without hanging
    let stub = HttpStub::start(200).await;
    let checker = ProbeFactory::create("https", "127.0.0.1", stub.port, Duration::from_secs(2), &ProbeOptions::default())
        .unwrap();

    let outcome = checker.check().await;
    assert_eq!(outcome.status, ProbeStatus::Down);
    assert!(outcome.error.is_some());
}

#[tokio::test]
async fn test_tcp_refused() {
    let port = closed_port().await;
    let checker = ProbeFactory::create("Tcp", "127.0.0.1", port, Duration::from_secs(2), &ProbeOptions::default())
        .unwrap();

    let outcome = checker.check().await;
    assert_eq!(outcome.status, ProbeStatus::Down);
    assert_eq!(outcome.error, Some(format!("Connection refused to 127.0.0.1:{port}")));
}

#[tokio::test]
async fn test_tcp_unreachable_is_bounded() {
    // Non-routable; sandboxes without a route may reject it right away instead
    let timeout = Duration::from_millis(500);
    let checker = ProbeFactory::create("tcp", "10.255.255.1", 81, timeout, &ProbeOptions::default()).unwrap();

    let start = Instant::now();
    let outcome = checker.check().await;
    let elapsed = start.elapsed();
    assert!(elapsed < timeout + Duration::from_millis(500));
    assert_eq!(outcome.status, ProbeStatus::Down);

    let error = outcome.error.unwrap();
    if elapsed >= timeout {
        assert_eq!(error, "Timeout connecting to 10.255.255.1:81");
    } else {
        assert!(error.contains("10.255.255.1:81"));
    }
}
