//! Webhook delivery and the dispatcher audit trail

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{HangingServer, HttpStub, closed_port, request_body};
use watchdog_service::database::MemoryStore;
use watchdog_service::database::models::{MonitoredTarget, NotificationKind};
use watchdog_service::notifications::{NotificationDispatcher, NotificationTransport, TransportError, WebhookTransport};

fn target() -> MonitoredTarget {
    let mut target = MonitoredTarget::new("billing", "10.1.2.3", 443, "https", "oncall@example.com")
        .with_description("payment gateway");
    target.id = Some(1);
    target
}

#[tokio::test]
async fn test_webhook_posts_json() {
    let _ = tracing_subscriber::fmt::try_init();
    let sink = HttpStub::start(204).await;
    let transport = WebhookTransport::new(&sink.url("/alerts"), Duration::from_secs(2)).unwrap();

    transport.deliver("oncall@example.com", "Service Alert: billing is DOWN", "body text").await.unwrap();

    let requests = sink.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("POST /alerts HTTP/1.1"));
    assert!(requests[0].to_ascii_lowercase().contains("content-type: application/json"));

    let payload: serde_json::Value = serde_json::from_str(request_body(&requests[0])).unwrap();
    assert_eq!(payload["recipient"], "oncall@example.com");
    assert_eq!(payload["subject"], "Service Alert: billing is DOWN");
    assert_eq!(payload["body"], "body text");
}

#[tokio::test]
async fn test_webhook_failures() {
    let sink = HttpStub::start(500).await;
    let transport = WebhookTransport::new(&sink.url("/alerts"), Duration::from_secs(2)).unwrap();
    let result = transport.deliver("a@example.com", "subject", "body").await;
    assert!(matches!(result, Err(TransportError::SendFailed(message)) if message.contains("500")));

    let port = closed_port().await;
    let transport = WebhookTransport::new(&format!("http://127.0.0.1:{port}/"), Duration::from_secs(2)).unwrap();
    let result = transport.deliver("a@example.com", "subject", "body").await;
    assert!(matches!(result, Err(TransportError::NetworkError(_))));
}

#[tokio::test]
async fn test_dispatcher_records_webhook_outcomes() {
    let _ = tracing_subscriber::fmt::try_init();
    let store = Arc::new(MemoryStore::new());

    let sink = HttpStub::start(200).await;
    let webhook = Arc::new(WebhookTransport::new(&sink.url("/"), Duration::from_secs(2)).unwrap());
    let dispatcher = NotificationDispatcher::new(webhook, store.clone());
    assert!(dispatcher.send_down(&target(), "Timeout connecting to 10.1.2.3:443").await);

    // A transport that never answers is bounded by its own timeout
    let hanging = HangingServer::start().await;
    let slow = Arc::new(
        WebhookTransport::new(&format!("http://127.0.0.1:{}/", hanging.port), Duration::from_millis(300)).unwrap(),
    );
    let dispatcher = NotificationDispatcher::new(slow, store.clone());
    assert!(!dispatcher.send_recovery(&target()).await);

    let records = store.notifications_for(1).await;
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].kind, NotificationKind::Down);
    assert_eq!(records[0].channel, "webhook");
    assert_eq!(records[0].recipient, "oncall@example.com");
    assert!(records[0].success);
    assert!(records[0].body.contains("- Description: payment gateway"));
    assert!(records[0].body.contains("- Error: Timeout connecting to 10.1.2.3:443"));
    assert!(records[0].body.contains(" UTC\n"));

    assert_eq!(records[1].kind, NotificationKind::Recovery);
    assert!(!records[1].success);
    assert!(records[1].error_message.is_some());
}
