use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::senders::NotificationTransport;
use crate::database::NotificationLog;
use crate::database::models::{MonitoredTarget, NotificationKind, NotificationRecord};

/// Signature appended to every message body
pub const DEFAULT_SIGNATURE: &str = "Watchdog Service Monitor";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Renders and sends down/recovery alerts.
///
/// Delivery is a single attempt. Failures are recorded and reported as
/// `false`, never raised.
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    log: Arc<dyn NotificationLog>,
    signature: String,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>, log: Arc<dyn NotificationLog>) -> Self {
        Self { transport, log, signature: DEFAULT_SIGNATURE.to_string() }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn channel(&self) -> &'static str {
        self.transport.channel()
    }

    pub async fn send_down(&self, target: &MonitoredTarget, error_text: &str) -> bool {
        let now = Utc::now();
        let subject = format!("Service Alert: {} is DOWN", target.name);
        let body = self.down_body(target, error_text, now);
        self.dispatch(target, NotificationKind::Down, subject, body, now).await
    }

    pub async fn send_recovery(&self, target: &MonitoredTarget) -> bool {
        let now = Utc::now();
        let subject = format!("Service Recovery: {} is UP", target.name);
        let body = self.recovery_body(target, now);
        self.dispatch(target, NotificationKind::Recovery, subject, body, now).await
    }

    fn down_body(&self, target: &MonitoredTarget, error_text: &str, at: DateTime<Utc>) -> String {
        format!(
            "Service Alert: {name} is DOWN\n\
             \n\
             Service Details:\n\
             - Name: {name}\n\
             - Host: {host}\n\
             - Port: {port}\n\
             - Description: {description}\n\
             - Error: {error_text}\n\
             - Time: {time}\n\
             \n\
             Please investigate and resolve the issue as soon as possible.\n\
             \n\
             --\n\
             {signature}",
            name = target.name,
            host = target.host,
            port = target.port,
            description = target.description.as_deref().unwrap_or("None"),
            time = at.format(TIME_FORMAT),
            signature = self.signature,
        )
    }

    fn recovery_body(&self, target: &MonitoredTarget, at: DateTime<Utc>) -> String {
        format!(
            "Service Recovery: {name} is now UP\n\
             \n\
             Service Details:\n\
             - Name: {name}\n\
             - Host: {host}\n\
             - Port: {port}\n\
             - Description: {description}\n\
             - Recovery Time: {time}\n\
             \n\
             The service has recovered and is now responding normally.\n\
             \n\
             --\n\
             {signature}",
            name = target.name,
            host = target.host,
            port = target.port,
            description = target.description.as_deref().unwrap_or("None"),
            time = at.format(TIME_FORMAT),
            signature = self.signature,
        )
    }

    async fn dispatch(
        &self,
        target: &MonitoredTarget,
        kind: NotificationKind,
        subject: String,
        body: String,
        sent_at: DateTime<Utc>,
    ) -> bool {
        let Some(target_id) = target.id else {
            warn!(name = %target.name, %kind, "Refusing to notify for an unsaved target");
            return false;
        };

        let delivery = self.transport.deliver(&target.recipient, &subject, &body).await;
        let (success, error_message) = match delivery {
            Ok(()) => {
                info!(target_id, %kind, recipient = %target.recipient, "Notification sent");
                (true, None)
            }
            Err(e) => {
                warn!(target_id, %kind, recipient = %target.recipient, "Notification failed: {e}");
                (false, Some(e.to_string()))
            }
        };

        let record = NotificationRecord {
            id: None,
            target_id,
            kind,
            channel: self.transport.channel().to_string(),
            recipient: target.recipient.clone(),
            subject,
            body,
            sent_at,
            success,
            error_message,
        };

        if let Err(e) = self.log.record_notification(&record).await {
            error!(target_id, %kind, "Failed to record notification: {e:#}");
        }

        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::notifications::senders::TransportError;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        fail: bool,
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl NotificationTransport for RecordingTransport {
        fn channel(&self) -> &'static str {
            "test"
        }

        async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError> {
            self.sent.lock().await.push((recipient.into(), subject.into(), body.into()));
            if self.fail {
                Err(TransportError::SendFailed("mailbox unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn target() -> MonitoredTarget {
        let mut target = MonitoredTarget::new("api", "10.0.0.5", 8080, "http", "ops@example.com");
        target.id = Some(7);
        target
    }

    #[tokio::test]
    async fn test_send_down_renders_and_records() {
        let _ = tracing_subscriber::fmt::try_init();
        let transport = Arc::new(RecordingTransport::default());
        let store = Arc::new(MemoryStore::new());
        let dispatcher = NotificationDispatcher::new(transport.clone(), store.clone());

        assert!(dispatcher.send_down(&target(), "HTTP 500: Internal Server Error").await);

        let sent = transport.sent.lock().await;
        let (recipient, subject, body) = &sent[0];
        assert_eq!(recipient, "ops@example.com");
        assert_eq!(subject, "Service Alert: api is DOWN");
        assert!(body.contains("- Host: 10.0.0.5"));
        assert!(body.contains("- Port: 8080"));
        assert!(body.contains("- Description: None"));
        assert!(body.contains("- Error: HTTP 500: Internal Server Error"));
        assert!(body.ends_with("--\nWatchdog Service Monitor"));

        let records = store.notifications_for(7).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, NotificationKind::Down);
        assert_eq!(records[0].channel, "test");
        assert!(records[0].success);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_recorded_not_raised() {
        let _ = tracing_subscriber::fmt::try_init();
        let transport = Arc::new(RecordingTransport { fail: true, ..Default::default() });
        let store = Arc::new(MemoryStore::new());
        let dispatcher = NotificationDispatcher::new(transport, store.clone())
            .with_signature("Ops Team");

        let target = target().with_description("public API");
        assert!(!dispatcher.send_recovery(&target).await);

        let records = store.notifications_for(7).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, NotificationKind::Recovery);
        assert_eq!(records[0].subject, "Service Recovery: api is UP");
        assert!(records[0].body.contains("- Description: public API"));
        assert!(records[0].body.contains("responding normally"));
        assert!(records[0].body.ends_with("--\nOps Team"));
        assert!(!records[0].success);
        assert!(records[0].error_message.as_deref().unwrap().contains("mailbox unavailable"));
    }
}
