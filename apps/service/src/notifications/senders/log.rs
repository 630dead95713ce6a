use async_trait::async_trait;
use tracing::info;

use super::{NotificationTransport, TransportError};

/// Writes notifications to the log instead of sending them anywhere.
///
/// Used when no outbound transport is configured.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        info!(recipient, subject, "Notification:\n{body}");
        Ok(())
    }
}
