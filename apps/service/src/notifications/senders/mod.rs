use async_trait::async_trait;
use thiserror::Error;

pub mod log;
pub mod webhook;

pub use log::LogTransport;
pub use webhook::WebhookTransport;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for transport: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Delivers a rendered message to a recipient.
///
/// A single attempt per call; implementations must bound their own I/O.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Name recorded as the channel of each notification
    fn channel(&self) -> &'static str;

    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError>;
}
