use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::{NotificationTransport, TransportError};

#[derive(Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Pushes notifications as JSON to an HTTP endpoint
pub struct WebhookTransport {
    client: Client,
    url: Url,
}

impl WebhookTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let url = Url::parse(url)
            .map_err(|e| TransportError::InvalidConfiguration(format!("Invalid webhook URL: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TransportError::InvalidConfiguration(format!(
                    "Unsupported webhook scheme: {other}"
                )));
            }
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        let payload = WebhookPayload { recipient, subject, body };

        let response = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(TransportError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_urls() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            WebhookTransport::new("not a url", timeout),
            Err(TransportError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            WebhookTransport::new("ftp://hooks.example.com/alert", timeout),
            Err(TransportError::InvalidConfiguration(_))
        ));
        assert!(WebhookTransport::new("https://hooks.example.com/alert", timeout).is_ok());
    }
}
