use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{NotifyError, Notifier};

#[derive(Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub sender: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("sender", &self.sender)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    address: &'a str,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    sender: &'a str,
    to: Vec<Recipient<'a>>,
    subject: &'a str,
    html: &'a str,
}

/// Sends mail through an HTTP mail API that accepts a JSON message.
pub struct HttpEmailNotifier {
    client: Client,
    config: EmailConfig,
}

impl HttpEmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        Self { client, config }
    }
}

#[async_trait]
impl Notifier for HttpEmailNotifier {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), NotifyError> {
        let message = OutboundMessage {
            sender: &self.config.sender,
            to: vec![Recipient { address: to }],
            subject,
            html: body_html,
        };

        let mut request = self
            .client
            .post(&self.config.api_url)
            .header("User-Agent", concat!("otp-gate/", env!("CARGO_PKG_VERSION")))
            .json(&message);

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%to, status = status.as_u16(), "email provider rejected message");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(%to, %subject, "email sent");
        Ok(())
    }
}
