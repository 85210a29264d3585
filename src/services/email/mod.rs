pub mod http;
pub mod templates;

use async_trait::async_trait;

pub use http::{EmailConfig, HttpEmailNotifier};
pub use templates::{otp_email, MailPurpose};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider rejected message: status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound delivery of challenge codes.
///
/// A failed send aborts the enclosing operation; a silently lost code would
/// lock the user out.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), NotifyError>;
}

/// Development notifier: writes the message to the log instead of mailing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), NotifyError> {
        tracing::info!(%to, %subject, body = %body_html, "email delivery disabled, logging message");
        Ok(())
    }
}
