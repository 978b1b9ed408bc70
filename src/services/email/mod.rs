pub mod smtp;

use async_trait::async_trait;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stand-in used when SMTP is not configured.
pub struct DisabledEmail;

#[async_trait]
impl EmailProvider for DisabledEmail {
    async fn send_email(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        tracing::debug!(to, subject, "email disabled, dropping message");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
