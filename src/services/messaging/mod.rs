pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;

    /// False when no credentials are configured; callers skip the channel.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stand-in used when SMS credentials are missing.
pub struct DisabledMessaging;

#[async_trait]
impl MessagingProvider for DisabledMessaging {
    async fn send_message(&self, to: &str, _body: &str) -> anyhow::Result<()> {
        tracing::debug!(to, "SMS disabled, dropping message");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Normalises a phone number to E.164, assuming a US number when no country
/// code is given. Returns `None` for fewer than ten digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 10 {
        return None;
    }

    if raw.trim_start().starts_with('+') {
        return Some(format!("+{digits}"));
    }

    match digits.len() {
        11 if digits.starts_with('1') => Some(format!("+{digits}")),
        _ => Some(format!("+1{digits}")),
    }
}
