//! LogProvider - a NotificationProvider that only logs.
//!
//! Used when no real transport is wired in: the reminder shows up in the
//! log with its recipient and text, nothing leaves the process.

use async_trait::async_trait;
use tracing::info;

use crate::ports::{NotificationProvider, ProviderError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogProvider;

#[async_trait]
impl NotificationProvider for LogProvider {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ProviderError> {
        info!(channel = "email", to, subject, body, "reminder delivered to log");
        Ok(())
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ProviderError> {
        info!(channel = "sms", to, body, "reminder delivered to log");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds() {
        let provider = LogProvider;
        provider.send_email("a@x.com", "s", "b").await.unwrap();
        provider.send_sms("+1555", "b").await.unwrap();
    }
}
