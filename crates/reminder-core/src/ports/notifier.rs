//! NotificationProvider port - email / SMS transport
//!
//! The transport itself (SMTP, SMS gateway) lives outside this crate; the
//! dispatcher only sees this trait.

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failure reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("recipient rejected: {0}")]
    Recipient(String),
}

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ProviderError>;

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ProviderError>;
}
