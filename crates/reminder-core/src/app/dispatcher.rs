//! NotificationDispatcher - turns a reminder payload into email / SMS sends.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{Channel, DispatchResult, ReminderPayload};
use crate::ports::NotificationProvider;

/// What the scheduler calls when a job comes due.
///
/// Implementations report failure through `DispatchResult`; they must not
/// panic or retry.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, payload: &ReminderPayload) -> DispatchResult;
}

pub struct NotificationDispatcher {
    provider: Arc<dyn NotificationProvider>,
}

impl NotificationDispatcher {
    pub fn new(provider: Arc<dyn NotificationProvider>) -> Self {
        Self { provider }
    }

    pub fn subject(payload: &ReminderPayload) -> String {
        format!("Project deadline: {}", payload.project)
    }

    pub fn body(payload: &ReminderPayload) -> String {
        format!(
            "Hello {},\n\nThe deadline for your project '{}' is approaching: {}.\nGood luck!",
            payload.user,
            payload.project,
            payload.deadline.format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
impl Dispatch for NotificationDispatcher {
    /// Send on every channel the payload has a contact for.
    ///
    /// Succeeds only if all attempted channels succeeded.
    async fn dispatch(&self, payload: &ReminderPayload) -> DispatchResult {
        let subject = Self::subject(payload);
        let body = Self::body(payload);

        let mut channels = Vec::new();
        let mut errors = Vec::new();

        if let Some(to) = payload.email.as_deref() {
            channels.push(Channel::Email);
            if let Err(err) = self.provider.send_email(to, &subject, &body).await {
                errors.push(format!("email to {to}: {err}"));
            }
        }
        if let Some(to) = payload.phone.as_deref() {
            channels.push(Channel::Sms);
            if let Err(err) = self.provider.send_sms(to, &body).await {
                errors.push(format!("sms to {to}: {err}"));
            }
        }

        let task_id = payload.task_id.map(|id| id.to_string()).unwrap_or_default();
        if channels.is_empty() {
            warn!(%task_id, project = %payload.project, "reminder has no contact channel");
            return DispatchResult::failed(channels, "no contact channel configured");
        }
        if errors.is_empty() {
            info!(%task_id, project = %payload.project, ?channels, "reminder dispatched");
            DispatchResult::delivered(channels)
        } else {
            let detail = errors.join("; ");
            warn!(%task_id, project = %payload.project, error = %detail, "reminder dispatch failed");
            DispatchResult::failed(channels, detail)
        }
    }
}
