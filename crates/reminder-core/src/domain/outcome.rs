//! Outcome model: the result of one dispatch attempt.
//!
//! A dispatch never raises past the dispatcher; whatever went wrong with the
//! transport ends up in `error_detail` here.

use serde::{Deserialize, Serialize};

/// Delivery channel used for a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,

    /// Channels that were attempted, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<Channel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl DispatchResult {
    pub fn delivered(channels: Vec<Channel>) -> Self {
        Self {
            success: true,
            channels,
            error_detail: None,
        }
    }

    pub fn failed(channels: Vec<Channel>, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            channels,
            error_detail: Some(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_empty_fields() {
        let ok = serde_json::to_value(DispatchResult::delivered(vec![Channel::Email])).unwrap();
        assert_eq!(ok, serde_json::json!({ "success": true, "channels": ["email"] }));

        let err = serde_json::to_value(DispatchResult::failed(vec![], "no contact")).unwrap();
        assert_eq!(
            err,
            serde_json::json!({ "success": false, "error_detail": "no contact" })
        );
    }
}
