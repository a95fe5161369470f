//! Status - scheduler counters for `status` queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the scheduler.
///
/// `pending` and `firing` are current gauges; the rest count since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub pending: usize,
    pub firing: usize,
    pub dispatched: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub discarded: u64,
    pub accepting: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_trigger_at: Option<DateTime<Utc>>,
}
