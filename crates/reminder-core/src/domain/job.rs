//! Reminder jobs: trigger time computation, payload and job state.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{JobId, TaskId};
use super::task::Task;

/// Job state.
///
/// State transitions:
/// - Pending -> Firing -> Done
/// - Pending -> Cancelled
///
/// A job reaches `Done` after exactly one dispatch attempt, whatever its
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the wait set for its trigger time.
    Pending,

    /// Handed to the dispatcher.
    Firing,

    /// Dispatch attempted (success or failure).
    Done,

    /// Removed before it fired.
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Cancelled)
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, JobState::Pending)
    }
}

/// What the dispatcher needs, copied out of the task at schedule time.
///
/// It does not point back into the store: editing or deleting the task
/// later has no effect on a job that already carries this payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub task_id: Option<TaskId>,
    pub user: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub project: String,
    pub deadline: NaiveDate,
}

impl ReminderPayload {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: Some(task.id),
            user: task.user.clone(),
            email: task.email.clone(),
            phone: task.phone.clone(),
            project: task.project.clone(),
            deadline: task.deadline,
        }
    }
}

/// One scheduled, one-shot dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderJob {
    pub id: JobId,
    pub trigger_at: DateTime<Utc>,
    pub payload: ReminderPayload,
}

/// How far before a deadline the reminder fires.
///
/// `trigger_at = deadline 00:00 (in offset) - lead - margin`.
/// The defaults (1 day, 10 minutes, UTC) reproduce the historical
/// "one day and ten minutes early" behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub lead: Duration,
    pub margin: Duration,
    pub offset: FixedOffset,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            lead: Duration::days(1),
            margin: Duration::minutes(10),
            offset: Utc.fix(),
        }
    }
}

impl ReminderPolicy {
    /// `None` when the result falls outside chrono's representable range.
    pub fn trigger_at(&self, deadline: NaiveDate) -> Option<DateTime<Utc>> {
        let local_midnight = deadline.and_time(NaiveTime::MIN);
        let utc_midnight = local_midnight
            .checked_sub_signed(Duration::seconds(i64::from(self.offset.local_minus_utc())))?;
        utc_midnight
            .and_utc()
            .checked_sub_signed(self.lead)?
            .checked_sub_signed(self.margin)
    }
}
