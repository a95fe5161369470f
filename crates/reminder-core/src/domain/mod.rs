//! Domain model (IDs, tasks, reminder jobs, dispatch outcomes, errors).

pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod task;

pub use errors::{ReminderError, Result, SchedulerError, StoreError, TaskError};
pub use ids::{IdParseError, JobId, TaskId};
pub use job::{JobState, ReminderJob, ReminderPayload, ReminderPolicy};
pub use outcome::{Channel, DispatchResult};
pub use task::{NewTask, Task, TaskList, parse_deadline};
