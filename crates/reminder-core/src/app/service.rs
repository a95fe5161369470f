//! ReminderService - the task API.
//!
//! The only place the store and the scheduler meet: a new task is validated,
//! appended, and its reminder scheduled. Removal and clear touch the store
//! and, when `cancel_on_remove` is set, cancel the matching job.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::scheduler::ReminderScheduler;
use crate::domain::{
    JobId, JobState, NewTask, ReminderPayload, ReminderPolicy, Result, Task, TaskError, TaskId,
};
use crate::ports::{IdGenerator, TaskStore};

/// Result of `add_task`.
///
/// `job_id` is `None` when the task was stored but its reminder could not be
/// scheduled (scheduler shut down).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedTask {
    pub task: Task,
    pub position: usize,
    pub trigger_at: DateTime<Utc>,
    pub job_id: Option<JobId>,
}

pub struct ReminderService {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<ReminderScheduler>,
    ids: Arc<dyn IdGenerator>,
    policy: ReminderPolicy,
    cancel_on_remove: bool,
    jobs: Mutex<HashMap<TaskId, JobId>>,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scheduler: Arc<ReminderScheduler>,
        ids: Arc<dyn IdGenerator>,
        policy: ReminderPolicy,
    ) -> Self {
        Self {
            store,
            scheduler,
            ids,
            policy,
            cancel_on_remove: false,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_cancel_on_remove(mut self, enabled: bool) -> Self {
        self.cancel_on_remove = enabled;
        self
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    /// Validate, persist and schedule.
    ///
    /// Validation or persistence errors leave nothing behind. Once the task
    /// is stored, a scheduling failure is logged and reported through
    /// `AddedTask::job_id` rather than as an error.
    pub async fn add_task(&self, input: NewTask) -> Result<AddedTask> {
        let task = input.into_task(self.ids.generate_task_id())?;
        let trigger_at = self.policy.trigger_at(task.deadline).ok_or_else(|| {
            TaskError::InvalidDeadline {
                input: task.deadline.to_string(),
            }
        })?;

        // held until the job is indexed so a concurrent remove sees it
        let mut jobs = self.jobs.lock().await;
        let position = self.store.append(task.clone()).await?;

        let job_id = match self
            .scheduler
            .schedule(trigger_at, ReminderPayload::from_task(&task))
            .await
        {
            Ok(job_id) => {
                jobs.insert(task.id, job_id);
                Some(job_id)
            }
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "task stored without a reminder");
                None
            }
        };
        drop(jobs);

        if !task.has_contact() {
            warn!(task_id = %task.id, "task has no email or phone; its reminder will fail");
        }
        info!(
            task_id = %task.id,
            position,
            project = %task.project,
            %trigger_at,
            "task added"
        );

        Ok(AddedTask {
            task,
            position,
            trigger_at,
            job_id,
        })
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.store.list().await?)
    }

    pub async fn remove_at(&self, position: usize) -> Result<Task> {
        let task = self.store.remove_at(position).await?;
        self.forget(task.id).await;
        info!(task_id = %task.id, position, "task removed");
        Ok(task)
    }

    pub async fn remove(&self, id: TaskId) -> Result<Task> {
        let (position, task) = self.store.remove(id).await?;
        self.forget(task.id).await;
        info!(task_id = %task.id, position, "task removed");
        Ok(task)
    }

    /// Empty the store; returns how many tasks were removed.
    pub async fn clear(&self) -> Result<usize> {
        let tasks = self.store.clear().await?;
        for task in &tasks {
            self.forget(task.id).await;
        }
        info!(removed = tasks.len(), "tasks cleared");
        Ok(tasks.len())
    }

    /// Cancel a reminder directly by job id.
    pub async fn cancel_job(&self, job_id: JobId) -> bool {
        let cancelled = self.scheduler.cancel(job_id).await;
        if cancelled {
            self.jobs.lock().await.retain(|_, job| *job != job_id);
        }
        cancelled
    }

    /// Reminder still waiting (or firing) for a stored task.
    ///
    /// Entries whose job already settled are dropped here.
    pub async fn job_for(&self, id: TaskId) -> Option<JobId> {
        let mut jobs = self.jobs.lock().await;
        let job_id = *jobs.get(&id)?;
        match self.scheduler.job_state(job_id).await {
            Some(JobState::Pending | JobState::Firing) => Some(job_id),
            _ => {
                jobs.remove(&id);
                None
            }
        }
    }

    /// Drop the index entry of a removed task, cancelling its job if
    /// configured to.
    async fn forget(&self, id: TaskId) {
        let Some(job_id) = self.jobs.lock().await.remove(&id) else {
            return;
        };
        if self.cancel_on_remove && self.scheduler.cancel(job_id).await {
            info!(task_id = %id, job_id = %job_id, "reminder cancelled with its task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dispatcher::Dispatch;
    use crate::domain::{DispatchResult, ReminderError, StoreError};
    use crate::impls::InMemoryTaskStore;
    use crate::ports::{FixedClock, UlidGenerator};
    use async_trait::async_trait;
    use rstest::rstest;
    use chrono::{NaiveDate, TimeZone};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    struct RecordingDispatch {
        tx: mpsc::UnboundedSender<ReminderPayload>,
    }

    #[async_trait]
    impl Dispatch for RecordingDispatch {
        async fn dispatch(&self, payload: &ReminderPayload) -> DispatchResult {
            let _ = self.tx.send(payload.clone());
            DispatchResult::delivered(Vec::new())
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    fn disk_full() -> StoreError {
        StoreError::persistence("/unwritable/tasks.json", "disk full")
    }

    #[async_trait]
    impl TaskStore for BrokenStore {
        async fn list(&self) -> std::result::Result<Vec<Task>, StoreError> {
            Ok(Vec::new())
        }

        async fn append(&self, _task: Task) -> std::result::Result<usize, StoreError> {
            Err(disk_full())
        }

        async fn remove_at(&self, _position: usize) -> std::result::Result<Task, StoreError> {
            Err(disk_full())
        }

        async fn remove(&self, _id: TaskId) -> std::result::Result<(usize, Task), StoreError> {
            Err(disk_full())
        }

        async fn get(&self, _id: TaskId) -> std::result::Result<Option<Task>, StoreError> {
            Ok(None)
        }

        async fn position_of(&self, _id: TaskId) -> std::result::Result<Option<usize>, StoreError> {
            Ok(None)
        }

        async fn clear(&self) -> std::result::Result<Vec<Task>, StoreError> {
            Err(disk_full())
        }
    }

    struct Harness {
        clock: Arc<FixedClock>,
        service: ReminderService,
        rx: mpsc::UnboundedReceiver<ReminderPayload>,
    }

    fn start(cancel_on_remove: bool) -> Harness {
        start_with(Arc::new(InMemoryTaskStore::new()), cancel_on_remove)
    }

    fn start_with(store: Arc<dyn TaskStore>, cancel_on_remove: bool) -> Harness {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        ));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(ReminderScheduler::spawn(
            clock.clone(),
            Arc::clone(&ids),
            Arc::new(RecordingDispatch { tx }),
            Duration::from_millis(10),
        ));
        let service = ReminderService::new(
            store,
            scheduler,
            ids,
            ReminderPolicy::default(),
        )
        .with_cancel_on_remove(cancel_on_remove);
        Harness { clock, service, rx }
    }

    #[tokio::test]
    async fn added_task_fires_once_at_its_trigger() {
        let mut h = start(false);

        let added = h
            .service
            .add_task(NewTask::new("A", "P1", "2030-01-10").with_email("a@x.com"))
            .await
            .unwrap();

        assert_eq!(added.position, 0);
        assert_eq!(
            added.trigger_at,
            Utc.with_ymd_and_hms(2030, 1, 8, 23, 50, 0).unwrap()
        );
        assert_eq!(h.service.list_tasks().await.unwrap().len(), 1);
        let job_id = added.job_id.unwrap();
        assert_eq!(h.service.job_for(added.task.id).await, Some(job_id));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.rx.try_recv().is_err());

        h.clock.set(added.trigger_at);
        let fired = timeout(WAIT, h.rx.recv()).await.unwrap().unwrap();
        assert_eq!(fired.email.as_deref(), Some("a@x.com"));
        assert_eq!(fired.project, "P1");
        assert_eq!(fired.deadline, NaiveDate::from_ymd_opt(2030, 1, 10).unwrap());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.rx.try_recv().is_err());
        assert_eq!(
            h.service.scheduler().job_state(job_id).await,
            Some(JobState::Done)
        );
    }

    #[tokio::test]
    async fn invalid_task_is_not_stored() {
        let h = start(false);

        let err = h
            .service
            .add_task(NewTask::new("A", "P1", "10/01/2030"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReminderError::Task(TaskError::InvalidDeadline { .. })
        ));
        assert!(h.service.list_tasks().await.unwrap().is_empty());
        assert_eq!(h.service.scheduler().status().await.pending, 0);
    }

    #[tokio::test]
    async fn removed_task_still_fires_by_default() {
        let mut h = start(false);
        let first = h
            .service
            .add_task(NewTask::new("A", "P1", "2030-01-10").with_email("a@x.com"))
            .await
            .unwrap();
        let second = h
            .service
            .add_task(NewTask::new("B", "P2", "2030-02-10").with_email("b@x.com"))
            .await
            .unwrap();

        let removed = h.service.remove_at(0).await.unwrap();

        assert_eq!(removed.id, first.task.id);
        let remaining = h.service.list_tasks().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.task.id);
        assert_eq!(h.service.job_for(first.task.id).await, None);

        h.clock.set(first.trigger_at);
        let fired = timeout(WAIT, h.rx.recv()).await.unwrap().unwrap();
        assert_eq!(fired.project, "P1");
    }

    #[tokio::test]
    async fn cancel_on_remove_stops_the_reminder() {
        let mut h = start(true);
        let added = h
            .service
            .add_task(NewTask::new("A", "P1", "2030-01-10").with_email("a@x.com"))
            .await
            .unwrap();

        h.service.remove(added.task.id).await.unwrap();

        let job_id = added.job_id.unwrap();
        assert_eq!(
            h.service.scheduler().job_state(job_id).await,
            Some(JobState::Cancelled)
        );
        h.clock.set(added.trigger_at);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn clear_with_cancel_on_remove_cancels_everything() {
        let h = start(true);
        for project in ["P1", "P2", "P3"] {
            h.service
                .add_task(NewTask::new("A", project, "2030-01-10").with_email("a@x.com"))
                .await
                .unwrap();
        }

        assert_eq!(h.service.clear().await.unwrap(), 3);

        assert!(h.service.list_tasks().await.unwrap().is_empty());
        let status = h.service.scheduler().status().await;
        assert_eq!(status.pending, 0);
        assert_eq!(status.cancelled, 3);
    }

    #[tokio::test]
    async fn remove_out_of_range_is_an_error() {
        let h = start(false);

        let err = h.service.remove_at(0).await.unwrap_err();

        assert!(matches!(
            err,
            ReminderError::Store(StoreError::OutOfRange { position: 0, len: 0 })
        ));
    }

    #[tokio::test]
    async fn task_survives_a_stopped_scheduler() {
        let h = start(false);
        h.service.scheduler().shutdown().await;

        let added = h
            .service
            .add_task(NewTask::new("A", "P1", "2030-01-10"))
            .await
            .unwrap();

        assert_eq!(added.job_id, None);
        assert_eq!(h.service.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_job_by_id() {
        let h = start(false);
        let added = h
            .service
            .add_task(NewTask::new("A", "P1", "2030-01-10").with_email("a@x.com"))
            .await
            .unwrap();
        let job_id = added.job_id.unwrap();

        assert!(h.service.cancel_job(job_id).await);
        assert!(!h.service.cancel_job(job_id).await);
        assert_eq!(h.service.job_for(added.task.id).await, None);
    }

    #[rstest]
    #[case("-262143-01-01")]
    #[case("+262142-12-31")]
    #[case("0000-01-01")]
    #[tokio::test]
    async fn out_of_range_deadline_is_rejected_before_storing(#[case] deadline: &str) {
        let h = start(false);

        let err = h
            .service
            .add_task(NewTask::new("A", "P1", deadline).with_email("a@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReminderError::Task(TaskError::InvalidDeadline { .. })
        ));
        assert!(h.service.list_tasks().await.unwrap().is_empty());
        assert_eq!(h.service.scheduler().status().await.pending, 0);
    }

    #[tokio::test]
    async fn earliest_deadline_is_scheduled() {
        let mut h = start(false);

        let added = h
            .service
            .add_task(NewTask::new("A", "P1", "0001-01-01").with_email("a@x.com"))
            .await
            .unwrap();

        assert!(added.job_id.is_some());
        let fired = timeout(WAIT, h.rx.recv()).await.unwrap().unwrap();
        assert_eq!(fired.deadline, NaiveDate::from_ymd_opt(1, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn persistence_failure_schedules_nothing() {
        let h = start_with(Arc::new(BrokenStore), false);

        let err = h
            .service
            .add_task(NewTask::new("A", "P1", "2030-01-10").with_email("a@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReminderError::Store(StoreError::Persistence { .. })
        ));
        let status = h.service.scheduler().status().await;
        assert_eq!(status.pending, 0);
        assert_eq!(status.firing, 0);
    }

    #[tokio::test]
    async fn failed_clear_keeps_the_job_index() {
        let h = start_with(Arc::new(BrokenStore), true);

        let err = h.service.clear().await.unwrap_err();

        assert!(matches!(
            err,
            ReminderError::Store(StoreError::Persistence { .. })
        ));
        assert_eq!(h.service.scheduler().status().await.cancelled, 0);
    }

    #[tokio::test]
    async fn fired_job_is_no_longer_reported_for_its_task() {
        let mut h = start(false);
        let added = h
            .service
            .add_task(NewTask::new("A", "P1", "2030-01-10").with_email("a@x.com"))
            .await
            .unwrap();
        let job_id = added.job_id.unwrap();

        h.clock.set(added.trigger_at);
        timeout(WAIT, h.rx.recv()).await.unwrap().unwrap();
        timeout(WAIT, async {
            while h.service.scheduler().job_state(job_id).await != Some(JobState::Done) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(h.service.job_for(added.task.id).await, None);
        // the task itself stays stored
        assert_eq!(h.service.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_racing_add_leaves_index_consistent() {
        for _ in 0..20 {
            let h = start(true);

            let (added, cleared) = tokio::join!(
                h.service
                    .add_task(NewTask::new("A", "P1", "2030-01-10").with_email("a@x.com")),
                h.service.clear(),
            );
            let added = added.unwrap();
            cleared.unwrap();

            let stored = h.service.list_tasks().await.unwrap().len() == 1;
            let state = h.service.scheduler().job_state(added.job_id.unwrap()).await;
            if stored {
                assert_eq!(state, Some(JobState::Pending));
                assert_eq!(h.service.job_for(added.task.id).await, added.job_id);
            } else {
                assert_eq!(state, Some(JobState::Cancelled));
                assert_eq!(h.service.job_for(added.task.id).await, None);
            }
        }
    }
}
