//! ReminderScheduler - one-shot timed jobs.
//!
//! A single timing loop owns the wait set (a min-heap keyed by trigger
//! time). Due jobs are flipped to `Firing` under the lock and dispatched
//! outside it, each on its own task, so a slow provider never holds up the
//! loop or other jobs.
//!
//! The loop sleeps until the earliest trigger or one poll interval,
//! whichever comes first. `schedule` wakes it early through `Notify`, so a
//! job whose trigger is already in the past fires right away.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, debug, error, info, info_span};

use super::dispatcher::Dispatch;
use super::status::SchedulerStatus;
use crate::domain::{
    DispatchResult, JobId, JobState, ReminderJob, ReminderPayload, SchedulerError,
};
use crate::ports::{Clock, IdGenerator};

/// Wait set entry.
///
/// Reverse ordering so `BinaryHeap` pops the earliest trigger first; `seq`
/// keeps jobs with the same trigger in scheduling order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledJob {
    trigger_at: DateTime<Utc>,
    seq: u64,
    job_id: JobId,
}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .trigger_at
            .cmp(&self.trigger_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// How many settled jobs keep their terminal state queryable.
const SETTLED_CAPACITY: usize = 1024;

struct JobRecord {
    job: ReminderJob,
    state: JobState,
}

struct SchedulerState {
    /// Live jobs (Pending or Firing).
    live: HashMap<JobId, JobRecord>,

    /// Terminal state of the most recent jobs that left `live` (Done or
    /// Cancelled), oldest first in `settled_order`.
    settled: HashMap<JobId, JobState>,
    settled_order: VecDeque<JobId>,
    settled_capacity: usize,

    wait_set: BinaryHeap<ScheduledJob>,
    next_seq: u64,
    accepting: bool,

    dispatched: u64,
    failed: u64,
    cancelled: u64,
    discarded: u64,
}

impl SchedulerState {
    fn new(settled_capacity: usize) -> Self {
        Self {
            live: HashMap::new(),
            settled: HashMap::new(),
            settled_order: VecDeque::new(),
            settled_capacity,
            wait_set: BinaryHeap::new(),
            next_seq: 0,
            accepting: true,
            dispatched: 0,
            failed: 0,
            cancelled: 0,
            discarded: 0,
        }
    }

    fn insert(&mut self, job: ReminderJob) {
        let entry = ScheduledJob {
            trigger_at: job.trigger_at,
            seq: self.next_seq,
            job_id: job.id,
        };
        self.next_seq += 1;
        self.wait_set.push(entry);
        self.live.insert(
            job.id,
            JobRecord {
                job,
                state: JobState::Pending,
            },
        );
    }

    /// Pop every job whose trigger is at or before `now` and mark it Firing.
    fn take_due(&mut self, now: DateTime<Utc>) -> Vec<ReminderJob> {
        let mut due = Vec::new();
        while let Some(entry) = self.wait_set.peek() {
            if entry.trigger_at > now {
                break;
            }
            let Some(entry) = self.wait_set.pop() else {
                break;
            };
            if let Some(record) = self.live.get_mut(&entry.job_id)
                && record.state == JobState::Pending
            {
                record.state = JobState::Firing;
                due.push(record.job.clone());
            }
        }
        due
    }

    fn next_trigger(&self) -> Option<DateTime<Utc>> {
        self.wait_set.peek().map(|entry| entry.trigger_at)
    }

    fn finish(&mut self, job_id: JobId, result: &DispatchResult) {
        self.live.remove(&job_id);
        self.settle(job_id, JobState::Done);
        self.dispatched += 1;
        if !result.success {
            self.failed += 1;
        }
    }

    fn cancel(&mut self, job_id: JobId) -> bool {
        match self.live.get(&job_id) {
            Some(record) if record.state.is_cancellable() => {
                self.live.remove(&job_id);
                self.wait_set.retain(|entry| entry.job_id != job_id);
                self.settle(job_id, JobState::Cancelled);
                self.cancelled += 1;
                true
            }
            _ => false,
        }
    }

    fn settle(&mut self, job_id: JobId, state: JobState) {
        if self.settled.insert(job_id, state).is_none() {
            self.settled_order.push_back(job_id);
        }
        while self.settled_order.len() > self.settled_capacity {
            if let Some(oldest) = self.settled_order.pop_front() {
                self.settled.remove(&oldest);
            }
        }
    }

    /// Drop every Pending job; Firing ones are left to finish.
    fn discard_pending(&mut self) -> u64 {
        let before = self.live.len();
        self.live.retain(|_, record| record.state != JobState::Pending);
        self.wait_set.clear();
        let discarded = (before - self.live.len()) as u64;
        self.discarded += discarded;
        discarded
    }

    fn job_state(&self, job_id: JobId) -> Option<JobState> {
        self.live
            .get(&job_id)
            .map(|record| record.state)
            .or_else(|| self.settled.get(&job_id).copied())
    }

    fn status(&self) -> SchedulerStatus {
        let mut status = SchedulerStatus {
            dispatched: self.dispatched,
            failed: self.failed,
            cancelled: self.cancelled,
            discarded: self.discarded,
            accepting: self.accepting,
            next_trigger_at: self.next_trigger(),
            ..SchedulerStatus::default()
        };
        for record in self.live.values() {
            match record.state {
                JobState::Pending => status.pending += 1,
                JobState::Firing => status.firing += 1,
                JobState::Done | JobState::Cancelled => {}
            }
        }
        status
    }
}

/// Scheduler handle.
///
/// - `shutdown()` stops the timing loop and waits for in-flight dispatches
/// - dropping the handle without `shutdown()` also ends the loop
pub struct ReminderScheduler {
    state: Arc<Mutex<SchedulerState>>,
    notify: Arc<Notify>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    poll_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    timing_loop: Mutex<Option<JoinHandle<()>>>,
}

impl ReminderScheduler {
    /// Start the timing loop. Must be called from within a Tokio runtime.
    pub fn spawn(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        dispatcher: Arc<dyn Dispatch>,
        poll_interval: Duration,
    ) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState::new(SETTLED_CAPACITY)));
        let notify = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let span = info_span!("timing_loop", poll_ms = poll_interval.as_millis() as u64);
        let join = tokio::spawn(
            timing_loop(
                Arc::clone(&state),
                Arc::clone(&notify),
                Arc::clone(&clock),
                dispatcher,
                poll_interval,
                shutdown_rx,
            )
            .instrument(span),
        );

        Self {
            state,
            notify,
            clock,
            ids,
            poll_interval,
            shutdown_tx,
            timing_loop: Mutex::new(Some(join)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Add a one-shot job. A trigger in the past fires on the next tick.
    pub async fn schedule(
        &self,
        trigger_at: DateTime<Utc>,
        payload: ReminderPayload,
    ) -> Result<JobId, SchedulerError> {
        let job_id = self.ids.generate_job_id();
        {
            let mut state = self.state.lock().await;
            if !state.accepting {
                return Err(SchedulerError::ShutDown);
            }
            state.insert(ReminderJob {
                id: job_id,
                trigger_at,
                payload,
            });
        }
        let overdue = trigger_at <= self.clock.now();
        debug!(job_id = %job_id, %trigger_at, overdue, "job scheduled");
        self.notify.notify_one();
        Ok(job_id)
    }

    /// Cancel a Pending job. Returns false if the job is unknown or has
    /// already started firing.
    pub async fn cancel(&self, job_id: JobId) -> bool {
        let cancelled = self.state.lock().await.cancel(job_id);
        if cancelled {
            debug!(job_id = %job_id, "job cancelled");
        }
        cancelled
    }

    /// Stop accepting jobs, discard Pending ones and wait for Firing ones.
    ///
    /// Idempotent. Discarded jobs are counted but their state is forgotten.
    pub async fn shutdown(&self) {
        let discarded = {
            let mut state = self.state.lock().await;
            state.accepting = false;
            state.discard_pending()
        };
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);

        let join = self.timing_loop.lock().await.take();
        if let Some(join) = join {
            if let Err(err) = join.await {
                error!(error = %err, "timing loop ended abnormally");
            }
            info!(discarded, "scheduler shut down");
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.state.lock().await.status()
    }

    /// `None` for unknown ids, for jobs discarded at shutdown, and for jobs
    /// that settled long enough ago to have been evicted.
    pub async fn job_state(&self, job_id: JobId) -> Option<JobState> {
        self.state.lock().await.job_state(job_id)
    }
}

async fn timing_loop(
    state: Arc<Mutex<SchedulerState>>,
    notify: Arc<Notify>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn Dispatch>,
    poll_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let now = clock.now();
        let (due, next_trigger) = {
            let mut state = state.lock().await;
            (state.take_due(now), state.next_trigger())
        };

        for job in due {
            debug!(job_id = %job.id, trigger_at = %job.trigger_at, "job due");
            in_flight.spawn(fire(job, Arc::clone(&dispatcher), Arc::clone(&state)));
        }
        while let Some(joined) = in_flight.try_join_next() {
            if let Err(err) = joined {
                error!(error = %err, "dispatch task ended abnormally");
            }
        }

        let wait = next_trigger
            .and_then(|at| (at - now).to_std().ok())
            .map_or(poll_interval, |until| until.min(poll_interval));

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // handle dropped without shutdown()
                    break;
                }
            }
            _ = notify.notified() => {}
            _ = tokio::time::sleep(wait) => {}
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(err) = joined {
            error!(error = %err, "dispatch task ended abnormally");
        }
    }
}

/// Dispatch one job and record its terminal state.
///
/// The dispatcher runs on its own task so a panic inside it still settles
/// the job as a failed attempt.
async fn fire(job: ReminderJob, dispatcher: Arc<dyn Dispatch>, state: Arc<Mutex<SchedulerState>>) {
    let payload = job.payload.clone();
    let result = match tokio::spawn(async move { dispatcher.dispatch(&payload).await }).await {
        Ok(result) => result,
        Err(err) => DispatchResult::failed(Vec::new(), format!("dispatcher aborted: {err}")),
    };

    debug!(
        job_id = %job.id,
        success = result.success,
        error = result.error_detail.as_deref().unwrap_or(""),
        "job done"
    );
    state.lock().await.finish(job.id, &result);
}
