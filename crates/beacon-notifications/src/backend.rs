//! Deferred job execution.
//!
//! [`SchedulerBackend`] is the seam to whatever runs jobs after a delay.
//! [`LocalJobBackend`] is the in-process implementation: a unique-name job
//! index plus one tokio timer per pending job.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{NotificationError, Result};
use crate::types::ReminderRequest;

/// What to do when a job with the same name already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Atomically supersede the existing job
    Replace,
    /// Leave the existing job alone and drop the new one
    Keep,
}

/// A job submission
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub name: String,
    pub delay: Duration,
    pub payload: ReminderRequest,
    pub on_conflict: ConflictPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
}

/// Read-only view of a live job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub name: String,
    pub state: JobState,
    pub fire_at_epoch_millis: i64,
    pub payload: ReminderRequest,
}

/// One execution of a job, handed to the [`JobHandler`]
#[derive(Debug, Clone)]
pub struct JobRun {
    pub name: String,
    /// Identifies this execution; re-arming is conditional on it still
    /// being the live job for `name`
    pub run_id: u64,
    pub payload: ReminderRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failed(String),
}

/// Work executed when a job's delay elapses
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, run: JobRun) -> JobOutcome;
}

/// Durable deferred-job facility
pub trait SchedulerBackend: Send + Sync {
    /// Register the handler invoked for fired jobs. Held weakly.
    fn register_handler(&self, handler: Weak<dyn JobHandler>);

    /// Submit a job. Must not block.
    fn submit(&self, request: JobRequest) -> Result<()>;

    /// Replace the job `run` is executing with a new pending one, but only if
    /// `run` is still the live job for its name. Returns `false` when the job
    /// was cancelled or superseded while it ran.
    fn resubmit(&self, run: &JobRun, delay: Duration, payload: ReminderRequest) -> Result<bool>;

    /// Cancel a job by name. A running handler is not interrupted.
    fn cancel(&self, name: &str) -> bool;

    fn job(&self, name: &str) -> Option<JobSnapshot>;

    fn jobs(&self) -> Vec<JobSnapshot>;
}

/// Local backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Submissions beyond this many live jobs are rejected
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
}

fn default_max_jobs() -> usize {
    1024
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
        }
    }
}

struct JobEntry {
    run_id: u64,
    state: JobState,
    fire_at_epoch_millis: i64,
    payload: ReminderRequest,
    timer: Option<AbortHandle>,
}

impl JobEntry {
    fn snapshot(&self, name: &str) -> JobSnapshot {
        JobSnapshot {
            name: name.to_string(),
            state: self.state,
            fire_at_epoch_millis: self.fire_at_epoch_millis,
            payload: self.payload.clone(),
        }
    }

    /// Stop the timer of a job that has not started yet
    fn disarm(&mut self) {
        if self.state == JobState::Pending
            && let Some(timer) = self.timer.take()
        {
            timer.abort();
        }
    }
}

struct Inner {
    jobs: DashMap<String, JobEntry>,
    next_run_id: AtomicU64,
    handler: RwLock<Option<Weak<dyn JobHandler>>>,
    runtime: Handle,
    clock: Arc<dyn Clock>,
    config: BackendConfig,
    shut_down: AtomicBool,
}

/// In-process scheduler backend on tokio timers
#[derive(Clone)]
pub struct LocalJobBackend {
    inner: Arc<Inner>,
}

impl LocalJobBackend {
    /// Create a backend bound to the current tokio runtime.
    ///
    /// Submissions may afterwards come from any thread.
    pub fn new(config: BackendConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: BackendConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| NotificationError::Internal(format!("no tokio runtime: {e}")))?;
        Ok(Self {
            inner: Arc::new(Inner {
                jobs: DashMap::new(),
                next_run_id: AtomicU64::new(1),
                handler: RwLock::new(None),
                runtime,
                clock,
                config,
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// Stop every pending timer and reject further submissions.
    /// Handlers already running finish normally.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        let mut cancelled = 0;
        self.inner.jobs.retain(|_, entry| {
            if entry.state == JobState::Pending {
                entry.disarm();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        info!(cancelled, "Job backend shut down");
    }

    pub fn len(&self) -> usize {
        self.inner.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.jobs.is_empty()
    }
}

impl Inner {
    fn ensure_open(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(NotificationError::submission("job backend is shut down"));
        }
        Ok(())
    }

    fn handler(&self) -> Option<Arc<dyn JobHandler>> {
        self.handler
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().and_then(Weak::upgrade))
    }

    fn new_entry(&self, delay: Duration, payload: ReminderRequest) -> JobEntry {
        let delay_millis = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        JobEntry {
            run_id: self.next_run_id.fetch_add(1, Ordering::SeqCst),
            state: JobState::Pending,
            fire_at_epoch_millis: self.clock.now_millis().saturating_add(delay_millis),
            payload,
            timer: None,
        }
    }

    /// Move a pending job to running if `run_id` is still the live job
    fn claim(&self, name: &str, run_id: u64) -> Option<ReminderRequest> {
        let mut entry = self.jobs.get_mut(name)?;
        if entry.run_id != run_id || entry.state != JobState::Pending {
            return None;
        }
        entry.state = JobState::Running;
        entry.timer = None;
        Some(entry.payload.clone())
    }

    fn finish(&self, name: &str, run_id: u64) {
        self.jobs.remove_if(name, |_, entry| entry.run_id == run_id);
    }
}

/// Spawn the timer for a freshly inserted entry and attach its abort handle.
fn arm(inner: &Arc<Inner>, name: String, run_id: u64, delay: Duration) {
    let task_inner = inner.clone();
    let task_name = name.clone();
    let task = inner.runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        fire(task_inner, task_name, run_id).await;
    });

    if let Some(mut entry) = inner.jobs.get_mut(&name)
        && entry.run_id == run_id
        && entry.state == JobState::Pending
    {
        entry.timer = Some(task.abort_handle());
    }
}

async fn fire(inner: Arc<Inner>, name: String, run_id: u64) {
    let Some(payload) = inner.claim(&name, run_id) else {
        debug!(job = %name, run_id, "Superseded job skipped");
        return;
    };

    let outcome = match inner.handler() {
        Some(handler) => {
            handler
                .run(JobRun {
                    name: name.clone(),
                    run_id,
                    payload,
                })
                .await
        }
        None => JobOutcome::Failed("no job handler registered".into()),
    };

    inner.finish(&name, run_id);

    match outcome {
        JobOutcome::Success => debug!(job = %name, run_id, "Job completed"),
        JobOutcome::Failed(reason) => warn!(job = %name, run_id, reason = %reason, "Job failed"),
    }
}

impl SchedulerBackend for LocalJobBackend {
    fn register_handler(&self, handler: Weak<dyn JobHandler>) {
        match self.inner.handler.write() {
            Ok(mut guard) => *guard = Some(handler),
            Err(_) => error!("Job handler lock poisoned; handler not registered"),
        }
    }

    fn submit(&self, request: JobRequest) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_open()?;

        if !inner.jobs.contains_key(&request.name) && inner.jobs.len() >= inner.config.max_jobs {
            return Err(NotificationError::submission(format!(
                "job limit of {} reached",
                inner.config.max_jobs
            )));
        }

        let entry = inner.new_entry(request.delay, request.payload);
        let run_id = entry.run_id;

        match inner.jobs.entry(request.name.clone()) {
            Entry::Occupied(mut occupied) => {
                if request.on_conflict == ConflictPolicy::Keep {
                    debug!(job = %request.name, "Job exists, keeping it");
                    return Ok(());
                }
                occupied.get_mut().disarm();
                occupied.insert(entry);
                debug!(job = %request.name, run_id, "Job replaced");
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                debug!(job = %request.name, run_id, "Job submitted");
            }
        }

        arm(inner, request.name, run_id, request.delay);
        Ok(())
    }

    fn resubmit(&self, run: &JobRun, delay: Duration, payload: ReminderRequest) -> Result<bool> {
        let inner = &self.inner;
        inner.ensure_open()?;

        let entry = inner.new_entry(delay, payload);
        let run_id = entry.run_id;

        {
            let Some(mut current) = inner.jobs.get_mut(&run.name) else {
                return Ok(false);
            };
            if current.run_id != run.run_id {
                return Ok(false);
            }
            *current = entry;
        }

        arm(inner, run.name.clone(), run_id, delay);
        Ok(true)
    }

    fn cancel(&self, name: &str) -> bool {
        match self.inner.jobs.remove(name) {
            Some((_, mut entry)) => {
                entry.disarm();
                debug!(job = %name, state = ?entry.state, "Job cancelled");
                true
            }
            None => false,
        }
    }

    fn job(&self, name: &str) -> Option<JobSnapshot> {
        self.inner.jobs.get(name).map(|entry| entry.snapshot(name))
    }

    fn jobs(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<_> = self
            .inner
            .jobs
            .iter()
            .map(|entry| entry.value().snapshot(entry.key()))
            .collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }
}
