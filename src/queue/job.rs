use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::{Driver, DriverStatus, JobHandle};
use crate::error::DriverError;

/// Description of one schedulable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique name within the queue.
    pub name: String,
    /// Program to execute.
    pub command: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory for the job, if any.
    pub current_dir: Option<PathBuf>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

/// Lifecycle status of a job.
///
/// `Waiting -> Pending -> Running -> {Done, Exit}`; an `Exit` is resolved by
/// the dispatch loop into `Waiting` (retry) or `Failed` (attempts exhausted).
/// `Killed` is reachable from any non-terminal status. `Done`, `Failed` and
/// `Killed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Not yet handed to the driver, eligible for dispatch.
    Waiting,
    /// Accepted by the driver, not yet running.
    Pending,
    /// Running under the driver.
    Running,
    /// Finished successfully.
    Done,
    /// Exited abnormally; awaiting retry-or-fail resolution.
    Exit,
    /// Exhausted all submission attempts.
    Failed,
    /// Cancelled on request.
    Killed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Killed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Exit => write!(f, "exit"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Killed => write!(f, "killed"),
        }
    }
}

/// Point-in-time snapshot of one job, safe to hand out of the queue lock.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub index: usize,
    pub name: String,
    pub status: JobStatus,
    /// Driver submissions so far (1 after the first dispatch).
    pub submit_count: u32,
    pub created_at: DateTime<Utc>,
}

/// One job tracked by the queue: its spec, status, retry accounting and the
/// driver handle while work is in flight.
pub(crate) struct Job {
    index: usize,
    spec: JobSpec,
    status: JobStatus,
    submit_count: u32,
    created_at: DateTime<Utc>,
    started_at: Option<Instant>,
    handle: Option<Box<dyn JobHandle>>,
}

impl Job {
    pub(crate) fn new(index: usize, spec: JobSpec) -> Self {
        Self {
            index,
            spec,
            status: JobStatus::Waiting,
            submit_count: 0,
            created_at: Utc::now(),
            started_at: None,
            handle: None,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn name(&self) -> &str {
        &self.spec.name
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.status
    }

    pub(crate) fn submit_count(&self) -> u32 {
        self.submit_count
    }

    /// Time since dispatch, while the job is in flight. `None` before the
    /// first dispatch and once the job is terminal.
    pub(crate) fn elapsed_runtime(&self) -> Option<Duration> {
        if self.status.is_terminal() {
            return None;
        }
        self.started_at.map(|start| start.elapsed())
    }

    pub(crate) fn info(&self) -> JobInfo {
        JobInfo {
            index: self.index,
            name: self.spec.name.clone(),
            status: self.status,
            submit_count: self.submit_count,
            created_at: self.created_at,
        }
    }

    /// Hand the job to the driver. On success the job owns the returned
    /// handle and one submission attempt is consumed.
    ///
    /// # Errors
    ///
    /// Propagates the driver error untouched; the engine decides between
    /// backoff ([`DriverError::Rejected`]) and consuming an attempt.
    pub(crate) async fn submit(&mut self, driver: &Arc<dyn Driver>) -> Result<(), DriverError> {
        debug_assert_eq!(self.status, JobStatus::Waiting);
        let handle = driver.submit(&self.spec).await?;
        self.handle = Some(handle);
        self.submit_count += 1;
        self.started_at = Some(Instant::now());
        self.status = JobStatus::Pending;
        tracing::debug!(job = %self.spec.name, index = self.index, attempt = self.submit_count, "job submitted");
        Ok(())
    }

    /// Poll the driver and advance the status. Terminal driver reports
    /// release the handle; an abnormal exit parks the job in `Exit` for the
    /// engine to resolve.
    pub(crate) async fn poll(&mut self) -> Result<(), DriverError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        match handle.poll().await? {
            DriverStatus::Pending => self.status = JobStatus::Pending,
            DriverStatus::Running => self.status = JobStatus::Running,
            DriverStatus::Done => {
                self.status = JobStatus::Done;
                self.handle = None;
                tracing::info!(job = %self.spec.name, index = self.index, "job done");
            }
            DriverStatus::Exit => {
                self.status = JobStatus::Exit;
                self.handle = None;
            }
        }
        Ok(())
    }

    /// Resolve an abnormal exit: requeue while attempts remain, otherwise
    /// mark the job permanently failed.
    pub(crate) fn resolve_exit(&mut self, max_submit: u32) {
        debug_assert_eq!(self.status, JobStatus::Exit);
        if self.submit_count < max_submit {
            self.status = JobStatus::Waiting;
            self.started_at = None;
            tracing::warn!(
                job = %self.spec.name,
                index = self.index,
                attempt = self.submit_count,
                max_submit,
                "job exited abnormally, requeueing"
            );
        } else {
            self.status = JobStatus::Failed;
            tracing::warn!(
                job = %self.spec.name,
                index = self.index,
                attempts = self.submit_count,
                "job failed, submission attempts exhausted"
            );
        }
    }

    /// Record a failed launch: the attempt is consumed as if the job had
    /// exited abnormally right away.
    pub(crate) fn launch_failed(&mut self, max_submit: u32) {
        self.submit_count += 1;
        self.status = JobStatus::Exit;
        self.resolve_exit(max_submit);
    }

    /// Cancel the job. Idempotent: terminal jobs are left untouched. A job
    /// that was never dispatched is marked killed directly so it cannot be
    /// picked up later.
    pub(crate) async fn kill(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.kill().await {
                tracing::warn!(job = %self.spec.name, index = self.index, error = %e, "kill request failed");
            }
        }
        self.handle = None;
        self.status = JobStatus::Killed;
        tracing::info!(job = %self.spec.name, index = self.index, "job killed");
    }
}
