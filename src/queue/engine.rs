use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::driver::Driver;
use crate::error::{DriverError, QueueError, Result};
use crate::queue::job::{Job, JobInfo, JobSpec, JobStatus};
use crate::queue::registry::JobRegistry;

struct QueueState {
    registry: JobRegistry,
    submit_complete: bool,
}

/// The queue engine: owns the job registry and runs the dispatch loop.
///
/// One engine manages one batch of jobs. The controlling task adds jobs,
/// queries progress and requests kills; the dispatch loop (started with
/// [`start`](JobQueue::start), or driven directly via [`run`](JobQueue::run))
/// advances job states by polling the driver, launches waiting jobs FIFO
/// under the concurrency cap, and returns once the batch has drained.
///
/// All state lives behind one coarse lock; the loop is poll-bound and sleeps
/// between rounds, so `add_job`, queries and kill requests issued
/// concurrently are observed within one polling interval.
///
/// Cloning is cheap and yields another handle to the same queue.
#[derive(Clone)]
pub struct JobQueue {
    driver: Arc<dyn Driver>,
    config: QueueConfig,
    state: Arc<Mutex<QueueState>>,
    shutdown: CancellationToken,
}

impl JobQueue {
    pub fn new(driver: Arc<dyn Driver>, config: QueueConfig) -> Self {
        Self {
            driver,
            config,
            state: Arc::new(Mutex::new(QueueState {
                registry: JobRegistry::new(),
                submit_complete: false,
            })),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Add a job to the batch, returning its index. The index identifies the
    /// job for the lifetime of the queue.
    ///
    /// Safe to call while the dispatch loop is running; the new job is
    /// picked up in the next round.
    ///
    /// # Errors
    ///
    /// [`QueueError::InvalidSpec`] for an empty name or command,
    /// [`QueueError::DuplicateName`] if the name is already taken.
    pub async fn add_job(&self, spec: JobSpec) -> Result<usize> {
        if spec.name.trim().is_empty() {
            return Err(QueueError::InvalidSpec("job name is empty".to_string()));
        }
        if spec.command.trim().is_empty() {
            return Err(QueueError::InvalidSpec(format!(
                "job {} has an empty command",
                spec.name
            )));
        }

        let mut state = self.state.lock().await;
        if state.registry.contains_name(&spec.name) {
            return Err(QueueError::DuplicateName(spec.name));
        }
        let index = state.registry.len();
        let name = spec.name.clone();
        state.registry.push(Job::new(index, spec));
        tracing::info!(job = %name, index, "job added");
        Ok(index)
    }

    /// Signal that no further jobs will be added, letting the dispatch loop
    /// terminate once every job is in a terminal status. Idempotent.
    ///
    /// Not needed when the queue was configured with a fixed
    /// [`size`](QueueConfig::size).
    pub async fn submit_complete(&self) {
        let mut state = self.state.lock().await;
        if !state.submit_complete {
            state.submit_complete = true;
            tracing::info!(jobs = state.registry.len(), "submission complete");
        }
    }

    /// Spawn the dispatch loop on a background task. Join the returned
    /// handle to wait for the batch to drain.
    pub fn start(&self) -> JoinHandle<Result<()>> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run().await })
    }

    /// Request cancellation of the dispatch loop. All non-terminal jobs are
    /// killed and their handles released before [`run`](JobQueue::run)
    /// returns.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// The dispatch loop. Blocks until the batch has drained: the batch must
    /// be known complete (fixed size reached, or [`submit_complete`] called)
    /// and every job must be in a terminal status.
    ///
    /// Each round, under the queue lock:
    /// 1. polls every in-flight job and advances its state machine,
    ///    resolving abnormal exits into a retry or a permanent failure
    /// 2. dispatches waiting jobs in index order while the in-flight count
    ///    is below `max_running`
    /// 3. checks the termination condition
    ///
    /// A single job's failure never aborts the loop.
    ///
    /// # Errors
    ///
    /// [`QueueError::Driver`] if the driver becomes unavailable; in-flight
    /// handles are released on the way out.
    ///
    /// [`submit_complete`]: JobQueue::submit_complete
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            max_running = self.config.max_running,
            max_submit = self.config.max_submit,
            size = ?self.config.size,
            "dispatch loop started"
        );

        loop {
            if self.shutdown.is_cancelled() {
                self.kill_remaining().await;
                tracing::info!("dispatch loop aborted");
                return Ok(());
            }

            let drained = {
                let mut state = self.state.lock().await;
                if let Err(e) = self.poll_round(&mut state).await {
                    self.kill_all(&mut state).await;
                    return Err(e);
                }
                if let Err(e) = self.dispatch_round(&mut state).await {
                    self.kill_all(&mut state).await;
                    return Err(e);
                }
                self.batch_drained(&state)
            };
            if drained {
                break;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!("batch drained, dispatch loop finished");
        Ok(())
    }

    /// Poll every in-flight job and resolve abnormal exits.
    async fn poll_round(&self, state: &mut QueueState) -> Result<()> {
        for job in state.registry.iter_mut() {
            if !matches!(job.status(), JobStatus::Pending | JobStatus::Running) {
                continue;
            }
            job.poll().await.map_err(QueueError::Driver)?;
            if job.status() == JobStatus::Exit {
                job.resolve_exit(self.config.max_submit);
            }
        }
        Ok(())
    }

    /// Launch waiting jobs in index order while below the concurrency cap.
    async fn dispatch_round(&self, state: &mut QueueState) -> Result<()> {
        let mut in_flight = state
            .registry
            .iter()
            .filter(|j| matches!(j.status(), JobStatus::Pending | JobStatus::Running))
            .count();

        let waiting: Vec<usize> = state
            .registry
            .iter()
            .filter(|j| j.status() == JobStatus::Waiting)
            .map(|j| j.index())
            .collect();

        for index in waiting {
            if in_flight >= self.config.max_running {
                break;
            }
            let Some(job) = state.registry.get_mut(index) else {
                continue;
            };
            match job.submit(&self.driver).await {
                Ok(()) => in_flight += 1,
                Err(DriverError::Rejected(reason)) => {
                    // Dispatching a later job past a rejected one would break
                    // FIFO; end the round and retry after the next interval.
                    tracing::warn!(index, reason = %reason, "submission rejected, backing off");
                    break;
                }
                Err(DriverError::Launch(e)) => {
                    tracing::warn!(index, error = %e, "job failed to launch");
                    job.launch_failed(self.config.max_submit);
                }
                Err(e @ DriverError::Unavailable(_)) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn batch_drained(&self, state: &QueueState) -> bool {
        let complete = match self.config.size {
            Some(n) => state.registry.len() >= n,
            None => state.submit_complete,
        };
        complete && state.registry.iter().all(|j| j.status().is_terminal())
    }

    async fn kill_remaining(&self) {
        let mut state = self.state.lock().await;
        self.kill_all(&mut state).await;
    }

    async fn kill_all(&self, state: &mut QueueState) {
        for job in state.registry.iter_mut() {
            job.kill().await;
        }
    }

    /// Kill the job at `index`. Unknown indexes and already-terminal jobs
    /// are no-ops; killing twice leaves the same terminal status as once.
    pub async fn kill_job(&self, index: usize) {
        let mut state = self.state.lock().await;
        match state.registry.get_mut(index) {
            Some(job) => job.kill().await,
            None => tracing::debug!(index, "kill requested for unknown job"),
        }
    }

    /// Kill the job named `name`. No-op on unknown names.
    pub async fn kill_job_by_name(&self, name: &str) {
        let index = {
            let state = self.state.lock().await;
            state.registry.index_of(name)
        };
        if let Some(index) = index {
            self.kill_job(index).await;
        } else {
            tracing::debug!(name, "kill requested for unknown job");
        }
    }

    pub async fn find_by_index(&self, index: usize) -> Option<JobInfo> {
        let state = self.state.lock().await;
        state.registry.get(index).map(Job::info)
    }

    pub async fn find_by_name(&self, name: &str) -> Option<JobInfo> {
        let state = self.state.lock().await;
        state.registry.get_by_name(name).map(Job::info)
    }

    /// Snapshots of every job, in index order.
    pub async fn jobs(&self) -> Vec<JobInfo> {
        let state = self.state.lock().await;
        state.registry.iter().map(Job::info).collect()
    }

    /// Number of jobs added so far.
    pub async fn len(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn num_running(&self) -> usize {
        self.count(JobStatus::Running).await
    }

    pub async fn num_pending(&self) -> usize {
        self.count(JobStatus::Pending).await
    }

    pub async fn num_waiting(&self) -> usize {
        self.count(JobStatus::Waiting).await
    }

    /// Jobs that finished successfully. Failed and killed jobs are visible
    /// per job via [`jobs`](JobQueue::jobs) or the lookups.
    pub async fn num_complete(&self) -> usize {
        self.count(JobStatus::Done).await
    }

    /// True while the batch has not drained: more jobs may still be added,
    /// or some job is not yet in a terminal status.
    pub async fn is_active(&self) -> bool {
        let state = self.state.lock().await;
        !self.batch_drained(&state)
    }

    /// Time since the job at `index` was dispatched, while it is in flight.
    /// `None` for unknown, never-dispatched and terminal jobs.
    pub async fn elapsed_runtime(&self, index: usize) -> Option<Duration> {
        let state = self.state.lock().await;
        state.registry.get(index).and_then(Job::elapsed_runtime)
    }

    async fn count(&self, status: JobStatus) -> usize {
        let state = self.state.lock().await;
        state.registry.iter().filter(|j| j.status() == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LocalDriver;

    fn queue() -> JobQueue {
        JobQueue::new(Arc::new(LocalDriver::new()), QueueConfig::default())
    }

    #[tokio::test]
    async fn add_job_rejects_empty_name() {
        let q = queue();
        let err = q.add_job(JobSpec::new("", "true")).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidSpec(_)));
    }

    #[tokio::test]
    async fn add_job_rejects_empty_command() {
        let q = queue();
        let err = q.add_job(JobSpec::new("j0", "  ")).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidSpec(_)));
    }

    #[tokio::test]
    async fn add_job_rejects_duplicate_name() {
        let q = queue();
        q.add_job(JobSpec::new("j0", "true")).await.unwrap();
        let err = q.add_job(JobSpec::new("j0", "true")).await.unwrap_err();
        assert!(matches!(err, QueueError::DuplicateName(name) if name == "j0"));
    }

    #[tokio::test]
    async fn add_job_assigns_sequential_indexes() {
        let q = queue();
        assert_eq!(q.add_job(JobSpec::new("a", "true")).await.unwrap(), 0);
        assert_eq!(q.add_job(JobSpec::new("b", "true")).await.unwrap(), 1);
        assert_eq!(q.len().await, 2);
    }

    #[tokio::test]
    async fn new_job_is_waiting() {
        let q = queue();
        let index = q.add_job(JobSpec::new("j0", "true")).await.unwrap();
        let info = q.find_by_index(index).await.unwrap();
        assert_eq!(info.status, JobStatus::Waiting);
        assert_eq!(info.submit_count, 0);
        assert!(q.elapsed_runtime(index).await.is_none());
    }

    #[tokio::test]
    async fn dual_lookup() {
        let q = queue();
        q.add_job(JobSpec::new("j0", "true")).await.unwrap();
        assert_eq!(q.find_by_name("j0").await.unwrap().index, 0);
        assert!(q.find_by_name("nope").await.is_none());
        assert!(q.find_by_index(7).await.is_none());
    }
}
