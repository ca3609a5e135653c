//! Execution drivers: the backends that actually start, monitor and kill
//! external work.
//!
//! The queue engine is polymorphic over the [`Driver`] capability contract:
//! - **submit**: start one unit of work, yielding an owned [`JobHandle`]
//! - **poll**: cheaply re-check the state of that work
//! - **kill**: best-effort, idempotent cancellation
//!
//! # Components
//!
//! - [`Driver`]: submission entry point, shared by all jobs of a queue
//! - [`JobHandle`]: owned handle for one submitted job; dropped when the job
//!   reaches a terminal status
//! - [`LocalDriver`](local::LocalDriver): runs jobs as local child processes
//!
//! A cluster/batch-scheduler driver is an external concern; anything that can
//! answer the three capabilities above can back a queue.

pub mod local;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::queue::JobSpec;

pub use local::LocalDriver;

/// State of a submitted job as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Accepted by the driver, not yet running.
    Pending,
    /// Running.
    Running,
    /// Finished successfully.
    Done,
    /// Exited abnormally.
    Exit,
}

/// Owned handle to one submitted job.
///
/// The handle is the job's claim on driver-side resources; dropping it
/// releases them. `poll` must be cheap and repeatable.
#[async_trait]
pub trait JobHandle: Send {
    async fn poll(&mut self) -> Result<DriverStatus, DriverError>;

    /// Best-effort cancellation. Killing work that already finished is a
    /// no-op, not an error.
    async fn kill(&mut self) -> Result<(), DriverError>;
}

/// Capability contract for an execution backend.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Start the work described by `spec`.
    ///
    /// # Errors
    ///
    /// [`DriverError::Rejected`] when the backend is temporarily out of
    /// resources, [`DriverError::Launch`] when the work cannot start at all.
    async fn submit(&self, spec: &JobSpec) -> Result<Box<dyn JobHandle>, DriverError>;
}
