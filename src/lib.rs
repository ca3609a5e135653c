//! An embeddable job queue: jobs run through a pluggable execution driver,
//! dispatched FIFO under a concurrency cap, with per-job retry on abnormal
//! exit and live status queries while the batch drains.

pub mod config;
pub mod driver;
pub mod error;
pub mod queue;

pub use config::QueueConfig;
pub use driver::{Driver, DriverStatus, JobHandle, LocalDriver};
pub use error::{DriverError, QueueError, Result};
pub use queue::{JobInfo, JobQueue, JobSpec, JobStatus};
