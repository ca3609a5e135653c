pub mod engine;
pub mod job;
mod registry;

pub use engine::JobQueue;
pub use job::{JobInfo, JobSpec, JobStatus};
