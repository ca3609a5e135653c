use thiserror::Error;

/// Errors reported by an execution driver.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The driver refused to start the job, typically because resources are
    /// exhausted. The job stays waiting and is retried next round; no
    /// submission attempt is consumed.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The job could not be launched at all (bad command, permissions).
    /// Consumes one submission attempt, like an abnormal exit.
    #[error("failed to launch job: {0}")]
    Launch(#[from] std::io::Error),

    /// The driver itself is broken. Fatal to the whole queue.
    #[error("driver unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("invalid job spec: {0}")]
    InvalidSpec(String),

    #[error("duplicate job name: {0}")]
    DuplicateName(String),

    #[error("driver failure: {0}")]
    Driver(#[from] DriverError),
}

pub type Result<T> = std::result::Result<T, QueueError>;
