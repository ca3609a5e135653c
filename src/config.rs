use std::time::Duration;

/// Configuration for a [`JobQueue`](crate::queue::JobQueue).
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of jobs in flight (submitted or running) at once.
    pub max_running: usize,

    /// Total submission attempts per job. 1 means no retry: a job that
    /// exits abnormally goes straight to `Failed`.
    pub max_submit: u32,

    /// Sleep between polling rounds of the dispatch loop.
    pub poll_interval: Duration,

    /// Number of jobs this batch will contain, if known up front.
    /// When `None` the queue grows as needed and the caller must signal
    /// `submit_complete()` for the dispatch loop to terminate.
    pub size: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_running: 4,
            max_submit: 1,
            poll_interval: Duration::from_millis(100),
            size: None,
        }
    }
}

impl QueueConfig {
    pub fn new(max_running: usize) -> Self {
        Self {
            max_running,
            ..Default::default()
        }
    }

    pub fn with_max_submit(mut self, max_submit: u32) -> Self {
        self.max_submit = max_submit;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}
