use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::driver::{Driver, DriverStatus, JobHandle};
use crate::error::DriverError;
use crate::queue::JobSpec;

/// Runs jobs as local child processes.
///
/// Jobs are spawned directly via fork/exec with stdout/stderr discarded;
/// a job that wants its output kept should redirect it itself. Local
/// processes have no queueing stage of their own, so a successfully spawned
/// job reports [`DriverStatus::Running`] until it exits.
#[derive(Debug, Clone, Default)]
pub struct LocalDriver;

impl LocalDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for LocalDriver {
    async fn submit(&self, spec: &JobSpec) -> Result<Box<dyn JobHandle>, DriverError> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| match e.kind() {
            // Out of pids/fds: worth retrying once something drains.
            io::ErrorKind::WouldBlock | io::ErrorKind::ResourceBusy => {
                DriverError::Rejected(e.to_string())
            }
            _ => DriverError::Launch(e),
        })?;

        tracing::debug!(job = %spec.name, command = %spec.command, pid = ?child.id(), "spawned local job");

        Ok(Box::new(LocalHandle { child }))
    }
}

struct LocalHandle {
    child: Child,
}

#[async_trait]
impl JobHandle for LocalHandle {
    async fn poll(&mut self) -> Result<DriverStatus, DriverError> {
        match self.child.try_wait() {
            Ok(Some(status)) if status.success() => Ok(DriverStatus::Done),
            Ok(Some(_)) => Ok(DriverStatus::Exit),
            Ok(None) => Ok(DriverStatus::Running),
            Err(e) => Err(DriverError::Unavailable(e.to_string())),
        }
    }

    async fn kill(&mut self) -> Result<(), DriverError> {
        // start_kill fails if the process already exited; that is the
        // idempotent case, not a failure.
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        Ok(())
    }
}
