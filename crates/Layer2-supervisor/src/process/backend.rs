//! Process backend - the seam between the supervisor and the OS
//!
//! `TokioBackend` is what runs in production. Tests substitute their own
//! backend to count waits and kills.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Boxed pipe reader handed to a relay
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// How a reaped process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitOutcome {
    /// Zero exit status
    Success,
    /// Non-zero exit status
    Code(i32),
    /// Terminated by a signal (number when the platform reports one)
    Signal(Option<i32>),
}

impl ExitOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            return ExitOutcome::Success;
        }
        match status.code() {
            Some(code) => ExitOutcome::Code(code),
            None => ExitOutcome::Signal(signal_of(&status)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Success => Some(0),
            ExitOutcome::Code(code) => Some(*code),
            ExitOutcome::Signal(_) => None,
        }
    }
}

impl std::fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitOutcome::Success => write!(f, "exit 0"),
            ExitOutcome::Code(code) => write!(f, "exit {}", code),
            ExitOutcome::Signal(Some(signal)) => write!(f, "signal {}", signal),
            ExitOutcome::Signal(None) => write!(f, "terminated"),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Result of reaping a process
#[derive(Debug)]
pub struct Reaped {
    /// Exit status, or the error from the OS wait
    pub status: io::Result<ExitStatus>,
    /// Error from the termination request, if one was made and failed
    pub kill_error: Option<io::Error>,
}

/// A started worker process
#[async_trait]
pub trait WorkerChild: Send {
    /// OS process id, if still known
    fn id(&self) -> Option<u32>;

    /// Reap the process. Called at most once per process.
    ///
    /// If `terminate` fires before the process exits, the process is killed
    /// and then reaped in the same call.
    async fn wait(&mut self, terminate: CancellationToken) -> Reaped;
}

/// A started worker plus its two pipes
pub struct SpawnedWorker {
    pub child: Box<dyn WorkerChild>,
    pub stdout: BoxedReader,
    pub stderr: BoxedReader,
}

/// Process backend trait - implement to change how workers are started
pub trait ProcessBackend: Send + Sync {
    /// Start `program` with `args`, stdout and stderr piped.
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<SpawnedWorker>;

    /// Get backend name
    fn name(&self) -> &'static str;
}

// ============================================================================
// Tokio backend
// ============================================================================

/// Runs workers with `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioBackend;

impl ProcessBackend for TokioBackend {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<SpawnedWorker> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        // Dropping `child` on the error paths kills it (kill_on_drop).
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdout pipe unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stderr pipe unavailable"))?;

        debug!(program = %program.display(), pid = ?child.id(), "Spawned worker");

        Ok(SpawnedWorker {
            child: Box::new(TokioChild { child }),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        })
    }

    fn name(&self) -> &'static str {
        "tokio"
    }
}

struct TokioChild {
    child: Child,
}

#[async_trait]
impl WorkerChild for TokioChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self, terminate: CancellationToken) -> Reaped {
        tokio::select! {
            biased;
            status = self.child.wait() => {
                return Reaped { status, kill_error: None };
            }
            _ = terminate.cancelled() => {}
        }

        let kill_error = self.child.start_kill().err();
        Reaped {
            status: self.child.wait().await,
            kill_error,
        }
    }
}
