//! Supervisor errors
//!
//! `Clone` so that one wait result can be handed to every waiter.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// Executable missing, permission denied, pipe creation failed
    #[error("failed to launch {program}: {message}")]
    Launch { program: String, message: String },

    /// Another worker is still running for this session
    #[error("session {0} already has a running worker")]
    AlreadyRunning(String),

    #[error("invalid session id: {0:?}")]
    InvalidSession(String),

    /// The OS wait failed for a reason other than an exit status
    #[error("failed to wait for worker: {0}")]
    Wait(String),

    /// Termination request failed; diagnostic only
    #[error("failed to terminate worker: {0}")]
    Kill(String),
}

impl ProcessError {
    pub fn launch(program: &Path, err: &std::io::Error) -> Self {
        ProcessError::Launch {
            program: program.display().to_string(),
            message: err.to_string(),
        }
    }

    /// True for errors that happen before any process exists
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            ProcessError::Launch { .. }
                | ProcessError::AlreadyRunning(_)
                | ProcessError::InvalidSession(_)
        )
    }
}

impl From<ProcessError> for juggle_foundation::Error {
    fn from(err: ProcessError) -> Self {
        use juggle_foundation::Error;
        match err {
            ProcessError::Launch { .. } => Error::Launch(err.to_string()),
            ProcessError::AlreadyRunning(session) => Error::AlreadyRunning(session),
            ProcessError::InvalidSession(_) => Error::InvalidInput(err.to_string()),
            ProcessError::Wait(message) => Error::Wait(message),
            ProcessError::Kill(message) => Error::Internal(message),
        }
    }
}
