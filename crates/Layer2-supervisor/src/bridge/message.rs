//! Bridge messages - everything the presentation loop hears about a worker

use crate::error::ProcessError;
use crate::process::{ExitOutcome, ProcessHandle};
use juggle_foundation::SessionProgress;
use std::sync::Arc;

/// One message from a bridge task to the presentation loop
#[derive(Debug, Clone)]
pub enum Message {
    /// Launch succeeded
    ProcessStarted {
        handle: Arc<ProcessHandle>,
        session_id: String,
    },

    /// One line of worker output
    Output {
        session_id: String,
        line: String,
        is_error: bool,
    },

    /// Terminal: the worker exited, or never started
    Finished(Finished),

    /// Terminal: the worker was cancelled
    Cancelled { session_id: String },
}

impl Message {
    pub fn session_id(&self) -> &str {
        match self {
            Message::ProcessStarted { session_id, .. } => session_id,
            Message::Output { session_id, .. } => session_id,
            Message::Finished(finished) => &finished.session_id,
            Message::Cancelled { session_id } => session_id,
        }
    }

    /// No further messages follow a terminal one for the same process
    pub fn is_terminal(&self) -> bool {
        matches!(self, Message::Finished(_) | Message::Cancelled { .. })
    }
}

/// Completion record for one worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finished {
    pub session_id: String,

    /// The worker ran to exit, whatever its status code
    pub complete: bool,

    pub blocked: bool,
    pub blocked_reason: Option<String>,
    pub iterations: u32,
    pub balls_complete: u32,
    pub balls_total: u32,

    /// How the process ended, when it ran
    pub exit: Option<ExitOutcome>,

    /// Launch or wait failure
    pub err: Option<ProcessError>,
}

impl Finished {
    /// Worker exited; a non-zero status is still a completion
    pub fn complete(session_id: impl Into<String>, exit: ExitOutcome) -> Self {
        Self {
            session_id: session_id.into(),
            complete: true,
            exit: Some(exit),
            ..Default::default()
        }
    }

    pub fn failed(session_id: impl Into<String>, err: ProcessError) -> Self {
        Self {
            session_id: session_id.into(),
            err: Some(err),
            ..Default::default()
        }
    }

    /// Fill in the session's record from the store.
    pub fn with_progress(mut self, progress: &SessionProgress) -> Self {
        self.blocked = progress.blocked;
        self.blocked_reason = progress.blocked_reason.clone();
        self.iterations = progress.iterations;
        self.balls_complete = progress.balls_complete;
        self.balls_total = progress.balls_total;
        self
    }

    pub fn is_error(&self) -> bool {
        self.err.is_some()
    }
}
