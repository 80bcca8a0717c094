//! Status, lifecycle state and completion result, all derived from messages

use super::message::{Finished, Message};
use crate::error::ProcessError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Status
// ============================================================================

/// What the presentation loop shows about the current worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub running: bool,
    pub session_id: String,
    pub iteration: u32,
    pub max_iterations: u32,
}

impl Status {
    pub fn new(session_id: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            running: false,
            session_id: session_id.into(),
            iteration: 0,
            max_iterations,
        }
    }

    /// Update from a bridge message. Messages for other sessions are ignored.
    pub fn apply(&mut self, message: &Message) {
        if !self.session_id.is_empty() && message.session_id() != self.session_id {
            return;
        }

        match message {
            Message::ProcessStarted { session_id, .. } => {
                self.running = true;
                self.session_id = session_id.clone();
                self.iteration = 0;
            }
            Message::Output { .. } => {}
            Message::Finished(finished) => {
                self.running = false;
                if finished.iterations > 0 {
                    self.iteration = finished.iterations;
                }
            }
            Message::Cancelled { .. } => {
                self.running = false;
            }
        }
    }

    pub fn progress_label(&self) -> String {
        if self.max_iterations > 0 {
            format!("{}/{}", self.iteration, self.max_iterations)
        } else {
            self.iteration.to_string()
        }
    }
}

// ============================================================================
// CompletionResult
// ============================================================================

/// How a launched worker ended. Produced once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    Complete,
    Cancelled,
    Error(ProcessError),
    MaxIterationsReached,
}

impl CompletionResult {
    /// Derive from a terminal message; `None` for anything else.
    pub fn from_message(message: &Message, max_iterations: u32) -> Option<Self> {
        match message {
            Message::Cancelled { .. } => Some(CompletionResult::Cancelled),
            Message::Finished(finished) => Some(Self::from_finished(finished, max_iterations)),
            _ => None,
        }
    }

    pub fn from_finished(finished: &Finished, max_iterations: u32) -> Self {
        if let Some(err) = &finished.err {
            return CompletionResult::Error(err.clone());
        }

        let all_done = finished.balls_total > 0 && finished.balls_complete >= finished.balls_total;
        if max_iterations > 0 && finished.iterations >= max_iterations && !all_done {
            return CompletionResult::MaxIterationsReached;
        }

        CompletionResult::Complete
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompletionResult::Complete)
    }

    /// Process exit status for the monitor binary
    pub fn exit_code(&self) -> i32 {
        match self {
            CompletionResult::Complete => 0,
            CompletionResult::Error(_) => 1,
            CompletionResult::MaxIterationsReached => 2,
            CompletionResult::Cancelled => 130,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CompletionResult::Complete => "Complete",
            CompletionResult::Cancelled => "Cancelled",
            CompletionResult::Error(_) => "Error",
            CompletionResult::MaxIterationsReached => "Max iterations reached",
        }
    }
}

// ============================================================================
// ProcessState
// ============================================================================

/// Lifecycle of one launched process as seen through bridge messages
///
/// ```text
/// NotStarted ──launch ok──► Running ──► Completed | Cancelled | Failed
/// NotStarted ──launch failed──────────► Failed
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProcessState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

impl ProcessState {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessState::Completed | ProcessState::Cancelled | ProcessState::Failed(_)
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }

    /// Get display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            ProcessState::NotStarted => "Not started",
            ProcessState::Running => "Running",
            ProcessState::Completed => "Completed",
            ProcessState::Cancelled => "Cancelled",
            ProcessState::Failed(_) => "Failed",
        }
    }

    /// Get a symbol for the state (for TUI)
    pub fn symbol(&self) -> &'static str {
        match self {
            ProcessState::NotStarted => "◯",
            ProcessState::Running => "⟳",
            ProcessState::Completed => "✓",
            ProcessState::Cancelled => "⊘",
            ProcessState::Failed(_) => "✗",
        }
    }

    /// Next state after `message`. Terminal states never change.
    pub fn transition(&self, message: &Message) -> ProcessState {
        if self.is_terminal() {
            return self.clone();
        }

        match (self, message) {
            (ProcessState::NotStarted, Message::ProcessStarted { .. }) => ProcessState::Running,
            (_, Message::Finished(finished)) => match &finished.err {
                Some(err) => ProcessState::Failed(err.to_string()),
                None if self.is_running() => ProcessState::Completed,
                None => ProcessState::Failed("finished before it started".to_string()),
            },
            (ProcessState::Running, Message::Cancelled { .. }) => ProcessState::Cancelled,
            _ => self.clone(),
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Failed(reason) => write!(f, "Failed: {}", reason),
            other => f.write_str(other.display_name()),
        }
    }
}
