//! Monitor - presentation-loop state for one session
//!
//! Shared by the terminal UI and plain mode. Owns nothing that blocks: every
//! supervisor call goes through the [`Bridge`], and this type only reacts to
//! the messages that come back.

use crate::output_log::{OutputLine, OutputLog};
use juggle_foundation::{MonitorConfig, SessionStore};
use juggle_supervisor::{
    Bridge, CompletionEnricher, CompletionResult, Finished, Message, ProcessHandle, ProcessState,
    Status,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the loop should do after a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Nothing visible changed
    None,
    /// A new output line was retained
    Line,
    /// Lifecycle changed (started, finished, cancelled)
    State,
}

pub struct Monitor {
    session_id: String,
    status: Status,
    state: ProcessState,
    log: OutputLog,
    handle: Option<Arc<ProcessHandle>>,
    completion: Option<CompletionResult>,
    last_finished: Option<Finished>,
    cancel_requested: bool,
}

impl Monitor {
    pub fn new(session_id: impl Into<String>, config: &MonitorConfig) -> Self {
        let session_id = session_id.into();
        Self {
            status: Status::new(session_id.clone(), config.max_iterations()),
            session_id,
            state: ProcessState::NotStarted,
            log: OutputLog::new(config.scrollback()),
            handle: None,
            completion: None,
            last_finished: None,
            cancel_requested: false,
        }
    }

    /// Issue the launch for this monitor's session.
    pub fn start(&self, bridge: &Bridge) {
        bridge.launch(self.session_id.clone());
    }

    /// React to one bridge message.
    pub fn handle_message(&mut self, message: Message, bridge: &Bridge) -> Update {
        if message.session_id() != self.session_id {
            debug!(session_id = %message.session_id(), "Ignoring message for another session");
            return Update::None;
        }

        self.status.apply(&message);
        self.state = self.state.transition(&message);

        match message {
            Message::ProcessStarted { handle, .. } => {
                bridge.listen(&handle);
                bridge.await_completion(Arc::clone(&handle));
                // Cancel pressed before the launch landed.
                if self.cancel_requested {
                    bridge.cancel(Arc::clone(&handle));
                }
                self.handle = Some(handle);
                Update::State
            }
            Message::Output { line, is_error, .. } => {
                self.log.push(line, is_error);
                Update::Line
            }
            Message::Finished(finished) => {
                self.completion = Some(CompletionResult::from_finished(
                    &finished,
                    self.status.max_iterations,
                ));
                self.last_finished = Some(finished);
                self.handle = None;
                Update::State
            }
            Message::Cancelled { .. } => {
                self.completion = Some(CompletionResult::Cancelled);
                self.handle = None;
                Update::State
            }
        }
    }

    /// Ask the bridge to cancel the worker. Returns false if there is
    /// nothing left to cancel.
    pub fn request_cancel(&mut self, bridge: &Bridge) -> bool {
        if self.is_done() || self.cancel_requested {
            return false;
        }
        self.cancel_requested = true;
        if let Some(handle) = &self.handle {
            bridge.cancel(Arc::clone(handle));
        }
        true
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    pub fn log(&self) -> &OutputLog {
        &self.log
    }

    pub fn last_line(&self) -> Option<&OutputLine> {
        self.log.tail(1).next()
    }

    pub fn completion(&self) -> Option<&CompletionResult> {
        self.completion.as_ref()
    }

    pub fn last_finished(&self) -> Option<&Finished> {
        self.last_finished.as_ref()
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancel_requested && !self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.completion.is_some()
    }

    /// One-line summary of the outcome
    pub fn summary(&self) -> String {
        let Some(result) = &self.completion else {
            return format!("{} {}", self.state.symbol(), self.state.display_name());
        };

        let mut summary = format!("{} {}", self.state.symbol(), result.display_name());
        if let CompletionResult::Error(err) = result {
            summary.push_str(&format!(": {}", err));
        }
        if let Some(finished) = &self.last_finished {
            if let Some(exit) = finished.exit {
                summary.push_str(&format!(" ({})", exit));
            }
            if finished.balls_total > 0 {
                summary.push_str(&format!(
                    " - balls {}/{}",
                    finished.balls_complete, finished.balls_total
                ));
            }
            if finished.blocked {
                summary.push_str(" - blocked");
                if let Some(reason) = &finished.blocked_reason {
                    summary.push_str(&format!(": {}", reason));
                }
            }
        }
        summary
    }

    /// Exit status for the binary
    pub fn exit_code(&self) -> i32 {
        self.completion.as_ref().map_or(1, CompletionResult::exit_code)
    }
}

/// Fills completion records from the session store. The bridge runs it on
/// the blocking pool, so the file read never stalls the loop.
pub struct SessionEnricher {
    store: Box<dyn SessionStore>,
}

impl SessionEnricher {
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self { store }
    }
}

impl CompletionEnricher for SessionEnricher {
    /// A store failure only costs the extra fields.
    fn enrich(&self, finished: Finished) -> Finished {
        match self.store.load_progress(&finished.session_id) {
            Ok(Some(progress)) => finished.with_progress(&progress),
            Ok(None) => finished,
            Err(e) => {
                warn!(session_id = %finished.session_id, error = %e, "Failed to load session progress");
                finished
            }
        }
    }
}
