//! Supervisor - launches workers as `<tool> agent run <session>`
//!
//! Must be called from inside a tokio runtime: the relays are spawned as
//! tasks before `launch` returns.

use crate::config::SupervisorConfig;
use crate::error::ProcessError;
use crate::process::{ActiveSessions, ProcessBackend, ProcessHandle, TokioBackend};
use std::sync::Arc;
use tracing::{info, warn};

/// Launches worker processes and tracks which sessions own one
pub struct Supervisor {
    backend: Arc<dyn ProcessBackend>,
    config: SupervisorConfig,
    sessions: ActiveSessions,
}

impl Supervisor {
    /// Create a supervisor backed by `tokio::process`
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_backend(config, Arc::new(TokioBackend))
    }

    /// Create a supervisor with a custom process backend
    pub fn with_backend(config: SupervisorConfig, backend: Arc<dyn ProcessBackend>) -> Self {
        Self {
            backend,
            config,
            sessions: ActiveSessions::new(),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Sessions that currently own a running worker
    pub fn sessions(&self) -> &ActiveSessions {
        &self.sessions
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Positional arguments for a session's worker
    pub fn command_args(session_id: &str) -> Vec<String> {
        vec!["agent".to_string(), "run".to_string(), session_id.to_string()]
    }

    /// Start the worker for `session_id`.
    ///
    /// On error nothing is left behind: no process, no relays, no session
    /// claim.
    pub fn launch(&self, session_id: &str) -> Result<Arc<ProcessHandle>, ProcessError> {
        if session_id.trim().is_empty() {
            return Err(ProcessError::InvalidSession(session_id.to_string()));
        }

        let registration = self.sessions.register(session_id)?;

        let args = Self::command_args(session_id);
        let worker = self.backend.spawn(&self.config.tool, &args).map_err(|e| {
            warn!(
                session_id = %session_id,
                tool = %self.config.tool.display(),
                error = %e,
                "Failed to launch worker"
            );
            ProcessError::launch(&self.config.tool, &e)
        })?;

        let handle = ProcessHandle::start(session_id, worker, &self.config, Some(registration));
        info!(
            session_id = %session_id,
            pid = ?handle.pid(),
            handle = %handle.id(),
            backend = self.backend.name(),
            "Worker launched"
        );

        Ok(handle)
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("sessions", &self.sessions.sessions())
            .finish()
    }
}
