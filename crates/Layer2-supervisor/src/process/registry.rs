//! Active session registry - at most one running worker per session

use crate::error::ProcessError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sessions that currently own a running worker
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    inner: Arc<Mutex<HashMap<String, u64>>>,
    next_generation: Arc<AtomicU64>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `session_id`, failing if a worker is already registered for it.
    pub fn register(&self, session_id: &str) -> Result<Registration, ProcessError> {
        let mut sessions = self.inner.lock();
        if sessions.contains_key(session_id) {
            return Err(ProcessError::AlreadyRunning(session_id.to_string()));
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        sessions.insert(session_id.to_string(), generation);

        Ok(Registration {
            sessions: self.clone(),
            session_id: session_id.to_string(),
            generation,
        })
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.inner.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn release(&self, session_id: &str, generation: u64) -> bool {
        let mut sessions = self.inner.lock();
        // A newer registration for the same session must survive.
        if sessions.get(session_id) == Some(&generation) {
            sessions.remove(session_id);
            true
        } else {
            false
        }
    }
}

/// Claim on a session. Released explicitly or on drop, whichever is first.
#[derive(Debug)]
pub struct Registration {
    sessions: ActiveSessions,
    session_id: String,
    generation: u64,
}

impl Registration {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Unique per registration, never reused
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Release the claim. Returns false if it was already released.
    pub fn release(&self) -> bool {
        self.sessions.release(&self.session_id, self.generation)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}
