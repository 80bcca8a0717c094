//! Event-loop bridge - supervisor operations as "issue now, message later"
//!
//! Every operation spawns a task and returns at once. Results come back as
//! [`Message`]s on one unbounded queue, which a single presentation loop
//! drains through [`BridgeEvents`]. Background tasks never touch the
//! loop's state directly.
//!
//! ```text
//! launch ──► ProcessStarted | Finished{err}
//! listen ──► Output, Output, ...            (until the channel closes)
//! await_completion ──► Cancelled | Finished  (exactly one, after all Output)
//!                      Finished passes through the enricher, if any
//! cancel ──► (nothing; the completion task reports Cancelled)
//! ```

mod message;
mod status;

pub use message::{Finished, Message};
pub use status::{CompletionResult, ProcessState, Status};

use crate::output::ListenPoll;
use crate::process::{HandleId, ProcessHandle, WaitResult};
use crate::supervisor::Supervisor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiving end of the bridge, owned by the presentation loop
pub struct BridgeEvents {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl BridgeEvents {
    /// Next message. `None` once every bridge clone is dropped.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`next`](Self::next)
    pub fn try_next(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

/// Issues supervisor operations as tasks
#[derive(Clone)]
pub struct Bridge {
    supervisor: Arc<Supervisor>,
    tx: mpsc::UnboundedSender<Message>,

    /// Listen forwarders by handle, so completion can wait for them
    listeners: Arc<Mutex<HashMap<HandleId, JoinHandle<()>>>>,

    enricher: Option<Arc<dyn CompletionEnricher>>,
}

/// Fills in a `Finished` record before it is reported.
///
/// Runs on the blocking pool, so implementations may read files.
pub trait CompletionEnricher: Send + Sync {
    fn enrich(&self, finished: Finished) -> Finished;
}

impl<F> CompletionEnricher for F
where
    F: Fn(Finished) -> Finished + Send + Sync,
{
    fn enrich(&self, finished: Finished) -> Finished {
        self(finished)
    }
}

impl Bridge {
    pub fn new(supervisor: Arc<Supervisor>) -> (Self, BridgeEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            supervisor,
            tx,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            enricher: None,
        };
        (bridge, BridgeEvents { rx })
    }

    /// Run `enricher` on every `Finished` that carries no error.
    pub fn with_enricher(mut self, enricher: Arc<dyn CompletionEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Listen forwarders not yet collected by a completion task
    pub fn active_listeners(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Start the worker for `session_id`.
    ///
    /// Emits `ProcessStarted` on success or `Finished{err}` on failure.
    pub fn launch(&self, session_id: impl Into<String>) -> JoinHandle<()> {
        let session_id = session_id.into();
        let supervisor = Arc::clone(&self.supervisor);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let message = match supervisor.launch(&session_id) {
                Ok(handle) => Message::ProcessStarted { handle, session_id },
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "Launch failed");
                    Message::Finished(Finished::failed(session_id, err))
                }
            };
            let _ = tx.send(message);
        })
    }

    /// Forward the handle's output as `Output` messages.
    ///
    /// Idle polls emit nothing; the forwarder stops once the channel closes.
    /// Returns false if the output was already taken.
    pub fn listen(&self, handle: &Arc<ProcessHandle>) -> bool {
        let Some(mut output) = handle.take_output() else {
            return false;
        };

        let tx = self.tx.clone();
        let poll = self.supervisor.config().listen_poll;
        let session_id = handle.session_id().to_string();

        let forwarder = tokio::spawn(async move {
            let mut forwarded = 0usize;
            loop {
                match output.recv_timeout(poll).await {
                    ListenPoll::Record(record) => {
                        let message = Message::Output {
                            session_id: session_id.clone(),
                            line: record.line,
                            is_error: record.is_error,
                        };
                        if tx.send(message).is_err() {
                            break;
                        }
                        forwarded += 1;
                    }
                    ListenPoll::Idle => {
                        if tx.is_closed() {
                            break;
                        }
                    }
                    ListenPoll::Closed => break,
                }
            }
            debug!(session_id = %session_id, forwarded, "Listener stopped");
        });

        self.listeners.lock().insert(handle.id(), forwarder);
        true
    }

    /// Wait for the worker and emit exactly one terminal message.
    ///
    /// Any output still flowing through this bridge is forwarded first. Only
    /// the first call per handle reports; later calls return a task that
    /// does nothing.
    pub fn await_completion(&self, handle: Arc<ProcessHandle>) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let listeners = Arc::clone(&self.listeners);
        let drain_bound = self.supervisor.config().cancel_timeout;
        let enricher = self.enricher.clone();
        let owner = handle.claim_report();

        tokio::spawn(async move {
            if !owner {
                debug!(session_id = %handle.session_id(), "Completion already awaited");
                return;
            }

            let result = handle.wait().await;

            let listener = listeners.lock().remove(&handle.id());
            if let Some(listener) = listener {
                drain_listener(&handle, listener, drain_bound).await;
            }

            let message = match (completion_message(&handle, result), enricher) {
                (Message::Finished(finished), Some(enricher)) if !finished.is_error() => {
                    Message::Finished(enrich(enricher, finished).await)
                }
                (message, _) => message,
            };
            info!(
                session_id = %handle.session_id(),
                cancelled = handle.is_cancelled(),
                "Worker completion reported"
            );
            let _ = tx.send(message);
        })
    }

    /// Cancel the worker. The completion task reports `Cancelled`.
    pub fn cancel(&self, handle: Arc<ProcessHandle>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = handle.cancel().await {
                debug!(session_id = %handle.session_id(), error = %err, "Cancel reported an error");
            }
        })
    }
}

/// Run the enricher off the async workers. A panic costs only the extra fields.
async fn enrich(enricher: Arc<dyn CompletionEnricher>, finished: Finished) -> Finished {
    let fallback = finished.clone();
    match tokio::task::spawn_blocking(move || enricher.enrich(finished)).await {
        Ok(finished) => finished,
        Err(e) => {
            warn!(session_id = %fallback.session_id, error = %e, "Completion enricher failed");
            fallback
        }
    }
}

/// Let the forwarder deliver what the relays already read. If the pipes
/// outlive the process (a grandchild holding them), stop the relays after
/// `bound` instead of waiting forever.
async fn drain_listener(handle: &ProcessHandle, mut listener: JoinHandle<()>, bound: Duration) {
    if tokio::time::timeout(bound, &mut listener).await.is_ok() {
        return;
    }

    warn!(
        session_id = %handle.session_id(),
        "Output still open after exit, stopping relays"
    );
    handle.stop_relays();
    handle.join_relays().await;
    // Both senders are gone now, so the forwarder sees Closed after the buffer.
    let _ = listener.await;
}

/// Terminal message for a reaped (or cancelled) worker
pub fn completion_message(handle: &ProcessHandle, result: WaitResult) -> Message {
    let session_id = handle.session_id().to_string();
    if handle.is_cancelled() {
        return Message::Cancelled { session_id };
    }
    match result {
        Ok(exit) => Message::Finished(Finished::complete(session_id, exit)),
        Err(err) => Message::Finished(Finished::failed(session_id, err)),
    }
}
