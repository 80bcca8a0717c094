//! # juggle-supervisor
//!
//! Agent process supervisor for Juggle.
//! Launches `<tool> agent run <session>`, streams its output line by line,
//! and cancels it within a bounded time.
//!
//! ## Features
//!
//! - Two stream relays per worker (stdout, stderr) into one bounded channel
//! - Single-fire completion barrier: one OS wait, any number of waiters
//! - Idempotent, bounded cancellation
//! - At most one running worker per session
//! - **Event-loop bridge** for a single-threaded presentation loop
//!
//! ## Example
//!
//! ```ignore
//! let supervisor = Arc::new(Supervisor::new(SupervisorConfig::default()));
//! let (bridge, mut events) = Bridge::new(supervisor);
//!
//! bridge.launch("session-1");
//! while let Some(message) = events.next().await {
//!     match message {
//!         Message::ProcessStarted { handle, .. } => {
//!             bridge.listen(&handle);
//!             bridge.await_completion(handle);
//!         }
//!         Message::Output { line, .. } => println!("{}", line),
//!         _ => break,
//!     }
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod output;
pub mod process;
pub mod supervisor;

// Supervisor
pub use config::SupervisorConfig;
pub use error::ProcessError;
pub use supervisor::Supervisor;

// Process system
pub use output::{output_channel, ListenPoll, OutputReceiver, OutputRecord, OutputSender, StreamKind};
pub use process::{
    ActiveSessions, ExitOutcome, HandleId, ProcessBackend, ProcessHandle, Reaped, SpawnedWorker,
    TokioBackend, WaitResult, WorkerChild,
};

// Bridge
pub use bridge::{
    completion_message, Bridge, BridgeEvents, CompletionEnricher, CompletionResult, Finished,
    Message, ProcessState, Status,
};
