//! Worker processes
//!
//! - `backend` - how a worker is started and reaped (`ProcessBackend`, `WorkerChild`)
//! - `relay` - one line-reading loop per pipe
//! - `handle` - `ProcessHandle`: relays, completion barrier, cancellation
//! - `registry` - at most one running worker per session

pub mod backend;
pub mod handle;
pub mod registry;
pub mod relay;

pub use backend::{
    BoxedReader, ExitOutcome, ProcessBackend, Reaped, SpawnedWorker, TokioBackend, WorkerChild,
};
pub use handle::{HandleId, ProcessHandle, WaitResult};
pub use registry::{ActiveSessions, Registration};
pub use relay::{relay_lines, spawn_relay, RelayExit};
