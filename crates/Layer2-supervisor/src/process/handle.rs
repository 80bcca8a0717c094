//! Process handle - one launched worker
//!
//! Owns the worker's two relays, the cancellation signal shared by those
//! relays, and the completion barrier around the OS wait.
//!
//! ## Completion barrier
//!
//! The wait future is built once at launch and wrapped in
//! [`futures::future::Shared`]. The first [`ProcessHandle::wait`] drives
//! it; every other caller polls the same shared future and gets a clone of
//! the same result. A caller that gives up (for example the bounded wait
//! inside [`ProcessHandle::cancel`]) does not abort the reap, the next poller
//! picks it up where it left off.
//!
//! ## Cancellation
//!
//! ```text
//! cancel()
//!   (a) cancelled flag  ──► visible to is_cancelled()
//!   (b) relay token     ──► both relays stop reading / sending
//!   (c) terminate token ──► WorkerChild::wait kills the process
//!   (d) wait ≤ cancel_timeout for the reap
//!   (e) wait for both relays to exit
//! ```

use super::backend::{ExitOutcome, SpawnedWorker, WorkerChild};
use super::registry::Registration;
use super::relay::spawn_relay;
use crate::config::SupervisorConfig;
use crate::error::ProcessError;
use crate::output::{output_channel, OutputReceiver, StreamKind};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Outcome of the completion waiter
pub type WaitResult = Result<ExitOutcome, ProcessError>;

type Completion = Shared<BoxFuture<'static, WaitResult>>;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a process handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// A launched worker process
pub struct ProcessHandle {
    id: HandleId,
    session_id: String,
    pid: Option<u32>,
    started: bool,

    /// Reader half of the output channel until a listener takes it
    output: Mutex<Option<OutputReceiver>>,

    /// Stops both relays
    relay_token: CancellationToken,

    /// Asks the reaping wait to kill the process
    terminate: CancellationToken,

    /// Set exactly once by the first cancel()
    cancelled: AtomicBool,

    /// Set by whoever reports the terminal result
    reported: AtomicBool,

    completion: Completion,

    /// Join-group for the two relays
    relays: TaskTracker,

    kill_error: Arc<Mutex<Option<ProcessError>>>,
    cancel_timeout: Duration,
    _registration: Option<Arc<Registration>>,
}

impl ProcessHandle {
    /// Wire up a freshly spawned worker: start both relays and prepare the
    /// completion barrier.
    pub(crate) fn start(
        session_id: &str,
        worker: SpawnedWorker,
        config: &SupervisorConfig,
        registration: Option<Registration>,
    ) -> Arc<Self> {
        let SpawnedWorker {
            child,
            stdout,
            stderr,
        } = worker;
        let pid = child.id();

        let (sender, receiver) = output_channel(config.output_buffer);
        let relay_token = CancellationToken::new();
        let relays = TaskTracker::new();
        spawn_relay(
            &relays,
            session_id,
            stdout,
            StreamKind::Stdout,
            sender.clone(),
            relay_token.clone(),
        );
        spawn_relay(
            &relays,
            session_id,
            stderr,
            StreamKind::Stderr,
            sender,
            relay_token.clone(),
        );
        relays.close();

        let registration = registration.map(Arc::new);
        let terminate = CancellationToken::new();
        let kill_error = Arc::new(Mutex::new(None));
        let completion = reap(
            child,
            terminate.clone(),
            Arc::clone(&kill_error),
            registration.clone(),
            session_id.to_string(),
            pid,
        )
        .boxed()
        .shared();

        Arc::new(Self {
            id: HandleId::next(),
            session_id: session_id.to_string(),
            pid,
            started: true,
            output: Mutex::new(Some(receiver)),
            relay_token,
            terminate,
            cancelled: AtomicBool::new(false),
            reported: AtomicBool::new(false),
            completion,
            relays,
            kill_error,
            cancel_timeout: config.cancel_timeout,
            _registration: registration,
        })
    }

    /// A handle with no process behind it. `wait()` resolves immediately
    /// with a clean exit.
    pub fn unstarted(session_id: impl Into<String>) -> Arc<Self> {
        let relays = TaskTracker::new();
        relays.close();
        let completion: BoxFuture<'static, WaitResult> =
            futures::future::ready(Ok(ExitOutcome::Success)).boxed();

        Arc::new(Self {
            id: HandleId::next(),
            session_id: session_id.into(),
            pid: None,
            started: false,
            output: Mutex::new(None),
            relay_token: CancellationToken::new(),
            terminate: CancellationToken::new(),
            cancelled: AtomicBool::new(false),
            reported: AtomicBool::new(false),
            completion: completion.shared(),
            relays,
            kill_error: Arc::new(Mutex::new(None)),
            cancel_timeout: SupervisorConfig::default().cancel_timeout,
            _registration: None,
        })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True once the process has been reaped (or never existed)
    pub fn is_finished(&self) -> bool {
        !self.started || self.completion.peek().is_some()
    }

    /// The wait result, if the process has already been reaped
    pub fn result(&self) -> Option<WaitResult> {
        if !self.started {
            return Some(Ok(ExitOutcome::Success));
        }
        self.completion.peek().cloned()
    }

    /// Take the reader half of the output channel. Only the first caller
    /// gets it.
    pub fn take_output(&self) -> Option<OutputReceiver> {
        self.output.lock().take()
    }

    /// Relays still running
    pub fn active_relays(&self) -> usize {
        self.relays.len()
    }

    pub fn relays_finished(&self) -> bool {
        self.relays.is_empty()
    }

    /// Block until both relays have exited.
    pub async fn join_relays(&self) {
        self.relays.wait().await
    }

    /// Stop both relays without touching the process.
    pub fn stop_relays(&self) {
        self.relay_token.cancel();
    }

    /// Claim the right to report this handle's terminal result.
    pub(crate) fn claim_report(&self) -> bool {
        !self.reported.swap(true, Ordering::SeqCst)
    }

    // ========================================================================
    // Completion waiter
    // ========================================================================

    /// Block until the process exits.
    ///
    /// Safe to call from any number of tasks. The OS wait runs once and all
    /// callers observe the same result.
    pub async fn wait(&self) -> WaitResult {
        self.completion.clone().await
    }

    // ========================================================================
    // Cancellation controller
    // ========================================================================

    /// Cancel the worker.
    ///
    /// Idempotent: only the first call signals the relays and terminates the
    /// process; later calls just wait for the same teardown. Never blocks on
    /// the process for longer than the configured cancel timeout. The error,
    /// if any, comes from the termination request and is diagnostic only.
    pub async fn cancel(&self) -> Result<(), ProcessError> {
        // (a)
        let first = !self.cancelled.swap(true, Ordering::SeqCst);
        if first {
            info!(session_id = %self.session_id, pid = ?self.pid, "Cancelling worker");
            // (b)
            self.relay_token.cancel();
            // (c)
            self.terminate.cancel();
        }

        // (d)
        if tokio::time::timeout(self.cancel_timeout, self.completion.clone())
            .await
            .is_err()
        {
            warn!(
                session_id = %self.session_id,
                pid = ?self.pid,
                timeout_ms = self.cancel_timeout.as_millis() as u64,
                "Worker did not exit in time, continuing cancellation"
            );
            if first {
                let completion = self.completion.clone();
                tokio::spawn(async move {
                    let _ = completion.await;
                });
            }
        }

        // (e)
        self.relays.wait().await;

        if !first {
            return Ok(());
        }
        match self.kill_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("pid", &self.pid)
            .field("started", &self.started)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .field("active_relays", &self.active_relays())
            .finish()
    }
}

async fn reap(
    mut child: Box<dyn WorkerChild>,
    terminate: CancellationToken,
    kill_error: Arc<Mutex<Option<ProcessError>>>,
    registration: Option<Arc<Registration>>,
    session_id: String,
    pid: Option<u32>,
) -> WaitResult {
    let reaped = child.wait(terminate).await;

    if let Some(registration) = &registration {
        registration.release();
    }

    if let Some(err) = reaped.kill_error {
        warn!(session_id = %session_id, pid = ?pid, error = %err, "Failed to terminate worker");
        *kill_error.lock() = Some(ProcessError::Kill(err.to_string()));
    }

    match reaped.status {
        Ok(status) => {
            let outcome = ExitOutcome::from_status(status);
            info!(session_id = %session_id, pid = ?pid, outcome = %outcome, "Worker exited");
            Ok(outcome)
        }
        Err(e) => {
            error!(session_id = %session_id, pid = ?pid, error = %e, "Failed to wait for worker");
            Err(ProcessError::Wait(e.to_string()))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process::backend::Reaped;
    use crate::process::registry::ActiveSessions;
    use async_trait::async_trait;
    use std::io;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::DuplexStream;

    #[derive(Default, Clone)]
    struct Counters {
        waits: Arc<AtomicUsize>,
        kills: Arc<AtomicUsize>,
    }

    /// Exits with `code` after `run_for` (never, if `None`). Dies on
    /// terminate unless stuck. Holds the pipe writers until it exits.
    struct FakeChild {
        counters: Counters,
        run_for: Option<Duration>,
        code: i32,
        stuck: bool,
        /// Time between terminate and death
        dying: Duration,
        kill_error: bool,
        pipes: Vec<DuplexStream>,
    }

    impl FakeChild {
        fn new(run_for: Option<Duration>, code: i32) -> Self {
            Self {
                counters: Counters::default(),
                run_for,
                code,
                stuck: false,
                dying: Duration::ZERO,
                kill_error: false,
                pipes: Vec::new(),
            }
        }

        fn stuck(mut self) -> Self {
            self.stuck = true;
            self
        }

        fn dies_after(mut self, dying: Duration) -> Self {
            self.dying = dying;
            self
        }

        fn failing_kill(mut self) -> Self {
            self.kill_error = true;
            self
        }
    }

    #[async_trait]
    impl WorkerChild for FakeChild {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        async fn wait(&mut self, terminate: CancellationToken) -> Reaped {
            self.counters.waits.fetch_add(1, Ordering::SeqCst);

            let run_for = self.run_for;
            let run = async move {
                match run_for {
                    Some(d) => tokio::time::sleep(d).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let status = tokio::select! {
                _ = run => ExitStatus::from_raw(self.code << 8),
                _ = terminate.cancelled() => {
                    self.counters.kills.fetch_add(1, Ordering::SeqCst);
                    if self.stuck {
                        std::future::pending::<()>().await;
                    }
                    tokio::time::sleep(self.dying).await;
                    ExitStatus::from_raw(9)
                }
            };
            self.pipes.clear();

            Reaped {
                status: Ok(status),
                kill_error: self
                    .kill_error
                    .then(|| io::Error::new(io::ErrorKind::PermissionDenied, "EPERM")),
            }
        }
    }

    fn spawned(mut child: FakeChild) -> (SpawnedWorker, Counters) {
        let counters = child.counters.clone();
        let (out_w, out_r) = tokio::io::duplex(64);
        let (err_w, err_r) = tokio::io::duplex(64);
        child.pipes = vec![out_w, err_w];
        (
            SpawnedWorker {
                child: Box::new(child),
                stdout: Box::new(out_r),
                stderr: Box::new(err_r),
            },
            counters,
        )
    }

    fn config() -> SupervisorConfig {
        SupervisorConfig::default().with_cancel_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_concurrent_waits_share_one_os_wait() {
        let (worker, counters) = spawned(FakeChild::new(Some(Duration::from_millis(30)), 3));
        let handle = ProcessHandle::start("s1", worker, &config(), None);

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                tokio::spawn(async move { handle.wait().await })
            })
            .collect();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Ok(ExitOutcome::Code(3)));
        }
        assert_eq!(counters.waits.load(Ordering::SeqCst), 1);

        // Later callers get the cached result.
        assert_eq!(handle.wait().await, Ok(ExitOutcome::Code(3)));
        assert_eq!(handle.result(), Some(Ok(ExitOutcome::Code(3))));
        assert_eq!(counters.waits.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (worker, counters) = spawned(FakeChild::new(None, 0));
        let handle = ProcessHandle::start("s1", worker, &config(), None);

        let (ra, rb) = tokio::join!(handle.cancel(), handle.cancel());
        assert!(ra.is_ok());
        assert!(rb.is_ok());

        assert!(handle.is_cancelled());
        assert_eq!(counters.kills.load(Ordering::SeqCst), 1);
        assert_eq!(counters.waits.load(Ordering::SeqCst), 1);
        assert_eq!(handle.active_relays(), 0);

        // A third call changes nothing and returns promptly.
        assert!(handle.cancel().await.is_ok());
        assert_eq!(counters.kills.load(Ordering::SeqCst), 1);
        assert_eq!(handle.wait().await, Ok(ExitOutcome::Signal(Some(9))));
    }

    #[tokio::test]
    async fn test_cancel_bounded_when_process_hangs() {
        let (worker, counters) = spawned(FakeChild::new(None, 0).stuck());
        let handle = ProcessHandle::start("s1", worker, &config(), None);

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(2), handle.cancel())
            .await
            .expect("cancel must not hang");
        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(counters.kills.load(Ordering::SeqCst), 1);

        // Pipes are still open, yet the relays left on the cancel signal.
        assert!(handle.relays_finished());
        assert!(!handle.is_finished());
    }

    #[tokio::test]
    async fn test_slow_death_is_reaped_after_cancel_returns() {
        let sessions = ActiveSessions::new();
        let registration = sessions.register("s1").unwrap();
        let (worker, counters) =
            spawned(FakeChild::new(None, 0).dies_after(Duration::from_millis(300)));
        let config = SupervisorConfig::default().with_cancel_timeout(Duration::from_millis(50));
        let handle = ProcessHandle::start("s1", worker, &config, Some(registration));

        let result = tokio::time::timeout(Duration::from_millis(250), handle.cancel())
            .await
            .expect("cancel returns before the process dies");
        assert!(result.is_ok());
        assert!(handle.relays_finished());
        assert!(!handle.is_finished());
        assert!(sessions.is_active("s1"));

        // Nobody waits from here on.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(handle.is_finished());
        assert_eq!(handle.result(), Some(Ok(ExitOutcome::Signal(Some(9)))));
        assert!(!sessions.is_active("s1"));
        assert_eq!(counters.waits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_reports_kill_error_once() {
        let (worker, _counters) = spawned(FakeChild::new(None, 0).failing_kill());
        let handle = ProcessHandle::start("s1", worker, &config(), None);

        let first = handle.cancel().await;
        assert!(matches!(first, Err(ProcessError::Kill(_))));
        assert!(handle.cancel().await.is_ok());
    }

    #[tokio::test]
    async fn test_output_is_taken_once() {
        let (worker, _counters) = spawned(FakeChild::new(Some(Duration::from_millis(5)), 0));
        let handle = ProcessHandle::start("s1", worker, &config(), None);

        assert!(handle.take_output().is_some());
        assert!(handle.take_output().is_none());
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_registration_released_on_exit() {
        let sessions = ActiveSessions::new();
        let registration = sessions.register("s1").unwrap();
        let (worker, _counters) = spawned(FakeChild::new(Some(Duration::from_millis(5)), 0));

        let handle = ProcessHandle::start("s1", worker, &config(), Some(registration));
        assert!(sessions.is_active("s1"));

        handle.wait().await.unwrap();
        assert!(!sessions.is_active("s1"));
    }

    #[tokio::test]
    async fn test_unstarted_handle() {
        let handle = ProcessHandle::unstarted("idle");
        assert!(!handle.is_started());
        assert!(handle.is_finished());
        assert_eq!(handle.wait().await, Ok(ExitOutcome::Success));
        assert!(handle.cancel().await.is_ok());
        assert!(handle.take_output().is_none());
    }

    #[tokio::test]
    async fn test_claim_report_once() {
        let handle = ProcessHandle::unstarted("s1");
        assert!(handle.claim_report());
        assert!(!handle.claim_report());
    }
}
