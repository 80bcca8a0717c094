//! 테스트 공용 도구 - mock backend, fake worker script, message collector
//!
//! Unix only: the test binaries that use it are `#![cfg(unix)]`.

#![allow(dead_code)]

use async_trait::async_trait;
use juggle_supervisor::{
    Bridge, BridgeEvents, Message, ProcessBackend, Reaped, SpawnedWorker, WorkerChild,
};
use std::io;
use std::path::{Path, PathBuf};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock backend
// ============================================================================

/// Call counters shared by a mock backend and every child it spawns
#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub spawns: Arc<AtomicUsize>,
    pub waits: Arc<AtomicUsize>,
    pub kills: Arc<AtomicUsize>,
}

impl Counters {
    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

/// Scripted worker: writes its lines, then exits (or hangs until killed)
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    pub counters: Counters,
    stdout: Vec<String>,
    stderr: Vec<String>,
    exit_code: i32,
    run_for: Duration,
    hang: bool,
    fail_spawn: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdout(mut self, lines: &[&str]) -> Self {
        self.stdout = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_stderr(mut self, lines: &[&str]) -> Self {
        self.stderr = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_exit(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_run_for(mut self, run_for: Duration) -> Self {
        self.run_for = run_for;
        self
    }

    /// Never exits on its own
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_spawn = true;
        self
    }
}

impl ProcessBackend for MockBackend {
    fn spawn(&self, _program: &Path, _args: &[String]) -> io::Result<SpawnedWorker> {
        if self.fail_spawn {
            return Err(io::Error::new(io::ErrorKind::NotFound, "mock: no such file"));
        }
        self.counters.spawns.fetch_add(1, Ordering::SeqCst);

        let (out_w, out_r) = tokio::io::duplex(4096);
        let (err_w, err_r) = tokio::io::duplex(4096);
        let child = MockChild {
            backend: self.clone(),
            stdout: Some(out_w),
            stderr: Some(err_w),
        };

        Ok(SpawnedWorker {
            child: Box::new(child),
            stdout: Box::new(out_r),
            stderr: Box::new(err_r),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockChild {
    backend: MockBackend,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
}

async fn write_lines(pipe: &mut Option<DuplexStream>, lines: &[String]) {
    if let Some(pipe) = pipe.as_mut() {
        for line in lines {
            let _ = pipe.write_all(format!("{}\n", line).as_bytes()).await;
        }
    }
}

#[async_trait]
impl WorkerChild for MockChild {
    fn id(&self) -> Option<u32> {
        Some(9999)
    }

    async fn wait(&mut self, terminate: CancellationToken) -> Reaped {
        let counters = self.backend.counters.clone();
        counters.waits.fetch_add(1, Ordering::SeqCst);

        write_lines(&mut self.stdout, &self.backend.stdout).await;
        write_lines(&mut self.stderr, &self.backend.stderr).await;

        let run_for = self.backend.run_for;
        let hang = self.backend.hang;
        let run = async move {
            if hang {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(run_for).await;
        };

        let status = tokio::select! {
            biased;
            _ = terminate.cancelled() => {
                counters.kills.fetch_add(1, Ordering::SeqCst);
                exit_status(None)
            }
            _ = run => exit_status(Some(self.backend.exit_code)),
        };

        // Process gone: both pipes reach EOF.
        self.stdout.take();
        self.stderr.take();

        Reaped {
            status: Ok(status),
            kill_error: None,
        }
    }
}

fn exit_status(code: Option<i32>) -> ExitStatus {
    match code {
        Some(code) => ExitStatus::from_raw(code << 8),
        None => ExitStatus::from_raw(9),
    }
}

// ============================================================================
// Fake worker script
// ============================================================================

/// Worker behaviour is picked by the session id prefix (`$3`).
const FAKE_WORKER: &str = r#"#!/bin/sh
# usage: fake-juggle agent run <session>
case "$3" in
  hello*)
    echo hello
    echo oops >&2
    exit 0
    ;;
  exit1*)
    echo failing
    exit 1
    ;;
  lines*)
    i=1
    while [ "$i" -le 200 ]; do
      echo "line $i"
      i=$((i + 1))
    done
    exit 0
    ;;
  sleep*)
    echo started
    exec sleep 30
    ;;
  detach*)
    # The background sleep keeps both pipes open after the worker exits.
    echo before
    sleep 5 &
    echo after
    exit 0
    ;;
  *)
    exit 0
    ;;
esac
"#;

/// Path to an executable fake worker, written once per test binary.
pub fn fake_worker() -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    static SCRIPT: OnceLock<(tempfile::TempDir, PathBuf)> = OnceLock::new();

    let (_, path) = SCRIPT.get_or_init(|| {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("fake-juggle");
        std::fs::write(&path, FAKE_WORKER).expect("write fake worker");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake worker");
        (dir, path)
    });
    path.clone()
}

// ============================================================================
// Message collection
// ============================================================================

/// Drive one session the way the presentation loop does: on `ProcessStarted`
/// start listening and awaiting completion. Returns every message up to and
/// including the terminal one.
pub async fn collect_session(
    bridge: &Bridge,
    events: &mut BridgeEvents,
    session_id: &str,
) -> Vec<Message> {
    bridge.launch(session_id);
    collect_until_terminal(bridge, events, Duration::from_secs(10), |_| {}).await
}

/// Collect messages until a terminal one, calling `on_message` for each.
pub async fn collect_until_terminal<F>(
    bridge: &Bridge,
    events: &mut BridgeEvents,
    bound: Duration,
    mut on_message: F,
) -> Vec<Message>
where
    F: FnMut(&Message),
{
    let mut messages = Vec::new();
    let deadline = tokio::time::Instant::now() + bound;

    loop {
        let message = tokio::time::timeout_at(deadline, events.next())
            .await
            .expect("timed out waiting for a terminal message")
            .expect("bridge closed");

        if let Message::ProcessStarted { handle, .. } = &message {
            bridge.listen(handle);
            bridge.await_completion(Arc::clone(handle));
        }
        on_message(&message);

        let terminal = message.is_terminal();
        messages.push(message);
        if terminal {
            return messages;
        }
    }
}

/// `Output` lines as `(line, is_error)`
pub fn output_lines(messages: &[Message]) -> Vec<(String, bool)> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Output { line, is_error, .. } => Some((line.clone(), *is_error)),
            _ => None,
        })
        .collect()
}
