//! Output channel - line records from the relays to a single listener
//!
//! Bounded, many writers (the two relays), one reader (the bridge's
//! listener). The channel closes once every relay has dropped its sender and
//! the buffered records are drained.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StreamKind::Stderr)
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line of worker output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub line: String,
    pub is_error: bool,
    pub timestamp: DateTime<Utc>,
}

impl OutputRecord {
    pub fn new(line: impl Into<String>, stream: StreamKind) -> Self {
        Self {
            line: line.into(),
            is_error: stream.is_error(),
            timestamp: Utc::now(),
        }
    }

    pub fn stdout(line: impl Into<String>) -> Self {
        Self::new(line, StreamKind::Stdout)
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        Self::new(line, StreamKind::Stderr)
    }

    pub fn stream(&self) -> StreamKind {
        if self.is_error {
            StreamKind::Stderr
        } else {
            StreamKind::Stdout
        }
    }
}

/// Result of one bounded listen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenPoll {
    /// A record was available
    Record(OutputRecord),
    /// Nothing arrived within the bound; ask again later
    Idle,
    /// Every relay is done and the buffer is empty
    Closed,
}

/// Create a bounded output channel
pub fn output_channel(capacity: usize) -> (OutputSender, OutputReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (OutputSender { tx }, OutputReceiver { rx })
}

/// Writer half, cloned once per relay
#[derive(Debug, Clone)]
pub struct OutputSender {
    tx: mpsc::Sender<OutputRecord>,
}

impl OutputSender {
    /// Waits for capacity. Returns the record back if the reader is gone.
    pub async fn send(&self, record: OutputRecord) -> Result<(), OutputRecord> {
        self.tx.send(record).await.map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reader half, owned by exactly one listener
#[derive(Debug)]
pub struct OutputReceiver {
    rx: mpsc::Receiver<OutputRecord>,
}

impl OutputReceiver {
    pub async fn recv(&mut self) -> Option<OutputRecord> {
        self.rx.recv().await
    }

    /// Wait at most `bound` for the next record.
    pub async fn recv_timeout(&mut self, bound: Duration) -> ListenPoll {
        match tokio::time::timeout(bound, self.rx.recv()).await {
            Ok(Some(record)) => ListenPoll::Record(record),
            Ok(None) => ListenPoll::Closed,
            Err(_) => ListenPoll::Idle,
        }
    }

    /// Non-blocking variant of [`recv_timeout`](Self::recv_timeout)
    pub fn try_recv(&mut self) -> ListenPoll {
        match self.rx.try_recv() {
            Ok(record) => ListenPoll::Record(record),
            Err(mpsc::error::TryRecvError::Empty) => ListenPoll::Idle,
            Err(mpsc::error::TryRecvError::Disconnected) => ListenPoll::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tagging() {
        let out = OutputRecord::stdout("hello");
        assert!(!out.is_error);
        assert_eq!(out.stream(), StreamKind::Stdout);

        let err = OutputRecord::stderr("oops");
        assert!(err.is_error);
        assert_eq!(err.stream(), StreamKind::Stderr);
        assert_eq!(err.stream().to_string(), "stderr");
    }

    #[tokio::test]
    async fn test_recv_timeout_states() {
        let (tx, mut rx) = output_channel(4);

        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)).await,
            ListenPoll::Idle
        );

        let record = OutputRecord::stdout("line");
        tx.send(record.clone()).await.unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)).await,
            ListenPoll::Record(record)
        );

        drop(tx);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)).await,
            ListenPoll::Closed
        );
    }

    #[tokio::test]
    async fn test_buffered_records_survive_close() {
        let (tx, mut rx) = output_channel(4);
        tx.send(OutputRecord::stdout("a")).await.unwrap();
        tx.send(OutputRecord::stderr("b")).await.unwrap();
        drop(tx);

        assert!(matches!(rx.try_recv(), ListenPoll::Record(r) if r.line == "a"));
        assert!(matches!(rx.try_recv(), ListenPoll::Record(r) if r.line == "b"));
        assert_eq!(rx.try_recv(), ListenPoll::Closed);
    }

    #[tokio::test]
    async fn test_send_after_reader_dropped() {
        let (tx, rx) = output_channel(1);
        drop(rx);
        assert!(tx.is_closed());
        let returned = tx.send(OutputRecord::stdout("lost")).await.unwrap_err();
        assert_eq!(returned.line, "lost");
    }
}
