//! Stream relay - one line-reading loop per pipe
//!
//! Each relay reads its pipe line by line and pushes an [`OutputRecord`] per
//! line. Both the read and the send race against the cancellation token, so
//! a full or abandoned output channel can never hold up shutdown.
//!
//! Relays are spawned on a [`TaskTracker`]; the tracker's count drops when
//! the relay future finishes or is dropped, panics included.

use crate::output::{OutputRecord, OutputSender, StreamKind};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// Pipe reached end of file
    EndOfStream,
    /// Cancellation token fired
    Cancelled,
    /// Listener dropped the receiving half
    ReceiverGone,
    /// Read failed; only this relay stops
    ReadError,
}

/// Spawn a relay for `reader` on `tracker`.
pub fn spawn_relay<R>(
    tracker: &TaskTracker,
    session_id: &str,
    reader: R,
    stream: StreamKind,
    sender: OutputSender,
    token: CancellationToken,
) -> JoinHandle<RelayExit>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let session_id = session_id.to_string();
    tracker.spawn(async move {
        let (exit, lines) = relay_lines(reader, stream, &sender, &token).await;
        debug!(
            session_id = %session_id,
            stream = %stream,
            lines,
            exit = ?exit,
            "Relay stopped"
        );
        exit
    })
}

/// Relay loop body. Returns the exit reason and the number of lines delivered.
pub async fn relay_lines<R>(
    reader: R,
    stream: StreamKind,
    sender: &OutputSender,
    token: &CancellationToken,
) -> (RelayExit, usize)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut delivered = 0usize;

    let exit = loop {
        buf.clear();

        let read = tokio::select! {
            biased;
            _ = token.cancelled() => break RelayExit::Cancelled,
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => break RelayExit::EndOfStream,
            Ok(_) => {}
            Err(e) => {
                warn!(stream = %stream, error = %e, "Failed to read worker output");
                break RelayExit::ReadError;
            }
        }

        let record = OutputRecord::new(decode_line(&buf), stream);

        tokio::select! {
            biased;
            _ = token.cancelled() => break RelayExit::Cancelled,
            sent = sender.send(record) => {
                if sent.is_err() {
                    break RelayExit::ReceiverGone;
                }
            }
        }
        delivered += 1;
    };

    (exit, delivered)
}

/// Strip the line terminator (`\n` or `\r\n`) and decode lossily.
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{output_channel, ListenPoll};
    use std::time::Duration;

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"windows\r\n"), "windows");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"\n"), "");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
    }

    #[tokio::test]
    async fn test_relay_preserves_order() {
        let (tx, mut rx) = output_channel(16);
        let token = CancellationToken::new();
        let input: &[u8] = b"one\ntwo\r\nthree";

        let (exit, lines) = relay_lines(input, StreamKind::Stdout, &tx, &token).await;
        assert_eq!(exit, RelayExit::EndOfStream);
        assert_eq!(lines, 3);
        drop(tx);

        let mut seen = Vec::new();
        while let Some(record) = rx.recv().await {
            assert!(!record.is_error);
            seen.push(record.line);
        }
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_stderr_is_tagged() {
        let (tx, mut rx) = output_channel(4);
        let token = CancellationToken::new();

        relay_lines(&b"oops\n"[..], StreamKind::Stderr, &tx, &token).await;

        let record = rx.recv().await.unwrap();
        assert_eq!(record.line, "oops");
        assert!(record.is_error);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_channel() {
        // Capacity 1 and nobody reading: the second send blocks until cancel.
        let (tx, _rx) = output_channel(1);
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let relay = spawn_relay(
            &tracker,
            "s1",
            &b"a\nb\nc\n"[..],
            StreamKind::Stdout,
            tx,
            token.clone(),
        );
        tracker.close();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(tracker.len(), 1);

        token.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(1), relay)
            .await
            .expect("relay should stop promptly")
            .unwrap();
        assert_eq!(exit, RelayExit::Cancelled);

        tracker.wait().await;
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unblocks_idle_read() {
        let (tx, mut rx) = output_channel(4);
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        // A duplex whose writer stays open never reaches EOF.
        let (_writer, reader) = tokio::io::duplex(64);
        let relay = spawn_relay(&tracker, "s1", reader, StreamKind::Stderr, tx, token.clone());
        tracker.close();

        token.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(1), relay)
            .await
            .expect("relay should stop promptly")
            .unwrap();
        assert_eq!(exit, RelayExit::Cancelled);
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).await, ListenPoll::Closed);
    }

    #[tokio::test]
    async fn test_receiver_gone() {
        let (tx, rx) = output_channel(4);
        drop(rx);
        let token = CancellationToken::new();

        let (exit, lines) = relay_lines(&b"x\n"[..], StreamKind::Stdout, &tx, &token).await;
        assert_eq!(exit, RelayExit::ReceiverGone);
        assert_eq!(lines, 0);
    }
}
