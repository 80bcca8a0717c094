//! Output Log - worker output scrollback
//!
//! Keeps the last `max_lines` lines in a ring buffer, tagged by stream,
//! plus running per-stream counts that survive eviction.

use chrono::{DateTime, Local};
use juggle_supervisor::StreamKind;
use std::collections::VecDeque;

/// A retained output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Line number across the whole run (1-based)
    pub number: usize,
    pub stream: StreamKind,
    pub content: String,
    pub received_at: DateTime<Local>,
}

impl OutputLine {
    pub fn is_error(&self) -> bool {
        self.stream.is_error()
    }

    /// Plain-text rendering, stderr lines prefixed
    pub fn display(&self) -> String {
        match self.stream {
            StreamKind::Stdout => self.content.clone(),
            StreamKind::Stderr => format!("[stderr] {}", self.content),
        }
    }
}

/// Scrollback buffer
#[derive(Debug)]
pub struct OutputLog {
    lines: VecDeque<OutputLine>,
    max_lines: usize,
    stdout_count: usize,
    stderr_count: usize,
}

impl OutputLog {
    pub fn new(max_lines: usize) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            lines: VecDeque::with_capacity(max_lines.min(4_096)),
            max_lines,
            stdout_count: 0,
            stderr_count: 0,
        }
    }

    /// Add a line, evicting the oldest when full
    pub fn push(&mut self, content: impl Into<String>, is_error: bool) -> &OutputLine {
        let stream = if is_error {
            self.stderr_count += 1;
            StreamKind::Stderr
        } else {
            self.stdout_count += 1;
            StreamKind::Stdout
        };

        let number = self.total();
        if self.lines.len() >= self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(OutputLine {
            number,
            stream,
            content: content.into(),
            received_at: Local::now(),
        });
        &self.lines[self.lines.len() - 1]
    }

    pub fn lines(&self) -> impl Iterator<Item = &OutputLine> {
        self.lines.iter()
    }

    /// Last `n` retained lines, oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &OutputLine> {
        self.lines.iter().skip(self.lines.len().saturating_sub(n))
    }

    /// Window of `height` lines ending `offset` lines above the newest
    pub fn window(&self, height: usize, offset: usize) -> impl Iterator<Item = &OutputLine> {
        let end = self.lines.len().saturating_sub(offset);
        let start = end.saturating_sub(height);
        self.lines.range(start..end)
    }

    /// Retained lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn stdout_count(&self) -> usize {
        self.stdout_count
    }

    pub fn stderr_count(&self) -> usize {
        self.stderr_count
    }

    /// Lines received, retained or not
    pub fn total(&self) -> usize {
        self.stdout_count + self.stderr_count
    }

    /// Lines pushed out of the buffer
    pub fn evicted(&self) -> usize {
        self.total() - self.lines.len()
    }
}
