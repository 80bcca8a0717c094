//! Output View Widget - worker 출력 scrollback
//!
//! ```text
//! ┌─ session-1 ──────────────────────── out 120 │ err 3 ─┐
//! │ line 118                                             │
//! │ [stderr] warning: retrying                           │
//! │ line 119                                             │
//! └──────────────────────────────────────────────────────┘
//! ```

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::output_log::OutputLog;
use crate::tui::theme::Theme;

/// 출력 뷰 위젯
pub struct OutputView<'a> {
    log: &'a OutputLog,
    title: &'a str,
    /// Lines scrolled up from the bottom
    offset: usize,
    theme: Theme,
}

impl<'a> OutputView<'a> {
    pub fn new(log: &'a OutputLog, title: &'a str, theme: Theme) -> Self {
        Self {
            log,
            title,
            offset: 0,
            theme,
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn counts(&self) -> String {
        let mut counts = format!(
            " out {} │ err {} ",
            self.log.stdout_count(),
            self.log.stderr_count()
        );
        if self.offset > 0 {
            counts = format!(" ↑{}{}", self.offset, counts);
        }
        counts
    }
}

impl Widget for OutputView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let counts = Line::from(Span::styled(self.counts(), self.theme.text_muted()));
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border())
            .title(Span::styled(format!(" {} ", self.title), self.theme.header()))
            .title_bottom(counts.right_aligned());

        let inner = block.inner(area);
        block.render(area, buf);

        if self.log.is_empty() {
            Paragraph::new(Span::styled("waiting for output...", self.theme.text_muted()))
                .render(inner, buf);
            return;
        }

        let lines: Vec<Line> = self
            .log
            .window(inner.height as usize, self.offset)
            .map(|line| {
                if line.is_error() {
                    Line::from(Span::styled(line.display(), self.theme.stderr_line()))
                } else {
                    Line::from(Span::styled(line.content.clone(), self.theme.text()))
                }
            })
            .collect();

        Paragraph::new(lines).render(inner, buf);
    }
}
