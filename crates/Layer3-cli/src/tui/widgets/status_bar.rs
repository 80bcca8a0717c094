//! Status Bar Widget - 모니터 하단 상태 바
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ ↑↓ scroll │ c cancel │ q quit                   ⟳ Running 2/10 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use std::time::{Duration, Instant};

use crate::tui::theme::Theme;

/// 상태 바 아이템
#[derive(Debug, Clone)]
pub struct StatusItem {
    /// 키 바인딩
    pub key: String,
    /// 설명
    pub description: String,
}

impl StatusItem {
    pub fn new(key: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: desc.into(),
        }
    }
}

/// 알림 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
}

/// 상태 바 상태
#[derive(Debug, Clone)]
pub struct StatusBarState {
    /// 왼쪽 아이템들
    pub items: Vec<StatusItem>,
    /// 오른쪽 요약 (상태 + 반복)
    pub summary: String,
    /// 알림 메시지
    pub notification: Option<(String, NotificationType)>,
    /// 알림 타임아웃
    pub notification_timeout: Option<Instant>,
}

impl StatusBarState {
    pub fn new() -> Self {
        Self {
            items: Self::running_items(),
            summary: String::new(),
            notification: None,
            notification_timeout: None,
        }
    }

    fn running_items() -> Vec<StatusItem> {
        vec![
            StatusItem::new("↑↓", "scroll"),
            StatusItem::new("c", "cancel"),
            StatusItem::new("q", "quit"),
        ]
    }

    /// 알림 설정
    pub fn notify(&mut self, message: impl Into<String>, notification_type: NotificationType) {
        self.notification = Some((message.into(), notification_type));
        self.notification_timeout = Some(Instant::now() + Duration::from_secs(3));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationType::Info);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationType::Success);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationType::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationType::Error);
    }

    /// 타임아웃 체크
    pub fn check_timeout(&mut self) {
        if let Some(timeout) = self.notification_timeout {
            if Instant::now() >= timeout {
                self.notification = None;
                self.notification_timeout = None;
            }
        }
    }

    /// 실행 중 모드
    pub fn set_running_mode(&mut self) {
        self.items = Self::running_items();
    }

    /// 취소 중 모드
    pub fn set_cancelling_mode(&mut self) {
        self.items = vec![
            StatusItem::new("↑↓", "scroll"),
            StatusItem::new("q", "quit now"),
        ];
    }

    /// 종료 후 모드
    pub fn set_done_mode(&mut self) {
        self.items = vec![
            StatusItem::new("↑↓", "scroll"),
            StatusItem::new("q", "quit"),
        ];
    }
}

impl Default for StatusBarState {
    fn default() -> Self {
        Self::new()
    }
}

/// 상태 바 위젯
pub struct StatusBar<'a> {
    state: &'a StatusBarState,
    theme: Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(state: &'a StatusBarState, theme: Theme) -> Self {
        Self { state, theme }
    }

    fn render_items(&self) -> Vec<Span<'static>> {
        let mut spans = vec![Span::raw(" ")];
        for (i, item) in self.state.items.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", self.theme.text_muted()));
            }
            spans.push(Span::styled(item.key.clone(), self.theme.keybind()));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(item.description.clone(), self.theme.keybind_desc()));
        }
        spans
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border());

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width < 10 || inner.height < 1 {
            return;
        }

        // 알림이 있으면 알림 표시
        if let Some((message, notification_type)) = &self.state.notification {
            let (style, icon) = match notification_type {
                NotificationType::Info => (self.theme.text(), "ℹ"),
                NotificationType::Success => (self.theme.success(), "✓"),
                NotificationType::Warning => (self.theme.warning(), "⚠"),
                NotificationType::Error => (self.theme.error(), "✗"),
            };
            Paragraph::new(Line::from(Span::styled(format!("{} {}", icon, message), style)))
                .alignment(Alignment::Center)
                .render(inner, buf);
            return;
        }

        // 레이아웃: [키 힌트] ... [요약]
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(inner);

        Paragraph::new(Line::from(self.render_items()))
            .alignment(Alignment::Left)
            .render(chunks[0], buf);

        Paragraph::new(Line::from(vec![
            Span::styled(self.state.summary.clone(), self.theme.text()),
            Span::raw(" "),
        ]))
        .alignment(Alignment::Right)
        .render(chunks[1], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bar_modes() {
        let mut state = StatusBarState::new();
        assert!(state.items.iter().any(|i| i.description == "cancel"));

        state.set_done_mode();
        assert!(!state.items.iter().any(|i| i.description == "cancel"));
    }

    #[test]
    fn test_notification_expires() {
        let mut state = StatusBarState::new();
        state.warning("cancelling");
        assert_eq!(
            state.notification.as_ref().map(|(_, t)| *t),
            Some(NotificationType::Warning)
        );

        state.notification_timeout = Some(Instant::now() - Duration::from_millis(1));
        state.check_timeout();
        assert!(state.notification.is_none());
    }

    #[test]
    fn test_render_summary() {
        let mut state = StatusBarState::new();
        state.summary = "⟳ Running 2/10".to_string();

        let area = Rect::new(0, 0, 60, 3);
        let mut buf = Buffer::empty(area);
        StatusBar::new(&state, Theme::dark()).render(area, &mut buf);

        let rendered: String = (0..area.width)
            .map(|x| buf[(x, 1)].symbol().to_string())
            .collect();
        assert!(rendered.contains("Running 2/10"));
        assert!(rendered.contains("cancel"));
    }
}
