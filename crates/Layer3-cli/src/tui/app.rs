//! Main TUI application

use crate::monitor::{Monitor, Update};
use crate::tui::event::{EventHandler, TuiEvent};
use crate::tui::theme::Theme;
use crate::tui::widgets::{OutputView, StatusBar, StatusBarState};
use crossterm::{
    event::{KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use juggle_supervisor::{Bridge, BridgeEvents, CompletionResult};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tracing::info;

const TICK_RATE: Duration = Duration::from_millis(100);

/// Run the TUI until the user quits. Returns the process exit code.
pub async fn run(bridge: &Bridge, events: BridgeEvents, monitor: Monitor) -> anyhow::Result<i32> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(monitor);
    let result = main_loop(&mut terminal, &mut app, bridge, events).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result?;
    println!("{}", app.monitor.summary());
    Ok(app.monitor.exit_code())
}

async fn main_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    bridge: &Bridge,
    mut events: BridgeEvents,
) -> anyhow::Result<()> {
    let (mut event_handler, event_tx) = EventHandler::new();
    EventHandler::start(event_tx, TICK_RATE);

    app.monitor.start(bridge);

    loop {
        app.refresh();
        terminal.draw(|frame| app.render(frame))?;

        if app.should_quit {
            return Ok(());
        }

        tokio::select! {
            // TUI events
            Some(event) = event_handler.next() => app.handle_event(event, bridge),

            // Bridge messages
            Some(message) = events.next() => {
                let update = app.monitor.handle_message(message, bridge);
                app.on_update(update);
            }
        }
    }
}

/// Main application state
struct App {
    monitor: Monitor,
    status_bar: StatusBarState,
    /// Lines scrolled up from the newest
    scroll: usize,
    theme: Theme,
    should_quit: bool,
}

impl App {
    fn new(monitor: Monitor) -> Self {
        Self {
            monitor,
            status_bar: StatusBarState::new(),
            scroll: 0,
            theme: Theme::dark(),
            should_quit: false,
        }
    }

    fn handle_event(&mut self, event: TuiEvent, bridge: &Bridge) {
        match event {
            TuiEvent::Key(key) => self.handle_key(key, bridge),
            TuiEvent::Interrupt => {
                if self.monitor.is_done() {
                    self.should_quit = true;
                } else {
                    self.cancel(bridge);
                }
            }
            TuiEvent::Resize(_, _) => {
                // Terminal will handle resize automatically
            }
            TuiEvent::Tick => self.status_bar.check_timeout(),
        }
    }

    fn handle_key(&mut self, key: KeyEvent, bridge: &Bridge) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.monitor.is_done() || self.monitor.is_cancelling() {
                    self.should_quit = true;
                } else {
                    self.cancel(bridge);
                }
            }
            KeyCode::Char('c') => self.cancel(bridge),
            KeyCode::Up => self.scroll_by(1),
            KeyCode::Down => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::PageUp => self.scroll_by(20),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_sub(20),
            KeyCode::Home => self.scroll = self.monitor.log().len(),
            KeyCode::End => self.scroll = 0,
            _ => {}
        }
    }

    fn cancel(&mut self, bridge: &Bridge) {
        if self.monitor.request_cancel(bridge) {
            info!(session_id = %self.monitor.session_id(), "Cancel requested");
            self.status_bar.warning("Cancelling worker...");
            self.status_bar.set_cancelling_mode();
        }
    }

    fn scroll_by(&mut self, lines: usize) {
        self.scroll = (self.scroll + lines).min(self.monitor.log().len());
    }

    fn on_update(&mut self, update: Update) {
        match update {
            // Keep the view anchored while scrolled up.
            Update::Line if self.scroll > 0 => self.scroll_by(1),
            Update::State => match self.monitor.completion() {
                Some(result) => {
                    let message = self.monitor.summary();
                    match result {
                        CompletionResult::Complete => self.status_bar.success(message),
                        CompletionResult::Cancelled | CompletionResult::MaxIterationsReached => {
                            self.status_bar.warning(message)
                        }
                        CompletionResult::Error(_) => self.status_bar.error(message),
                    }
                    self.status_bar.set_done_mode();
                }
                None => {
                    let message = format!("Worker started for {}", self.monitor.session_id());
                    self.status_bar.info(message);
                    self.status_bar.set_running_mode();
                }
            },
            _ => {}
        }
    }

    fn refresh(&mut self) {
        let status = self.monitor.status();
        let state = self.monitor.state();
        self.status_bar.summary = format!(
            "{} {} {}",
            state.symbol(),
            state.display_name(),
            status.progress_label()
        );
    }

    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let header = Line::from(vec![
            Span::styled(" juggle ", self.theme.header()),
            Span::styled(self.monitor.session_id().to_string(), self.theme.text()),
            Span::styled(
                if self.monitor.status().running { "  running" } else { "" },
                self.theme.success(),
            ),
        ]);
        frame.render_widget(Paragraph::new(header), chunks[0]);

        frame.render_widget(
            OutputView::new(self.monitor.log(), self.monitor.session_id(), self.theme)
                .offset(self.scroll),
            chunks[1],
        );

        frame.render_widget(StatusBar::new(&self.status_bar, self.theme), chunks[2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juggle_foundation::MonitorConfig;

    #[test]
    fn test_start_notifies_and_shows_cancel() {
        let mut app = App::new(Monitor::new("s1", &MonitorConfig::new()));
        app.status_bar.set_done_mode();

        app.on_update(Update::State);

        let (message, _) = app.status_bar.notification.clone().unwrap();
        assert!(message.contains("s1"));
        assert!(app.status_bar.items.iter().any(|i| i.description == "cancel"));
    }
}
