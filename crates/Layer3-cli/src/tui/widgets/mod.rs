//! Monitor TUI Widgets

pub mod output_view;
pub mod status_bar;

// Re-exports
pub use output_view::OutputView;
pub use status_bar::{StatusBar, StatusBarState};
