//! Config - 통합 설정 관리
//!
//! - `monitor.rs` - MonitorConfig 통합 설정

mod monitor;

pub use monitor::{MonitorConfig, DEFAULT_TOOL, MONITOR_CONFIG_FILE};
