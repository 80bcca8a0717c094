//! # juggle-foundation
//!
//! Foundation layer for Juggle:
//! - Error: 공통 에러 타입
//! - Config: 통합 설정 (MonitorConfig)
//! - Storage: JsonStore (범용), SessionStore (세션 record 경계)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{MonitorConfig, DEFAULT_TOOL, MONITOR_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{
    JsonSessionStore, JsonStore, MemorySessionStore, SessionProgress, SessionStore,
    PROJECT_DIR, SESSIONS_DIR,
};
