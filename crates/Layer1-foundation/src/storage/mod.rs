//! Storage module for Juggle
//!
//! - `json`: JSON - 범용 파일 저장/로드
//! - `session`: 세션 진행 상황 (외부 record store 경계)

mod json;
mod session;

// JSON Storage (범용)
pub use json::{JsonStore, PROJECT_DIR};

// Session Storage
pub use session::{
    JsonSessionStore, MemorySessionStore, SessionProgress, SessionStore, SESSIONS_DIR,
};
