//! Session record store - 세션 진행 상황 저장/로드
//!
//! The supervisor never touches this store. The presentation loop reads a
//! session's progress after the worker finishes so the completion record can
//! report balls and iterations.

use super::json::JsonStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 세션 디렉토리 이름
pub const SESSIONS_DIR: &str = "sessions";

/// 세션 진행 상황
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    /// 세션 ID
    pub session_id: String,

    /// 완료된 반복 횟수
    #[serde(default)]
    pub iterations: u32,

    /// 완료된 ball 수
    #[serde(default)]
    pub balls_complete: u32,

    /// 전체 ball 수
    #[serde(default)]
    pub balls_total: u32,

    /// 차단 여부
    #[serde(default)]
    pub blocked: bool,

    /// 차단 사유
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,

    /// 마지막 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl SessionProgress {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            iterations: 0,
            balls_complete: 0,
            balls_total: 0,
            blocked: false,
            blocked_reason: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_balls(mut self, complete: u32, total: u32) -> Self {
        self.balls_complete = complete;
        self.balls_total = total;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn blocked(mut self, reason: impl Into<String>) -> Self {
        self.blocked = true;
        self.blocked_reason = Some(reason.into());
        self
    }

    /// 모든 ball 완료 여부
    pub fn all_complete(&self) -> bool {
        self.balls_total > 0 && self.balls_complete >= self.balls_total
    }
}

// ============================================================================
// SessionStore Trait
// ============================================================================

/// Load/save boundary for session records
pub trait SessionStore: Send + Sync {
    /// 세션 진행 상황 로드 (없으면 None)
    fn load_progress(&self, session_id: &str) -> Result<Option<SessionProgress>>;

    /// 세션 진행 상황 저장
    fn save_progress(&self, progress: &SessionProgress) -> Result<()>;
}

fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id != "."
        && session_id != ".."
        && !session_id.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "invalid session id: {:?}",
            session_id
        )))
    }
}

// ============================================================================
// JSON 구현
// ============================================================================

/// One JSON file per session under `.juggle/sessions/`
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    store: JsonStore,
}

impl JsonSessionStore {
    pub fn new(store: JsonStore) -> Self {
        Self {
            store: store.child(SESSIONS_DIR),
        }
    }

    /// 현재 프로젝트의 세션 저장소
    pub fn current_project() -> Result<Self> {
        Ok(Self::new(JsonStore::current_project()?))
    }

    fn filename(session_id: &str) -> String {
        format!("{}.json", session_id)
    }
}

impl SessionStore for JsonSessionStore {
    fn load_progress(&self, session_id: &str) -> Result<Option<SessionProgress>> {
        validate_session_id(session_id)?;
        self.store.load_optional(&Self::filename(session_id))
    }

    fn save_progress(&self, progress: &SessionProgress) -> Result<()> {
        validate_session_id(&progress.session_id)?;
        self.store
            .save(&Self::filename(&progress.session_id), progress)
    }
}

// ============================================================================
// 메모리 구현
// ============================================================================

/// In-memory store, mostly for tests
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<String, SessionProgress>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load_progress(&self, session_id: &str) -> Result<Option<SessionProgress>> {
        Ok(self.records.read().get(session_id).cloned())
    }

    fn save_progress(&self, progress: &SessionProgress) -> Result<()> {
        self.records
            .write()
            .insert(progress.session_id.clone(), progress.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_session_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(JsonStore::new(dir.path()));

        assert!(store.load_progress("s1").unwrap().is_none());

        let progress = SessionProgress::new("s1")
            .with_balls(2, 5)
            .with_iterations(3)
            .blocked("waiting on review");
        store.save_progress(&progress).unwrap();

        let loaded = store.load_progress("s1").unwrap().unwrap();
        assert_eq!(loaded, progress);
        assert!(dir.path().join("sessions").join("s1.json").exists());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(JsonStore::new(dir.path()));

        for id in ["", "..", "a/b", "a\\b"] {
            assert!(
                matches!(store.load_progress(id), Err(Error::InvalidInput(_))),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        store
            .save_progress(&SessionProgress::new("s2").with_balls(4, 4))
            .unwrap();

        let loaded = store.load_progress("s2").unwrap().unwrap();
        assert!(loaded.all_complete());
        assert!(store.load_progress("other").unwrap().is_none());
    }

    #[test]
    fn test_all_complete_requires_balls() {
        assert!(!SessionProgress::new("empty").all_complete());
        assert!(!SessionProgress::new("partial").with_balls(1, 2).all_complete());
    }
}
