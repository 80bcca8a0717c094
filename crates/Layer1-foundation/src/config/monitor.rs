//! Monitor Config - 통합 설정
//!
//! 글로벌 + 프로젝트 설정을 병합하는 MonitorConfig

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// 설정 파일명
pub const MONITOR_CONFIG_FILE: &str = "monitor.json";

/// Worker executable used when nothing else is configured
pub const DEFAULT_TOOL: &str = "juggle";

// ============================================================================
// Monitor Config (통합)
// ============================================================================

/// Juggle 모니터 설정
///
/// Every field is optional on disk so that a project file only needs to
/// mention what it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Worker 실행 파일
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Output channel 용량
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_buffer: Option<usize>,

    /// 취소 시 프로세스 종료 대기 시간 (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_timeout_ms: Option<u64>,

    /// Listen 폴링 간격 (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_poll_ms: Option<u64>,

    /// 최대 반복 횟수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// TUI scrollback 줄 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrollback: Option<usize>,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Self::default()
        }
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<MonitorConfig>(MONITOR_CONFIG_FILE)?
            {
                debug!("Loaded global config from {}", global.base_dir().display());
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<MonitorConfig>(MONITOR_CONFIG_FILE)?
            {
                debug!("Loaded project config from {}", project.base_dir().display());
                config.merge(project_config);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// 특정 저장소에서 로드
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        let mut config = Self::new();
        if let Some(stored) = store.load_optional::<MonitorConfig>(MONITOR_CONFIG_FILE)? {
            config.merge(stored);
        }
        config.validate()?;
        Ok(config)
    }

    /// 프로젝트 설정 저장
    pub fn save_project(&self) -> Result<()> {
        let store = JsonStore::current_project()?;
        store.save(MONITOR_CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: MonitorConfig) {
        if other.tool.is_some() {
            self.tool = other.tool;
        }
        if other.output_buffer.is_some() {
            self.output_buffer = other.output_buffer;
        }
        if other.cancel_timeout_ms.is_some() {
            self.cancel_timeout_ms = other.cancel_timeout_ms;
        }
        if other.listen_poll_ms.is_some() {
            self.listen_poll_ms = other.listen_poll_ms;
        }
        if other.max_iterations.is_some() {
            self.max_iterations = other.max_iterations;
        }
        if other.scrollback.is_some() {
            self.scrollback = other.scrollback;
        }
    }

    /// 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.output_buffer == Some(0) {
            return Err(Error::Config("outputBuffer must be at least 1".to_string()));
        }
        if self.listen_poll_ms == Some(0) {
            return Err(Error::Config("listenPollMs must be at least 1".to_string()));
        }
        if let Some(tool) = &self.tool {
            if tool.trim().is_empty() {
                return Err(Error::Config("tool must not be empty".to_string()));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Effective values
    // ========================================================================

    pub fn tool(&self) -> PathBuf {
        PathBuf::from(self.tool.as_deref().unwrap_or(DEFAULT_TOOL))
    }

    pub fn output_buffer(&self) -> usize {
        self.output_buffer.unwrap_or(100)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.cancel_timeout_ms.unwrap_or(5_000))
    }

    pub fn listen_poll(&self) -> Duration {
        Duration::from_millis(self.listen_poll_ms.unwrap_or(100))
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations.unwrap_or(10)
    }

    pub fn scrollback(&self) -> usize {
        self.scrollback.unwrap_or(2_000)
    }

    /// 모든 필드를 기본값으로 채운 설정 (출력용)
    pub fn resolved(&self) -> Self {
        Self {
            version: self.version,
            tool: Some(self.tool().display().to_string()),
            output_buffer: Some(self.output_buffer()),
            cancel_timeout_ms: Some(self.cancel_timeout().as_millis() as u64),
            listen_poll_ms: Some(self.listen_poll().as_millis() as u64),
            max_iterations: Some(self.max_iterations()),
            scrollback: Some(self.scrollback()),
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }
}

fn default_version() -> u32 {
    1
}
