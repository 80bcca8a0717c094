//! Theme - 모니터 TUI 색상 및 스타일

use ratatui::style::{Color, Modifier, Style};

/// 모니터 테마
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// 배경색
    pub bg: Color,
    /// 전경색 (기본 텍스트)
    pub fg: Color,
    /// 뮤트된 텍스트 (보조 정보)
    pub muted: Color,
    /// 강조색
    pub accent: Color,
    /// 성공
    pub success: Color,
    /// 경고
    pub warning: Color,
    /// 에러
    pub error: Color,
    /// 보더 색상
    pub border: Color,
}

impl Theme {
    /// 다크 테마 (기본)
    pub fn dark() -> Self {
        Self {
            bg: Color::Rgb(22, 22, 26),        // #16161a
            fg: Color::Rgb(220, 220, 224),     // #dcdce0
            muted: Color::Rgb(128, 128, 140),  // #80808c
            accent: Color::Rgb(120, 180, 255), // #78b4ff
            success: Color::Rgb(80, 200, 120), // #50c878
            warning: Color::Rgb(255, 200, 80), // #ffc850
            error: Color::Rgb(255, 100, 100),  // #ff6464
            border: Color::Rgb(60, 60, 70),    // #3c3c46
        }
    }

    // === 스타일 헬퍼 메서드 ===

    /// 기본 텍스트 스타일
    pub fn text(&self) -> Style {
        Style::default().fg(self.fg)
    }

    /// 뮤트된 텍스트
    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    /// 헤더 스타일
    pub fn header(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    /// 보더 스타일
    pub fn border(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn success(&self) -> Style {
        Style::default().fg(self.success)
    }

    pub fn warning(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(self.error)
    }

    /// stderr 줄
    pub fn stderr_line(&self) -> Style {
        Style::default().fg(self.warning)
    }

    /// 단축키 힌트 스타일
    pub fn keybind(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    /// 단축키 설명 스타일
    pub fn keybind_desc(&self) -> Style {
        Style::default().fg(self.muted)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}
