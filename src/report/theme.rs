// src/report/theme.rs — Colors for console reports

use std::io::IsTerminal;

use crossterm::style::{Color, Stylize};

use crate::evaluator::Outcome;

/// Report palette.
pub struct Theme;

impl Theme {
    pub const HEADER: Color = Color::Cyan;
    pub const PASS: Color = Color::Rgb { r: 80, g: 200, b: 120 };
    pub const FAIL: Color = Color::Rgb { r: 230, g: 80, b: 80 };
    pub const ERROR: Color = Color::Rgb { r: 230, g: 200, b: 60 };
    /// All-errored cases, kept apart from ordinary errors.
    pub const NO_VERDICT: Color = Color::Magenta;
    pub const DIM: Color = Color::Rgb { r: 120, g: 120, b: 140 };

    pub fn outcome(outcome: Outcome) -> Color {
        match outcome {
            Outcome::Passed => Theme::PASS,
            Outcome::Failed => Theme::FAIL,
            Outcome::Errored => Theme::ERROR,
        }
    }
}

/// Applies the theme, or passes text through untouched for files and pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn colored() -> Self {
        Self { enabled: true }
    }

    /// Color when stdout is a terminal and NO_COLOR is unset.
    pub fn for_stdout() -> Self {
        Self {
            enabled: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str, color: Color) -> String {
        if self.enabled {
            text.with(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn outcome(&self, outcome: Outcome) -> String {
        self.bold(&outcome.to_string(), Theme::outcome(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_painter_is_identity() {
        let p = Painter::plain();
        assert_eq!(p.paint("hello", Theme::HEADER), "hello");
        assert_eq!(p.outcome(Outcome::Failed), "FAILED");
    }

    #[test]
    fn test_colored_painter_emits_ansi() {
        let s = Painter::colored().paint("hello", Theme::PASS);
        assert!(s.contains("\u{1b}["));
        assert!(s.contains("hello"));
    }
}
