//! Styled conversation history.
//!
//! Every line shown in a conversation goes through a [`MessageFormatter`]
//! and is kept in a [`ChatHistory`], so a surface that attaches later (or
//! re-attaches after being torn down) can be filled with what it missed.

use std::collections::VecDeque;

use chrono::Local;
use parking_lot::Mutex;

/// RGB color of a message line, as chosen by the engine for each user.
pub type Color = u32;

/// Color used for system messages.
pub const SYSTEM_COLOR: Color = 0x00_88_00;

/// Color used for the local user's own messages.
pub const OWN_COLOR: Color = 0x00_00_00;

/// Turns raw message text into the line stored in history.
pub trait MessageFormatter: Send + Sync {
    /// Style a single line of text.
    fn style(&self, text: &str, color: Color) -> String;
}

/// Prefixes each line with a local timestamp, e.g. `[14:29:21] <Kou>: hi`.
#[derive(Debug, Clone)]
pub struct TimestampFormatter {
    format: String,
}

impl TimestampFormatter {
    /// Create a formatter using a chrono format string.
    #[must_use]
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }
}

impl Default for TimestampFormatter {
    fn default() -> Self {
        Self::new("%H:%M:%S")
    }
}

impl MessageFormatter for TimestampFormatter {
    fn style(&self, text: &str, _color: Color) -> String {
        format!("[{}] {text}", Local::now().format(&self.format))
    }
}

/// Stores text as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl MessageFormatter for PlainFormatter {
    fn style(&self, text: &str, _color: Color) -> String {
        text.to_string()
    }
}

/// Bounded buffer of styled lines for one conversation.
///
/// Oldest lines are dropped once `max_lines` is reached.
#[derive(Debug)]
pub struct ChatHistory {
    lines: Mutex<VecDeque<String>>,
    max_lines: usize,
}

impl ChatHistory {
    /// Create an empty history keeping at most `max_lines` lines.
    #[must_use]
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            max_lines: max_lines.max(1),
        }
    }

    /// Style `text`, store it, and return the styled line.
    pub fn style_and_append(
        &self,
        formatter: &dyn MessageFormatter,
        text: &str,
        color: Color,
    ) -> String {
        let styled = formatter.style(text, color);
        let mut lines = self.lines.lock();
        if lines.len() == self.max_lines {
            lines.pop_front();
        }
        lines.push_back(styled.clone());
        styled
    }

    /// All stored lines joined with newlines.
    #[must_use]
    pub fn contents(&self) -> String {
        let lines = self.lines.lock();
        let mut out = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    /// Number of stored lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Whether nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}
