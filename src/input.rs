use crossterm::event::{Event, KeyEvent};
use unicode_width::UnicodeWidthStr;

use tui_input::{backend::crossterm::EventHandler, Input};

/// Single-line search prompt shown under the host table.
pub(crate) struct SearchInput {
    input: Input,
    prompt: String,
}

impl SearchInput {
    pub(crate) fn new(prompt: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            prompt: prompt.into(),
        }
    }

    pub(crate) fn pattern(&self) -> &str {
        self.input.value()
    }

    /// Prompt followed by the typed pattern.
    pub(crate) fn line(&self) -> String {
        format!("{}{}", self.prompt, self.input.value())
    }

    pub(crate) fn visual_cursor(&self) -> usize {
        UnicodeWidthStr::width(self.prompt.as_str()) + self.input.visual_cursor()
    }

    /// Returns true when the pattern changed.
    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.input
            .handle_event(&Event::Key(key))
            .map(|change| change.value)
            .unwrap_or(false)
    }

    pub(crate) fn clear(&mut self) {
        self.input.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_edits_pattern() {
        let mut search = SearchInput::new("/ ");
        assert!(search.handle_key(key(KeyCode::Char('d'))));
        assert!(search.handle_key(key(KeyCode::Char('b'))));
        assert_eq!(search.pattern(), "db");
        assert_eq!(search.line(), "/ db");
        assert_eq!(search.visual_cursor(), 4);

        assert!(search.handle_key(key(KeyCode::Backspace)));
        assert_eq!(search.pattern(), "d");

        search.clear();
        assert_eq!(search.pattern(), "");
    }

    #[test]
    fn cursor_moves_do_not_change_pattern() {
        let mut search = SearchInput::new("/ ");
        search.handle_key(key(KeyCode::Char('x')));
        assert!(!search.handle_key(key(KeyCode::Left)));
        assert_eq!(search.pattern(), "x");
    }
}
