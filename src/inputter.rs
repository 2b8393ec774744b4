use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single-line query editor for the country type-ahead in the sidebar.
#[derive(Default)]
pub struct Inputter {
    query: String,
    cursor: usize, // In chars, not bytes
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub query: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => {
                self.clear();
                self.canceled = true;
                self.finished = true;
            }
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Left, _) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Right, _) => {
                self.cursor = std::cmp::min(self.cursor + 1, self.query.chars().count())
            }
            (KeyCode::Char(chr), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                self.query.insert(self.byte_pos(), chr);
                self.cursor += 1;
            }
            _ => {}
        }
        trace!("Search input: {:?} @{}", self.query, self.cursor);
        self.get()
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            query: self.query.clone(),
            finished: self.finished,
            canceled: self.canceled,
            cursor: self.cursor,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.query.clear();
        self.cursor = 0;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let pos = self.byte_pos();
            self.query.remove(pos);
        }
    }

    fn byte_pos(&self) -> usize {
        self.query
            .char_indices()
            .nth(self.cursor)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.query.len())
    }
}

/// Case-insensitive substring match used to narrow the country list.
pub fn matches(query: &str, candidate: &str) -> bool {
    query.is_empty() || candidate.to_lowercase().contains(&query.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut Inputter, s: &str) -> InputResult {
        let mut last = input.get();
        for c in s.chars() {
            last = input.read(key(KeyCode::Char(c)));
        }
        last
    }

    #[test]
    fn typing_and_editing() {
        let mut input = Inputter::default();
        type_str(&mut input, "Fnland");
        for _ in 0..5 {
            input.read(key(KeyCode::Left));
        }
        let result = input.read(key(KeyCode::Char('i')));
        assert_eq!(result.query, "Finland");
        assert_eq!(result.cursor, 2);

        input.read(key(KeyCode::Backspace));
        assert_eq!(input.get().query, "Fnland");
        assert!(input.read(key(KeyCode::Enter)).finished);
    }

    #[test]
    fn escape_cancels_and_clears() {
        let mut input = Inputter::default();
        type_str(&mut input, "Côte");
        let result = input.read(key(KeyCode::Esc));
        assert!(result.canceled && result.finished);
        assert_eq!(result.query, "");
    }

    #[test]
    fn matching_ignores_case() {
        assert!(matches("", "Chad"));
        assert!(matches("fin", "Finland"));
        assert!(!matches("fin", "Chad"));
    }
}
