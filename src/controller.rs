use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crate::domain::{DashboardConfig, JoyError, Message, Tab};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DashboardConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, JoyError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            // While the search line is open every key goes to the input editor.
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(self.handle_key(key));
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Tab, _) => Some(Message::NextTab),
            (KeyCode::BackTab, _) => Some(Message::PreviousTab),
            (KeyCode::Char('1'), _) => Some(Message::SelectTab(Tab::Dashboard)),
            (KeyCode::Char('2'), _) => Some(Message::SelectTab(Tab::Analysis)),
            (KeyCode::Char('3'), _) => Some(Message::SelectTab(Tab::Data)),
            (KeyCode::Char('f'), _) => Some(Message::CycleFocus),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::ScrollUp),
            (KeyCode::PageDown, _) => Some(Message::ScrollDown),
            (KeyCode::Char(' ') | KeyCode::Enter, _) => Some(Message::ToggleCountry),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('m'), _) => Some(Message::NextMetric),
            (KeyCode::Char('M'), _) => Some(Message::PreviousMetric),
            (KeyCode::Char('x'), _) => Some(Message::CycleXAxis),
            (KeyCode::Char('y'), _) => Some(Message::CycleYAxis),
            (KeyCode::Char('r'), _) => Some(Message::ResetFilters),
            (KeyCode::Char('s'), _) => Some(Message::SaveCsv),
            (KeyCode::Char('c'), _) => Some(Message::CopyCsv),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode, modifiers: KeyModifiers) -> Option<Message> {
        let controller = Controller::new(&DashboardConfig::default());
        controller.handle_key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn keys_map_to_messages() {
        assert_eq!(map(KeyCode::Char('q'), KeyModifiers::NONE), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('c'), KeyModifiers::NONE), Some(Message::CopyCsv));
        assert_eq!(
            map(KeyCode::Char('3'), KeyModifiers::NONE),
            Some(Message::SelectTab(Tab::Data))
        );
        assert_eq!(map(KeyCode::Char('M'), KeyModifiers::SHIFT), Some(Message::PreviousMetric));
        assert_eq!(map(KeyCode::F(5), KeyModifiers::NONE), None);
    }
}
