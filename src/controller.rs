use std::sync::mpsc::Receiver;
use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TVConfig, TVError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
    tasks: Receiver<Message>,
}

impl Controller {
    pub fn new(cfg: &TVConfig, tasks: Receiver<Message>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            tasks,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TVError> {
        // Results of background tasks are handled before new input
        if let Ok(message) = self.tasks.try_recv() {
            return Ok(Some(message));
        }

        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(self.handle_key(key, model.raw_keyevents()));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent, raw: bool) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('d') | KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            _ if raw => Some(Message::RawKey(key)),
            (KeyCode::Char('q') | KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
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
    use std::sync::mpsc;

    fn controller() -> Controller {
        let (_sender, receiver) = mpsc::channel();
        Controller::new(&TVConfig::default(), receiver)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn navigation_keys() {
        let c = controller();
        assert!(matches!(c.handle_key(key(KeyCode::Char('j')), false), Some(Message::MoveDown)));
        assert!(matches!(c.handle_key(key(KeyCode::Up), false), Some(Message::MoveUp)));
        assert!(matches!(c.handle_key(key(KeyCode::Esc), false), Some(Message::Exit)));
        assert!(matches!(c.handle_key(key(KeyCode::Char('q')), false), Some(Message::Exit)));
        assert!(matches!(c.handle_key(key(KeyCode::Enter), false), Some(Message::Enter)));
        assert!(c.handle_key(key(KeyCode::Char('x')), false).is_none());
    }

    #[test]
    fn raw_mode_passes_keys_through() {
        let c = controller();
        assert!(matches!(
            c.handle_key(key(KeyCode::Char('q')), true),
            Some(Message::RawKey(_))
        ));
        assert!(matches!(
            c.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL), true),
            Some(Message::Quit)
        ));
    }
}
