use anyhow::Result;
pub use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEventKind};
use std::time::Duration;

/// Trait for abstracting event sources to enable testing
pub trait EventSource {
    /// Poll for events with a timeout
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Read the next event
    fn read(&mut self) -> Result<Event>;
}

/// Real terminal event source using crossterm
pub struct TerminalEventSource;

impl EventSource for TerminalEventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        Ok(crossterm::event::poll(timeout)?)
    }

    fn read(&mut self) -> Result<Event> {
        Ok(crossterm::event::read()?)
    }
}

/// Simulated event source for testing
pub struct SimulatedEventSource {
    events: Vec<Event>,
    current_index: usize,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            current_index: 0,
        }
    }

    /// Helper method to create a key event
    pub fn key_event(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: crossterm::event::KeyEventKind::Press,
            state: crossterm::event::KeyEventState::empty(),
        })
    }

    /// Helper method to create a simple character key event
    pub fn char_key(c: char) -> Event {
        Self::key_event(KeyCode::Char(c), KeyModifiers::empty())
    }

    /// Helper method to create a Ctrl+char key event
    pub fn ctrl_char_key(c: char) -> Event {
        Self::key_event(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    /// Helper method to create a mouse event at a cell position
    pub fn mouse_event(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(crossterm::event::MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::empty(),
        })
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.current_index < self.events.len())
    }

    fn read(&mut self) -> Result<Event> {
        if self.current_index < self.events.len() {
            let event = self.events[self.current_index].clone();
            self.current_index += 1;
            Ok(event)
        } else {
            // Return a quit event if we've exhausted all events
            Ok(SimulatedEventSource::char_key('q'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_source_replays_in_order() {
        let events = vec![
            SimulatedEventSource::char_key('t'),
            SimulatedEventSource::ctrl_char_key('s'),
            SimulatedEventSource::mouse_event(MouseEventKind::Down(MouseButton::Left), 4, 7),
        ];

        let mut source = SimulatedEventSource::new(events);
        assert!(source.poll(Duration::from_millis(0)).unwrap());

        if let Event::Key(key) = source.read().unwrap() {
            assert_eq!(key.code, KeyCode::Char('t'));
            assert!(key.modifiers.is_empty());
        }

        if let Event::Key(key) = source.read().unwrap() {
            assert_eq!(key.code, KeyCode::Char('s'));
            assert!(key.modifiers.contains(KeyModifiers::CONTROL));
        }

        if let Event::Mouse(mouse) = source.read().unwrap() {
            assert_eq!(mouse.column, 4);
            assert_eq!(mouse.row, 7);
        }

        assert!(!source.poll(Duration::from_millis(0)).unwrap());
    }
}
