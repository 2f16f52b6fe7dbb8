//! Single-line input popup
//!
//! Stands in for the file-picker and text dialogs of a desktop toolkit:
//! open path, save path, annotation content, and font size all go through
//! the same one-line textarea. Esc dismisses without any state change.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear},
};
use tui_textarea::TextArea;

use crate::edits::AnnotationId;
use crate::geom::ScreenPoint;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PromptKind {
    OpenPath,
    SavePath,
    AnnotationText { at: ScreenPoint },
    FontSize { id: AnnotationId },
}

impl PromptKind {
    fn title(self) -> &'static str {
        match self {
            PromptKind::OpenPath => " Open PDF ",
            PromptKind::SavePath => " Save PDF as ",
            PromptKind::AnnotationText { .. } => " Annotation text ",
            PromptKind::FontSize { .. } => " Font size (pt) ",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PromptOutcome {
    Pending,
    Submitted(String),
    Cancelled,
}

pub struct Prompt {
    kind: PromptKind,
    textarea: TextArea<'static>,
}

impl Prompt {
    pub fn new(kind: PromptKind, initial: &str) -> Self {
        let mut textarea = TextArea::default();
        textarea.insert_str(initial);
        textarea.set_cursor_line_style(Style::default());
        textarea.set_block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(kind.title()),
        );
        Self { kind, textarea }
    }

    #[must_use]
    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PromptOutcome {
        match key.code {
            KeyCode::Enter => {
                let value = self
                    .textarea
                    .lines()
                    .first()
                    .cloned()
                    .unwrap_or_default();
                PromptOutcome::Submitted(value)
            }
            KeyCode::Esc => PromptOutcome::Cancelled,
            _ => {
                self.textarea.input(key);
                PromptOutcome::Pending
            }
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let popup = centered_input_rect(area);
        f.render_widget(Clear, popup);
        f.render_widget(&self.textarea, popup);
    }
}

fn centered_input_rect(r: Rect) -> Rect {
    let width = 60.min(r.width);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(r);

    let margin = r.width.saturating_sub(width) / 2;
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(margin),
            Constraint::Length(width),
            Constraint::Length(margin),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn submits_initial_value_on_enter() {
        let mut prompt = Prompt::new(PromptKind::SavePath, "out.pdf");
        assert_eq!(
            prompt.handle_key(key(KeyCode::Enter)),
            PromptOutcome::Submitted("out.pdf".to_string())
        );
    }

    #[test]
    fn typed_characters_extend_the_value() {
        let mut prompt = Prompt::new(PromptKind::FontSize { id: dummy_id() }, "1");
        assert_eq!(prompt.handle_key(key(KeyCode::Char('8'))), PromptOutcome::Pending);
        assert_eq!(
            prompt.handle_key(key(KeyCode::Enter)),
            PromptOutcome::Submitted("18".to_string())
        );
    }

    #[test]
    fn escape_cancels() {
        let mut prompt = Prompt::new(PromptKind::OpenPath, "");
        assert_eq!(prompt.handle_key(key(KeyCode::Esc)), PromptOutcome::Cancelled);
    }

    fn dummy_id() -> AnnotationId {
        let mut edits = crate::edits::PendingEdits::new();
        edits.add_text(ScreenPoint::new(0.0, 0.0), "x".to_string(), 12.0)
    }
}
