use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

const HELP_TEXT: &str = "\
Keyboard
--------
Up / Down        Previous / next page (pending edits are applied first)
Enter            Apply pending edits to the page
Ctrl+S           Save PDF (prompts for a path)
+ / -            Zoom in / out
t                Toggle add-text mode
r                Toggle remove-text mode
u                Undo latest selection
U                Undo all pending edits
f                Cycle annotation font size
o                Open a PDF by path
?                Toggle this help
q                Quit

Mouse
-----
Left drag        Select an area to whiteout (normal mode)
Left click       Add text, or edit font size of existing text (add-text mode)
                 Remove text under the pointer (remove-text mode)
Right drag       Move a pending text annotation
Wheel            Zoom in / out

Pending edits draw as outlines; Apply burns them into the page for good.";

pub enum HelpPopupAction {
    Close,
}

pub struct HelpPopup {
    scroll_offset: usize,
    last_popup_area: Option<Rect>,
}

impl Default for HelpPopup {
    fn default() -> Self {
        Self::new()
    }
}

impl HelpPopup {
    pub fn new() -> Self {
        HelpPopup {
            scroll_offset: 0,
            last_popup_area: None,
        }
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        // Calculate the maximum line width in the content
        let max_content_width = HELP_TEXT
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(80);

        // Left and right margins plus borders
        let desired_width = (max_content_width + 6).min(area.width as usize);

        let popup_area = content_sized_rect(desired_width as u16, 90, area);
        self.last_popup_area = Some(popup_area);

        f.render_widget(Clear, popup_area);

        let lines: Vec<Line> = HELP_TEXT
            .lines()
            .skip(self.scroll_offset)
            .map(|line| {
                Line::from(Span::styled(
                    format!("  {}", line),
                    Style::default().fg(Color::Gray),
                ))
            })
            .collect();

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(" Help - Press ? or ESC to close ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });

        f.render_widget(paragraph, popup_area);
    }

    pub fn scroll_down(&mut self) {
        let max_lines = HELP_TEXT.lines().count();
        if self.scroll_offset < max_lines.saturating_sub(1) {
            self.scroll_offset += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Option<HelpPopupAction> {
        use crossterm::event::KeyCode;

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.scroll_down();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.scroll_up();
                None
            }
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => Some(HelpPopupAction::Close),
            _ => None,
        }
    }
}

fn content_sized_rect(width: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    // Calculate centering based on fixed width
    let available_width = r.width;
    let width = width.min(available_width);
    let margin = (available_width.saturating_sub(width)) / 2;

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(margin),
            Constraint::Length(width),
            Constraint::Length(margin),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn scrolling_stays_in_bounds() {
        let mut popup = HelpPopup::new();
        popup.scroll_up();
        assert_eq!(popup.scroll_offset, 0);

        for _ in 0..500 {
            popup.scroll_down();
        }
        assert!(popup.scroll_offset < HELP_TEXT.lines().count());
    }

    #[test]
    fn close_keys_close() {
        let mut popup = HelpPopup::new();
        assert!(popup.handle_key(key(KeyCode::Esc)).is_some());
        assert!(popup.handle_key(key(KeyCode::Char('?'))).is_some());
        assert!(popup.handle_key(key(KeyCode::Char('j'))).is_none());
    }
}
