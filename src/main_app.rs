//! Application shell
//!
//! Owns the terminal UI around the edit session: the event loop, the
//! toolbar, popups, notifications, and the mapping between terminal cells
//! and the screen-space pixels the session works in. All session effects
//! funnel through [`App::run_effects`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use log::{debug, error};
use ratatui::{
    Frame, Terminal,
    backend::Backend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use ratatui_image::{Resize, StatefulImage, picker::Picker, protocol::StatefulProtocol};

use crate::event_source::EventSource;
use crate::geom::ScreenPoint;
use crate::notification::{NotificationLevel, NotificationManager};
use crate::pdf::paint_overlays;
use crate::session::{Direction as PageDirection, EditSession, Effect, InteractionMode};
use crate::widget::help_popup::{HelpPopup, HelpPopupAction};
use crate::widget::prompt::{Prompt, PromptKind, PromptOutcome};
use crate::widget::toolbar::{Control, ControlView, Toolbar};

const TICK_RATE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

pub struct App {
    session: Option<EditSession>,
    doc_path: Option<PathBuf>,
    picker: Picker,
    protocol: Option<StatefulProtocol>,
    needs_render: bool,
    canvas: Rect,
    toolbar: Toolbar,
    toolbar_row: u16,
    notifications: NotificationManager,
    help: Option<HelpPopup>,
    prompt: Option<Prompt>,
}

impl App {
    pub fn new(picker: Picker) -> Self {
        let toolbar = Toolbar::build(&ControlView::default());
        Self {
            session: None,
            doc_path: None,
            picker,
            protocol: None,
            needs_render: false,
            canvas: Rect::default(),
            toolbar,
            toolbar_row: 0,
            notifications: NotificationManager::new(),
            help: None,
            prompt: None,
        }
    }

    /// Load a document; on failure the current session stays as it was
    pub fn open_document(&mut self, path: &Path) {
        match EditSession::open(path) {
            Ok(session) => {
                self.session = Some(session);
                self.doc_path = Some(path.to_path_buf());
                self.protocol = None;
                self.needs_render = true;
                self.notifications.info(format!("Opened {}", path.display()));
            }
            Err(err) => {
                error!("open {} failed: {err}", path.display());
                self.notifications
                    .error(format!("Cannot open {}: {err}", path.display()));
            }
        }
    }

    fn view(&self) -> ControlView {
        match &self.session {
            Some(session) => ControlView {
                has_document: true,
                page_index: session.page_index(),
                page_count: session.page_count(),
                has_erasures: !session.pending().erasures().is_empty(),
                has_pending: !session.pending().is_empty(),
                scale: session.scale(),
                mode: session.mode(),
                font_size_pt: session.font_size_pt(),
            },
            None => ControlView::default(),
        }
    }

    pub fn handle_event(&mut self, event: Event) -> Option<AppAction> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                None
            }
            Event::Resize(..) => {
                self.needs_render = true;
                None
            }
            _ => None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        if let Some(help) = &mut self.help {
            if let Some(HelpPopupAction::Close) = help.handle_key(key) {
                self.help = None;
            }
            return None;
        }

        if let Some(prompt) = &mut self.prompt {
            match prompt.handle_key(key) {
                PromptOutcome::Submitted(value) => self.finish_prompt(value),
                // Dismissing a prompt (save included) is a silent no-op.
                PromptOutcome::Cancelled => self.prompt = None,
                PromptOutcome::Pending => {}
            }
            return None;
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) => return Some(AppAction::Quit),
            (KeyCode::Char('?'), _) => self.help = Some(HelpPopup::new()),
            (KeyCode::Char('o'), _) => {
                self.prompt = Some(Prompt::new(PromptKind::OpenPath, ""));
            }
            (KeyCode::Char('s'), m) if m.contains(KeyModifiers::CONTROL) => self.prompt_save(),
            (KeyCode::Up, _) => self.navigate(PageDirection::Previous),
            (KeyCode::Down, _) => self.navigate(PageDirection::Next),
            (KeyCode::Enter, _) => self.apply(),
            (KeyCode::Char('+') | KeyCode::Char('='), _) => {
                self.with_session(|s| s.zoom_in());
            }
            (KeyCode::Char('-'), _) => {
                self.with_session(|s| s.zoom_out());
            }
            (KeyCode::Char('t'), _) => {
                self.with_session(|s| s.toggle_mode(InteractionMode::AddText));
            }
            (KeyCode::Char('r'), _) => {
                self.with_session(|s| s.toggle_mode(InteractionMode::RemoveText));
            }
            (KeyCode::Char('u'), _) => {
                self.with_session(|s| s.undo_last());
            }
            (KeyCode::Char('U'), _) => {
                self.with_session(|s| s.undo_all());
            }
            (KeyCode::Char('f'), _) => {
                self.with_session(|s| s.cycle_font_size());
            }
            _ => {}
        }
        None
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.help.is_some() || self.prompt.is_some() {
            return;
        }

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if mouse.row == self.toolbar_row {
                    if let Some(control) = self.toolbar.hit(mouse.column) {
                        self.activate_control(control);
                    }
                    return;
                }
                let Some(p) = self.canvas_pixel(mouse.column, mouse.row) else {
                    return;
                };
                let Some(mode) = self.session.as_ref().map(EditSession::mode) else {
                    return;
                };
                match mode {
                    InteractionMode::Normal => self.with_session(|s| s.begin_selection(p)),
                    InteractionMode::AddText => self.with_session(|s| s.add_or_edit_text(p)),
                    InteractionMode::RemoveText => self.with_session(|s| s.remove_text(p)),
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let p = self.canvas_pixel_clamped(mouse.column, mouse.row);
                self.with_session(|s| s.update_selection(p));
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let p = self.canvas_pixel_clamped(mouse.column, mouse.row);
                self.with_session(|s| s.end_selection(p));
            }
            MouseEventKind::Down(MouseButton::Right) => {
                if let Some(p) = self.canvas_pixel(mouse.column, mouse.row) {
                    self.with_session(|s| s.begin_text_drag(p));
                }
            }
            MouseEventKind::Drag(MouseButton::Right) => {
                let p = self.canvas_pixel_clamped(mouse.column, mouse.row);
                self.with_session(|s| s.update_text_drag(p));
            }
            MouseEventKind::Up(MouseButton::Right) => {
                self.with_session(|s| s.end_text_drag());
            }
            MouseEventKind::ScrollUp => {
                self.with_session(|s| s.zoom_in());
            }
            MouseEventKind::ScrollDown => {
                self.with_session(|s| s.zoom_out());
            }
            _ => {}
        }
    }

    fn activate_control(&mut self, control: Control) {
        debug!("toolbar: {control:?}");
        match control {
            Control::Open => self.prompt = Some(Prompt::new(PromptKind::OpenPath, "")),
            Control::PrevPage => self.navigate(PageDirection::Previous),
            Control::NextPage => self.navigate(PageDirection::Next),
            Control::Apply => self.apply(),
            Control::Save => self.prompt_save(),
            Control::UndoLast => self.with_session(|s| s.undo_last()),
            Control::UndoAll => self.with_session(|s| s.undo_all()),
            Control::AddText => self.with_session(|s| s.toggle_mode(InteractionMode::AddText)),
            Control::RemoveText => {
                self.with_session(|s| s.toggle_mode(InteractionMode::RemoveText));
            }
            Control::ZoomOut => self.with_session(|s| s.zoom_out()),
            Control::ZoomIn => self.with_session(|s| s.zoom_in()),
            Control::FontSize => self.with_session(|s| s.cycle_font_size()),
            Control::Help => self.help = Some(HelpPopup::new()),
        }
    }

    fn navigate(&mut self, direction: PageDirection) {
        let Some(session) = &mut self.session else {
            return;
        };
        match session.navigate(direction) {
            Ok(effects) => self.run_effects(effects),
            Err(err) => self.notifications.error(format!("Page change failed: {err}")),
        }
    }

    fn apply(&mut self) {
        let Some(session) = &mut self.session else {
            return;
        };
        match session.apply() {
            Ok(effects) => self.run_effects(effects),
            Err(err) => self.notifications.error(format!("Apply failed: {err}")),
        }
    }

    fn prompt_save(&mut self) {
        if self.session.is_none() {
            return;
        }
        let initial = self
            .doc_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.prompt = Some(Prompt::new(PromptKind::SavePath, &initial));
    }

    fn finish_prompt(&mut self, value: String) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        let trimmed = value.trim();

        match prompt.kind() {
            PromptKind::OpenPath => {
                if !trimmed.is_empty() {
                    self.open_document(Path::new(trimmed));
                }
            }
            PromptKind::SavePath => {
                if trimmed.is_empty() {
                    return;
                }
                let path = PathBuf::from(trimmed);
                let Some(session) = &mut self.session else {
                    return;
                };
                match session.save(&path) {
                    Ok(effects) => {
                        self.doc_path = Some(path);
                        self.run_effects(effects);
                    }
                    Err(err) => self.notifications.error(format!("Save failed: {err}")),
                }
            }
            PromptKind::AnnotationText { at } => {
                let text = trimmed.to_string();
                self.with_session(|s| s.commit_new_text(at, text));
            }
            PromptKind::FontSize { id } => match trimmed.parse::<f32>() {
                Ok(size) => self.with_session(|s| s.commit_font_size(id, size)),
                Err(_) => self.notifications.error(format!("Not a number: {trimmed}")),
            },
        }
    }

    fn with_session<F>(&mut self, f: F)
    where
        F: FnOnce(&mut EditSession) -> Vec<Effect>,
    {
        let Some(session) = &mut self.session else {
            return;
        };
        let effects = f(session);
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Rerender => self.needs_render = true,
                Effect::Info(message) => self.notifications.info(message),
                Effect::Error(message) => self.notifications.error(message),
                Effect::PromptText { at } => {
                    self.prompt = Some(Prompt::new(PromptKind::AnnotationText { at }, ""));
                }
                Effect::PromptFontSize { id } => {
                    let current = self
                        .session
                        .as_ref()
                        .and_then(|s| s.pending().text(id).map(|t| t.font_size / s.scale()))
                        .unwrap_or(crate::session::DEFAULT_FONT_SIZE);
                    self.prompt = Some(Prompt::new(
                        PromptKind::FontSize { id },
                        &format!("{current:.0}"),
                    ));
                }
            }
        }
    }

    /// Map a terminal cell on the canvas to screen-space pixels
    fn canvas_pixel(&self, column: u16, row: u16) -> Option<ScreenPoint> {
        if !self.canvas.contains(Position::new(column, row)) {
            return None;
        }
        let (fw, fh) = self.picker.font_size();
        Some(ScreenPoint::new(
            (f32::from(column - self.canvas.x) + 0.5) * f32::from(fw),
            (f32::from(row - self.canvas.y) + 0.5) * f32::from(fh),
        ))
    }

    /// Same mapping, but clamped into the canvas so drags that leave the
    /// widget still resolve to an edge point
    fn canvas_pixel_clamped(&self, column: u16, row: u16) -> ScreenPoint {
        let canvas = self.canvas;
        let col = column
            .max(canvas.x)
            .min(canvas.x.saturating_add(canvas.width.saturating_sub(1)));
        let row = row
            .max(canvas.y)
            .min(canvas.y.saturating_add(canvas.height.saturating_sub(1)));
        self.canvas_pixel(col, row).unwrap_or_default()
    }

    fn refresh_protocol(&mut self) {
        self.needs_render = false;
        let Some(session) = &mut self.session else {
            self.protocol = None;
            return;
        };
        match session.render_page() {
            Ok(mut img) => {
                paint_overlays(&mut img, session.pending(), session.live_selection());
                self.protocol = Some(self.picker.new_resize_protocol(img.into_image()));
            }
            Err(err) => {
                error!("render failed: {err}");
                self.notifications.error(format!("Render failed: {err}"));
            }
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(f.area());

        self.toolbar = Toolbar::build(&self.view());
        self.toolbar_row = chunks[0].y;
        f.render_widget(Paragraph::new(self.toolbar.line().clone()), chunks[0]);

        self.canvas = chunks[1];
        if self.needs_render {
            self.refresh_protocol();
        }
        if let Some(protocol) = &mut self.protocol {
            // Crop instead of scaling so cell-to-pixel mapping stays exact.
            let image = StatefulImage::default().resize(Resize::Crop(None));
            f.render_stateful_widget(image, chunks[1], protocol);
        } else {
            let hint = Paragraph::new(Line::from(Span::styled(
                "No document. Press o to open a PDF, ? for help.",
                Style::default().fg(Color::DarkGray),
            )));
            f.render_widget(hint, chunks[1]);
        }

        self.draw_annotation_texts(f);
        self.draw_status(f, chunks[2]);

        if let Some(help) = &mut self.help {
            help.render(f, f.area());
        }
        if let Some(prompt) = &self.prompt {
            prompt.render(f, f.area());
        }
    }

    /// Overlay pending annotation text at its cell position; the outline
    /// box is already painted into the bitmap
    fn draw_annotation_texts(&mut self, f: &mut Frame) {
        let Some(session) = &self.session else {
            return;
        };
        let (fw, fh) = self.picker.font_size();
        let canvas = self.canvas;

        for text in session.pending().texts() {
            let bbox = text.bounding_box();
            let col = canvas.x as i32 + (bbox.x0 / f32::from(fw)) as i32;
            let row = canvas.y as i32 + ((bbox.y0 + bbox.y1) / 2.0 / f32::from(fh)) as i32;
            if col < canvas.x as i32
                || row < canvas.y as i32
                || row >= (canvas.y + canvas.height) as i32
                || col >= (canvas.x + canvas.width) as i32
            {
                continue;
            }

            let max_width = (canvas.x + canvas.width).saturating_sub(col as u16);
            let width = (text.text.chars().count() as u16).min(max_width);
            if width == 0 {
                continue;
            }
            let area = Rect::new(col as u16, row as u16, width, 1);
            f.render_widget(
                Paragraph::new(Span::styled(
                    text.text.clone(),
                    Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                )),
                area,
            );
        }
    }

    fn draw_status(&mut self, f: &mut Frame, area: Rect) {
        let mut spans: Vec<Span> = Vec::new();

        if let Some(notification) = self.notifications.current() {
            let style = match notification.level {
                NotificationLevel::Info => Style::default().fg(Color::Green),
                NotificationLevel::Error => {
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                }
            };
            spans.push(Span::styled(format!(" {} ", notification.message), style));
        } else if let Some(session) = &self.session {
            let name = self
                .doc_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            spans.push(Span::raw(format!(
                " {} | page {}/{} | {:.0}%",
                name,
                session.page_index() + 1,
                session.page_count(),
                session.scale() * 100.0
            )));
            let mode = match session.mode() {
                InteractionMode::Normal => None,
                InteractionMode::AddText => Some(" ADD TEXT "),
                InteractionMode::RemoveText => Some(" REMOVE TEXT "),
            };
            if let Some(mode) = mode {
                spans.push(Span::raw(" | "));
                spans.push(Span::styled(
                    mode,
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            if !session.pending().is_empty() {
                spans.push(Span::styled(
                    format!(
                        " | {} pending",
                        session.pending().erasures().len() + session.pending().texts().len()
                    ),
                    Style::default().fg(Color::Yellow),
                ));
            }
        } else {
            spans.push(Span::styled(
                " no document ",
                Style::default().fg(Color::DarkGray),
            ));
        }

        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

/// Main loop: draw, poll, dispatch, until quit
pub fn run_app<B: Backend, E: EventSource>(
    terminal: &mut Terminal<B>,
    events: &mut E,
    app: &mut App,
) -> Result<()> {
    loop {
        app.notifications.update();
        terminal.draw(|f| app.draw(f))?;

        if events.poll(TICK_RATE)? {
            let event = events.read()?;
            if let Some(AppAction::Quit) = app.handle_event(event) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_source::SimulatedEventSource;
    use ratatui::backend::TestBackend;

    fn test_app() -> App {
        App::new(Picker::from_fontsize((8, 16)))
    }

    #[test]
    fn quit_key_quits() {
        let mut app = test_app();
        let action = app.handle_event(SimulatedEventSource::char_key('q'));
        assert_eq!(action, Some(AppAction::Quit));
    }

    #[test]
    fn open_failure_reports_and_keeps_state() {
        let mut app = test_app();
        app.open_document(Path::new("/definitely/not/here.pdf"));
        assert!(app.session.is_none());
        let notification = app.notifications.current().unwrap();
        assert_eq!(notification.level, NotificationLevel::Error);
    }

    #[test]
    fn help_opens_and_closes() {
        let mut app = test_app();
        app.handle_event(SimulatedEventSource::char_key('?'));
        assert!(app.help.is_some());
        app.handle_event(SimulatedEventSource::key_event(
            KeyCode::Esc,
            KeyModifiers::NONE,
        ));
        assert!(app.help.is_none());
    }

    #[test]
    fn session_keys_are_ignored_without_document() {
        let mut app = test_app();
        for event in [
            SimulatedEventSource::char_key('t'),
            SimulatedEventSource::char_key('u'),
            SimulatedEventSource::key_event(KeyCode::Up, KeyModifiers::NONE),
            SimulatedEventSource::key_event(KeyCode::Enter, KeyModifiers::NONE),
            SimulatedEventSource::ctrl_char_key('s'),
        ] {
            assert!(app.handle_event(event).is_none());
        }
        assert!(app.prompt.is_none());
    }

    #[test]
    fn canvas_pixel_maps_cell_centers() {
        let mut app = test_app();
        app.canvas = Rect::new(0, 1, 80, 22);

        // Font size (8, 16): cell (4, 7) -> canvas-local (4, 6).
        let p = app.canvas_pixel(4, 7).unwrap();
        assert!((p.x - 36.0).abs() < f32::EPSILON);
        assert!((p.y - 104.0).abs() < f32::EPSILON);

        // Toolbar row (above the canvas) maps to nothing.
        assert!(app.canvas_pixel(4, 0).is_none());
    }

    #[test]
    fn clamped_mapping_never_leaves_the_canvas() {
        let mut app = test_app();
        app.canvas = Rect::new(0, 1, 80, 22);

        let p = app.canvas_pixel_clamped(200, 0);
        assert!(p.x <= 80.0 * 8.0);
        assert!(p.y >= 0.0);
    }

    #[test]
    fn draw_without_document_renders_hint() {
        let mut app = test_app();
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();

        let mut events = SimulatedEventSource::new(vec![SimulatedEventSource::char_key('q')]);
        run_app(&mut terminal, &mut events, &mut app).unwrap();
    }

    #[test]
    fn open_prompt_flow_reaches_open_document() {
        let mut app = test_app();
        app.handle_event(SimulatedEventSource::char_key('o'));
        assert!(app.prompt.is_some());

        app.handle_event(SimulatedEventSource::char_key('x'));
        app.handle_event(SimulatedEventSource::key_event(
            KeyCode::Enter,
            KeyModifiers::NONE,
        ));
        assert!(app.prompt.is_none());
        // "x" is not a PDF: an error notification lands.
        assert_eq!(
            app.notifications.current().unwrap().level,
            NotificationLevel::Error
        );
    }
}
