//! Clickable toolbar
//!
//! Controls are an enum-keyed registry: each control carries its label and
//! an explicit enable/disable policy over a snapshot of session state,
//! instead of widget-tree lookups by button text. The toolbar renders as a
//! single line and resolves mouse clicks back to controls by column range.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::session::{InteractionMode, MAX_SCALE, MIN_SCALE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Open,
    PrevPage,
    NextPage,
    Apply,
    Save,
    UndoLast,
    UndoAll,
    AddText,
    RemoveText,
    ZoomOut,
    ZoomIn,
    FontSize,
    Help,
}

impl Control {
    pub const ALL: [Control; 13] = [
        Control::Open,
        Control::PrevPage,
        Control::NextPage,
        Control::Apply,
        Control::Save,
        Control::UndoLast,
        Control::UndoAll,
        Control::AddText,
        Control::RemoveText,
        Control::ZoomOut,
        Control::ZoomIn,
        Control::FontSize,
        Control::Help,
    ];

    fn label(self, view: &ControlView) -> String {
        match self {
            Control::Open => "Open".to_string(),
            Control::PrevPage => "Prev".to_string(),
            Control::NextPage => "Next".to_string(),
            Control::Apply => "Apply".to_string(),
            Control::Save => "Save".to_string(),
            Control::UndoLast => "Undo".to_string(),
            Control::UndoAll => "Undo All".to_string(),
            Control::AddText => "Add Text".to_string(),
            Control::RemoveText => "Del Text".to_string(),
            Control::ZoomOut => "-".to_string(),
            Control::ZoomIn => "+".to_string(),
            Control::FontSize => format!("{:.0}pt", view.font_size_pt),
            Control::Help => "Help".to_string(),
        }
    }

    /// Enable/disable policy as a function of session state
    #[must_use]
    pub fn enabled(self, view: &ControlView) -> bool {
        match self {
            Control::Open | Control::Help => true,
            Control::PrevPage => view.has_document && view.page_index > 0,
            Control::NextPage => view.has_document && view.page_index + 1 < view.page_count,
            Control::Apply
            | Control::Save
            | Control::AddText
            | Control::RemoveText
            | Control::FontSize => view.has_document,
            Control::UndoLast => view.has_erasures,
            Control::UndoAll => view.has_pending,
            Control::ZoomOut => view.has_document && view.scale > MIN_SCALE + f32::EPSILON,
            Control::ZoomIn => view.has_document && view.scale < MAX_SCALE - f32::EPSILON,
        }
    }

    fn active(self, view: &ControlView) -> bool {
        match self {
            Control::AddText => view.mode == InteractionMode::AddText,
            Control::RemoveText => view.mode == InteractionMode::RemoveText,
            _ => false,
        }
    }
}

/// Snapshot of the session state the toolbar policies read
#[derive(Clone, Copy, Debug)]
pub struct ControlView {
    pub has_document: bool,
    pub page_index: usize,
    pub page_count: usize,
    pub has_erasures: bool,
    pub has_pending: bool,
    pub scale: f32,
    pub mode: InteractionMode,
    pub font_size_pt: f32,
}

impl Default for ControlView {
    fn default() -> Self {
        Self {
            has_document: false,
            page_index: 0,
            page_count: 0,
            has_erasures: false,
            has_pending: false,
            scale: crate::session::DEFAULT_SCALE,
            mode: InteractionMode::Normal,
            font_size_pt: crate::session::DEFAULT_FONT_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    control: Control,
    start: u16,
    end: u16,
    enabled: bool,
}

/// A rendered toolbar line plus the click map that produced it
pub struct Toolbar {
    entries: Vec<Entry>,
    line: Line<'static>,
}

impl Toolbar {
    #[must_use]
    pub fn build(view: &ControlView) -> Self {
        let mut entries = Vec::with_capacity(Control::ALL.len());
        let mut spans = Vec::with_capacity(Control::ALL.len() * 2);
        let mut x: u16 = 0;

        for control in Control::ALL {
            let label = format!("[{}]", control.label(view));
            let width = label.chars().count() as u16;
            let enabled = control.enabled(view);

            let style = if !enabled {
                Style::default().fg(Color::DarkGray)
            } else if control.active(view) {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            entries.push(Entry {
                control,
                start: x,
                end: x + width,
                enabled,
            });
            spans.push(Span::styled(label, style));
            spans.push(Span::raw(" "));
            x += width + 1;
        }

        Self {
            entries,
            line: Line::from(spans),
        }
    }

    #[must_use]
    pub fn line(&self) -> &Line<'static> {
        &self.line
    }

    /// Resolve a click column to an enabled control
    #[must_use]
    pub fn hit(&self, column: u16) -> Option<Control> {
        self.entries
            .iter()
            .find(|e| e.enabled && column >= e.start && column < e.end)
            .map(|e| e.control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_view() -> ControlView {
        ControlView {
            has_document: true,
            page_index: 0,
            page_count: 3,
            ..ControlView::default()
        }
    }

    #[test]
    fn without_document_only_open_and_help_are_enabled() {
        let view = ControlView::default();
        for control in Control::ALL {
            let expected = matches!(control, Control::Open | Control::Help);
            assert_eq!(control.enabled(&view), expected, "{control:?}");
        }
    }

    #[test]
    fn navigation_policies_follow_page_position() {
        let mut view = open_view();
        assert!(!Control::PrevPage.enabled(&view));
        assert!(Control::NextPage.enabled(&view));

        view.page_index = 2;
        assert!(Control::PrevPage.enabled(&view));
        assert!(!Control::NextPage.enabled(&view));
    }

    #[test]
    fn undo_policies_follow_pending_state() {
        let mut view = open_view();
        assert!(!Control::UndoLast.enabled(&view));
        assert!(!Control::UndoAll.enabled(&view));

        view.has_pending = true;
        assert!(Control::UndoAll.enabled(&view));
        assert!(!Control::UndoLast.enabled(&view));

        view.has_erasures = true;
        assert!(Control::UndoLast.enabled(&view));
    }

    #[test]
    fn zoom_policies_respect_bounds() {
        let mut view = open_view();
        view.scale = MIN_SCALE;
        assert!(!Control::ZoomOut.enabled(&view));
        assert!(Control::ZoomIn.enabled(&view));

        view.scale = MAX_SCALE;
        assert!(Control::ZoomOut.enabled(&view));
        assert!(!Control::ZoomIn.enabled(&view));
    }

    #[test]
    fn hit_maps_columns_to_enabled_controls() {
        let toolbar = Toolbar::build(&open_view());

        // "[Open] " occupies columns 0..6.
        assert_eq!(toolbar.hit(0), Some(Control::Open));
        assert_eq!(toolbar.hit(5), Some(Control::Open));
        // The separator space between buttons hits nothing.
        assert_eq!(toolbar.hit(6), None);
    }

    #[test]
    fn hit_skips_disabled_controls() {
        let toolbar = Toolbar::build(&ControlView::default());
        // "[Open] [Prev]..." -- Prev starts at column 7 and is disabled.
        assert_eq!(toolbar.hit(8), None);
        assert_eq!(toolbar.hit(0), Some(Control::Open));
    }
}
