//! Document edit session
//!
//! Tracks the open document, the current page, the zoom factor, and all
//! pending (unapplied) edits, which are kept in screen-space pixels at the
//! current scale. Operations mutate state and return [`Effect`]s for the
//! shell to execute; the session itself never draws and never blocks.

use std::path::Path;

use log::{debug, info};

use crate::edits::{AnnotationId, PendingEdits};
use crate::geom::{ScreenPoint, ScreenRect};
use crate::pdf::{DocumentBackend, PdfDocument, PdfError};

pub const DEFAULT_SCALE: f32 = 2.0;
pub const SCALE_STEP: f32 = 0.25;
pub const MIN_SCALE: f32 = 1.0;
pub const MAX_SCALE: f32 = 5.0;

/// Selectable annotation font sizes, in PDF points
pub const FONT_SIZES: &[f32] = &[8.0, 10.0, 12.0, 14.0, 18.0, 24.0];
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Minimum selection extent; anything smaller is treated as a stray click
const MIN_SELECTION_PX: f32 = 1.0;

/// Mutually exclusive interaction modes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    Normal,
    AddText,
    RemoveText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Effects produced by session operations, executed by the shell
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Re-render the page bitmap and overlays
    Rerender,
    /// Informational message for the status line
    Info(String),
    /// Error message for the status line
    Error(String),
    /// Open a text-content prompt for a new annotation anchored at a point
    PromptText { at: ScreenPoint },
    /// Open a font-size prompt for an existing annotation
    PromptFontSize { id: AnnotationId },
}

/// In-flight mouse gesture
#[derive(Clone, Copy, Debug)]
enum Drag {
    Selecting {
        anchor: ScreenPoint,
        current: ScreenPoint,
    },
    MovingText {
        id: AnnotationId,
        offset: (f32, f32),
    },
}

/// One open document plus everything not yet committed into it
pub struct EditSession<D = PdfDocument> {
    doc: D,
    page_index: usize,
    scale: f32,
    mode: InteractionMode,
    pending: PendingEdits,
    drag: Option<Drag>,
    font_size_pt: f32,
}

impl EditSession<PdfDocument> {
    /// Open a document from disk. On failure the caller's previous session
    /// (if any) is untouched.
    pub fn open(path: &Path) -> Result<Self, PdfError> {
        let doc = PdfDocument::open(path)?;
        info!("opened {} ({} pages)", path.display(), doc.page_count());
        Ok(Self::with_document(doc))
    }

    /// Rasterize the current page at the current scale
    pub fn render_page(&mut self) -> Result<crate::pdf::ImageData, PdfError> {
        let page = self.page_index;
        let scale = self.scale;
        self.doc.render_page(page, scale)
    }
}

impl<D: DocumentBackend> EditSession<D> {
    pub fn with_document(doc: D) -> Self {
        Self {
            doc,
            page_index: 0,
            scale: DEFAULT_SCALE,
            mode: InteractionMode::Normal,
            pending: PendingEdits::new(),
            drag: None,
            font_size_pt: DEFAULT_FONT_SIZE,
        }
    }

    #[must_use]
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.doc.page_count()
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[must_use]
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    #[must_use]
    pub fn pending(&self) -> &PendingEdits {
        &self.pending
    }

    #[must_use]
    pub fn font_size_pt(&self) -> f32 {
        self.font_size_pt
    }

    /// Live drag-selection rectangle, if a selection gesture is in flight
    #[must_use]
    pub fn live_selection(&self) -> Option<ScreenRect> {
        match self.drag {
            Some(Drag::Selecting { anchor, current }) => {
                Some(ScreenRect::from_corners(anchor, current))
            }
            _ => None,
        }
    }

    /// Toggle a mode on, or back to normal when it is already active.
    /// Any in-flight gesture is abandoned.
    pub fn toggle_mode(&mut self, mode: InteractionMode) -> Vec<Effect> {
        self.drag = None;
        self.mode = if self.mode == mode {
            InteractionMode::Normal
        } else {
            mode
        };
        vec![Effect::Rerender]
    }

    /// Move to the previous or next page. Pending edits are applied to the
    /// page being left first, so they are never silently lost; a no-op at
    /// the first/last page.
    pub fn navigate(&mut self, direction: Direction) -> Result<Vec<Effect>, PdfError> {
        let target = match direction {
            Direction::Previous => self.page_index.checked_sub(1),
            Direction::Next => {
                let next = self.page_index + 1;
                (next < self.doc.page_count()).then_some(next)
            }
        };
        let Some(target) = target else {
            return Ok(Vec::new());
        };

        if !self.pending.is_empty() {
            self.apply_pending()?;
        }
        self.page_index = target;
        self.drag = None;
        debug!("moved to page {}", target);
        Ok(vec![Effect::Rerender])
    }

    /// Change the zoom factor, keeping every pending edit aligned with the
    /// re-rendered bitmap. Out-of-bounds values are rejected.
    pub fn set_scale(&mut self, new_scale: f32) -> Vec<Effect> {
        if !new_scale.is_finite() || !(MIN_SCALE..=MAX_SCALE).contains(&new_scale) {
            return Vec::new();
        }
        if (new_scale - self.scale).abs() < f32::EPSILON {
            return Vec::new();
        }

        self.pending.rescale(new_scale / self.scale);
        self.drag = None;
        self.scale = new_scale;
        vec![Effect::Rerender]
    }

    pub fn zoom_in(&mut self) -> Vec<Effect> {
        self.set_scale(self.scale + SCALE_STEP)
    }

    pub fn zoom_out(&mut self) -> Vec<Effect> {
        self.set_scale(self.scale - SCALE_STEP)
    }

    /// Start a drag-selection gesture (normal mode only)
    pub fn begin_selection(&mut self, p: ScreenPoint) -> Vec<Effect> {
        if self.mode != InteractionMode::Normal {
            return Vec::new();
        }
        self.drag = Some(Drag::Selecting {
            anchor: p,
            current: p,
        });
        vec![Effect::Rerender]
    }

    pub fn update_selection(&mut self, p: ScreenPoint) -> Vec<Effect> {
        match &mut self.drag {
            Some(Drag::Selecting { current, .. }) => {
                *current = p;
                vec![Effect::Rerender]
            }
            _ => Vec::new(),
        }
    }

    /// Finish the gesture: normalize min/max per axis and record the
    /// erasure. Sub-pixel selections are discarded as stray clicks.
    pub fn end_selection(&mut self, p: ScreenPoint) -> Vec<Effect> {
        let Some(Drag::Selecting { anchor, .. }) = self.drag.take() else {
            return Vec::new();
        };
        let rect = ScreenRect::from_corners(anchor, p);
        if rect.width() < MIN_SELECTION_PX && rect.height() < MIN_SELECTION_PX {
            return vec![Effect::Rerender];
        }
        self.pending.push_erasure(rect);
        vec![Effect::Rerender]
    }

    /// Left click in add-text mode: edit the font size of the annotation
    /// under the pointer, or ask for content for a new one.
    pub fn add_or_edit_text(&mut self, p: ScreenPoint) -> Vec<Effect> {
        if self.mode != InteractionMode::AddText {
            return Vec::new();
        }
        match self.pending.hit_test(p) {
            Some(id) => vec![Effect::PromptFontSize { id }],
            None => vec![Effect::PromptText { at: p }],
        }
    }

    /// Complete a text prompt: record a new annotation at the prompt's
    /// anchor with the current default font size.
    pub fn commit_new_text(&mut self, at: ScreenPoint, text: String) -> Vec<Effect> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.pending
            .add_text(at, text, self.font_size_pt * self.scale);
        vec![Effect::Rerender]
    }

    /// Complete a font-size prompt for one annotation
    pub fn commit_font_size(&mut self, id: AnnotationId, size_pt: f32) -> Vec<Effect> {
        if !size_pt.is_finite() || size_pt <= 0.0 {
            return vec![Effect::Error(format!("Invalid font size: {size_pt}"))];
        }
        let scale = self.scale;
        match self.pending.text_mut(id) {
            Some(text) => {
                text.font_size = size_pt * scale;
                vec![Effect::Rerender]
            }
            None => Vec::new(),
        }
    }

    /// Left click in remove-text mode: delete the annotation under the
    /// pointer; no-op on a miss.
    pub fn remove_text(&mut self, p: ScreenPoint) -> Vec<Effect> {
        if self.mode != InteractionMode::RemoveText {
            return Vec::new();
        }
        match self.pending.hit_test(p) {
            Some(id) => {
                self.pending.remove_text(id);
                vec![Effect::Rerender]
            }
            None => Vec::new(),
        }
    }

    /// Right press: pick up the annotation under the pointer, remembering
    /// the offset between the press point and its anchor.
    pub fn begin_text_drag(&mut self, p: ScreenPoint) -> Vec<Effect> {
        let Some(id) = self.pending.hit_test(p) else {
            return Vec::new();
        };
        let anchor = self
            .pending
            .text(id)
            .map(|t| t.anchor)
            .unwrap_or_default();
        self.drag = Some(Drag::MovingText {
            id,
            offset: (p.x - anchor.x, p.y - anchor.y),
        });
        vec![Effect::Rerender]
    }

    pub fn update_text_drag(&mut self, p: ScreenPoint) -> Vec<Effect> {
        let Some(Drag::MovingText { id, offset }) = self.drag else {
            return Vec::new();
        };
        match self.pending.text_mut(id) {
            Some(text) => {
                text.anchor = ScreenPoint::new(p.x - offset.0, p.y - offset.1);
                vec![Effect::Rerender]
            }
            None => Vec::new(),
        }
    }

    pub fn end_text_drag(&mut self) -> Vec<Effect> {
        match self.drag.take() {
            Some(Drag::MovingText { .. }) => vec![Effect::Rerender],
            other => {
                self.drag = other;
                Vec::new()
            }
        }
    }

    /// Commit every pending edit into the current page (permanent, not
    /// undoable). Reports when there is nothing to do.
    pub fn apply(&mut self) -> Result<Vec<Effect>, PdfError> {
        if self.pending.is_empty() {
            return Ok(vec![Effect::Info("No pending edits to apply".to_string())]);
        }
        self.apply_pending()?;
        Ok(vec![Effect::Rerender])
    }

    /// Apply all pending edits, then persist the document
    pub fn save(&mut self, path: &Path) -> Result<Vec<Effect>, PdfError> {
        let had_pending = !self.pending.is_empty();
        if had_pending {
            self.apply_pending()?;
        }
        self.doc.save(path)?;
        info!("saved to {}", path.display());

        let mut effects = Vec::new();
        if had_pending {
            effects.push(Effect::Rerender);
        }
        effects.push(Effect::Info(format!("Saved to {}", path.display())));
        Ok(effects)
    }

    /// Drop the most recently added pending erasure
    pub fn undo_last(&mut self) -> Vec<Effect> {
        if self.pending.undo_last_erasure() {
            vec![Effect::Rerender]
        } else {
            Vec::new()
        }
    }

    /// Drop every pending erasure and annotation
    pub fn undo_all(&mut self) -> Vec<Effect> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        self.pending.clear();
        vec![Effect::Rerender]
    }

    /// Advance the default font size for new annotations
    pub fn cycle_font_size(&mut self) -> Vec<Effect> {
        let idx = FONT_SIZES
            .iter()
            .position(|&s| (s - self.font_size_pt).abs() < f32::EPSILON)
            .unwrap_or(0);
        self.font_size_pt = FONT_SIZES[(idx + 1) % FONT_SIZES.len()];
        vec![Effect::Info(format!(
            "Font size: {:.0}pt",
            self.font_size_pt
        ))]
    }

    /// Convert pending edits to document space and draw them into the
    /// current page. Pending lists are cleared only after every edit
    /// committed, so a backend failure leaves them intact for retry.
    fn apply_pending(&mut self) -> Result<(), PdfError> {
        let Self {
            doc,
            pending,
            page_index,
            scale,
            ..
        } = self;

        for erasure in pending.erasures() {
            doc.whiteout(*page_index, erasure.rect.to_doc(*scale))?;
        }
        for text in pending.texts() {
            doc.insert_text(
                *page_index,
                text.anchor.to_doc(*scale),
                &text.text,
                text.font_size / *scale,
            )?;
        }

        debug!(
            "applied {} erasures, {} annotations to page {}",
            pending.erasures().len(),
            pending.texts().len(),
            page_index
        );
        pending.clear();
        Ok(())
    }
}
