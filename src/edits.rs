//! Pending, unapplied page edits
//!
//! Erasures and text annotations live here in screen-space coordinates
//! until they are committed into the page content or undone. Annotations
//! carry a stable identifier so selection and drag state can refer to a
//! record independently of how it is presented.

use crate::geom::{ScreenPoint, ScreenRect};

/// Approximate Helvetica metrics, in fractions of the font size. Used only
/// for on-screen hit targets; the PDF engine does the real text layout.
const GLYPH_ADVANCE: f32 = 0.6;
const ASCENT: f32 = 0.9;
const DESCENT: f32 = 0.25;

/// Stable identifier for a pending text annotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnnotationId(u64);

/// A pending whiteout rectangle, screen-space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Erasure {
    pub rect: ScreenRect,
}

/// A pending text insertion, screen-space
///
/// `anchor` is the baseline-left point of the first glyph, matching where
/// the text lands in the page once applied. `font_size` is expressed at the
/// current zoom so the overlay stays aligned with the rendered bitmap.
#[derive(Clone, Debug, PartialEq)]
pub struct TextAnnotation {
    pub id: AnnotationId,
    pub anchor: ScreenPoint,
    pub text: String,
    pub font_size: f32,
}

impl TextAnnotation {
    /// Rendered bounding box used for hit-testing
    #[must_use]
    pub fn bounding_box(&self) -> ScreenRect {
        let width = (self.text.chars().count().max(1) as f32) * self.font_size * GLYPH_ADVANCE;
        ScreenRect::new(
            self.anchor.x,
            self.anchor.y - self.font_size * ASCENT,
            self.anchor.x + width,
            self.anchor.y + self.font_size * DESCENT,
        )
    }
}

/// All pending edits for the current page
#[derive(Debug, Default)]
pub struct PendingEdits {
    erasures: Vec<Erasure>,
    texts: Vec<TextAnnotation>,
    next_id: u64,
}

impl PendingEdits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.erasures.is_empty() && self.texts.is_empty()
    }

    #[must_use]
    pub fn erasures(&self) -> &[Erasure] {
        &self.erasures
    }

    #[must_use]
    pub fn texts(&self) -> &[TextAnnotation] {
        &self.texts
    }

    pub fn push_erasure(&mut self, rect: ScreenRect) {
        self.erasures.push(Erasure { rect });
    }

    pub fn add_text(
        &mut self,
        anchor: ScreenPoint,
        text: String,
        font_size: f32,
    ) -> AnnotationId {
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        self.texts.push(TextAnnotation {
            id,
            anchor,
            text,
            font_size,
        });
        id
    }

    #[must_use]
    pub fn text(&self, id: AnnotationId) -> Option<&TextAnnotation> {
        self.texts.iter().find(|t| t.id == id)
    }

    pub fn text_mut(&mut self, id: AnnotationId) -> Option<&mut TextAnnotation> {
        self.texts.iter_mut().find(|t| t.id == id)
    }

    /// Topmost annotation whose bounding box contains the point
    #[must_use]
    pub fn hit_test(&self, p: ScreenPoint) -> Option<AnnotationId> {
        self.texts
            .iter()
            .rev()
            .find(|t| t.bounding_box().contains(p))
            .map(|t| t.id)
    }

    /// Remove one annotation; returns whether it existed
    pub fn remove_text(&mut self, id: AnnotationId) -> bool {
        let before = self.texts.len();
        self.texts.retain(|t| t.id != id);
        self.texts.len() != before
    }

    /// Drop the most recently added erasure; no-op on an empty list
    pub fn undo_last_erasure(&mut self) -> bool {
        self.erasures.pop().is_some()
    }

    /// Drop every pending erasure and annotation
    pub fn clear(&mut self) {
        self.erasures.clear();
        self.texts.clear();
    }

    /// Rescale every pending coordinate (and annotation font size) by
    /// `factor = new_scale / old_scale` so edits stay aligned with the
    /// re-rendered bitmap.
    pub fn rescale(&mut self, factor: f32) {
        for e in &mut self.erasures {
            e.rect = e.rect.scaled(factor);
        }
        for t in &mut self.texts {
            t.anchor = t.anchor.scaled(factor);
            t.font_size *= factor;
        }
    }
}
