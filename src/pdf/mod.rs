//! PDF backend: document ownership, page mutation, rasterization

mod document;
mod render;

pub use document::{DocumentBackend, PdfDocument};
pub use render::{paint_overlays, pixmap_to_rgb, ImageData, ERASURE_RGB, TEXT_BOX_RGB};

/// Errors from the PDF backend
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("PDF engine: {0}")]
    Engine(#[from] mupdf::error::Error),

    #[error("PDF structure: {0}")]
    Structure(#[from] lopdf::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("{detail}")]
    Generic { detail: String },
}

impl PdfError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}
