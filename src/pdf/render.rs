//! Rasterized page buffers and pending-edit overlays
//!
//! The page bitmap comes out of mupdf as an RGB buffer; overlay outlines
//! for pending erasures and annotation hit boxes are painted straight into
//! the pixels before the buffer is handed to the terminal image protocol.

use mupdf::Pixmap;

use super::PdfError;
use crate::edits::PendingEdits;
use crate::geom::ScreenRect;

/// Outline color for pending erasure rectangles
pub const ERASURE_RGB: (u8, u8, u8) = (0xE0, 0x40, 0x40);
/// Outline color for pending text annotation boxes
pub const TEXT_BOX_RGB: (u8, u8, u8) = (0x40, 0x60, 0xE0);

const OUTLINE_THICKNESS: u32 = 2;

/// Raw rendered page image (3 bytes per pixel: R, G, B)
#[derive(Clone)]
pub struct ImageData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageData {
    #[must_use]
    pub fn into_image(self) -> image::DynamicImage {
        let buffer = image::RgbImage::from_raw(self.width, self.height, self.pixels)
            .expect("pixel buffer matches dimensions");
        image::DynamicImage::ImageRgb8(buffer)
    }

    fn put(&mut self, x: u32, y: u32, rgb: (u8, u8, u8)) {
        let idx = ((y * self.width + x) * 3) as usize;
        self.pixels[idx] = rgb.0;
        self.pixels[idx + 1] = rgb.1;
        self.pixels[idx + 2] = rgb.2;
    }
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Convert a mupdf pixmap to a tightly packed RGB buffer
pub fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<ImageData, PdfError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(PdfError::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(PdfError::generic("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(ImageData {
        pixels: out,
        width: width as u32,
        height: height as u32,
    })
}

/// Paint overlays for every pending edit, plus the live drag rectangle
pub fn paint_overlays(img: &mut ImageData, edits: &PendingEdits, live: Option<ScreenRect>) {
    for erasure in edits.erasures() {
        paint_outline(img, erasure.rect, ERASURE_RGB);
    }
    for text in edits.texts() {
        paint_outline(img, text.bounding_box(), TEXT_BOX_RGB);
    }
    if let Some(rect) = live {
        paint_outline(img, rect, ERASURE_RGB);
    }
}

/// Draw a rectangle outline into the buffer, clamped to the image bounds
pub fn paint_outline(img: &mut ImageData, rect: ScreenRect, rgb: (u8, u8, u8)) {
    if img.width == 0 || img.height == 0 {
        return;
    }

    let x0 = (rect.x0.max(0.0) as u32).min(img.width - 1);
    let y0 = (rect.y0.max(0.0) as u32).min(img.height - 1);
    let x1 = (rect.x1.max(0.0) as u32).min(img.width - 1);
    let y1 = (rect.y1.max(0.0) as u32).min(img.height - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }

    for t in 0..OUTLINE_THICKNESS {
        let top = (y0 + t).min(y1);
        let bottom = y1.saturating_sub(t).max(y0);
        for x in x0..=x1 {
            img.put(x, top, rgb);
            img.put(x, bottom, rgb);
        }

        let left = (x0 + t).min(x1);
        let right = x1.saturating_sub(t).max(x0);
        for y in y0..=y1 {
            img.put(left, y, rgb);
            img.put(right, y, rgb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::ScreenPoint;

    fn blank(width: u32, height: u32) -> ImageData {
        ImageData {
            pixels: vec![0xFF; (width * height * 3) as usize],
            width,
            height,
        }
    }

    fn pixel(img: &ImageData, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = ((y * img.width + x) * 3) as usize;
        (img.pixels[idx], img.pixels[idx + 1], img.pixels[idx + 2])
    }

    #[test]
    fn outline_touches_edges_but_not_center() {
        let mut img = blank(20, 20);
        paint_outline(&mut img, ScreenRect::new(2.0, 2.0, 17.0, 17.0), ERASURE_RGB);

        assert_eq!(pixel(&img, 2, 2), ERASURE_RGB);
        assert_eq!(pixel(&img, 17, 17), ERASURE_RGB);
        assert_eq!(pixel(&img, 10, 2), ERASURE_RGB);
        assert_eq!(pixel(&img, 2, 10), ERASURE_RGB);
        // Interior stays untouched.
        assert_eq!(pixel(&img, 10, 10), (0xFF, 0xFF, 0xFF));
    }

    #[test]
    fn outline_clamps_out_of_bounds_rect() {
        let mut img = blank(10, 10);
        paint_outline(
            &mut img,
            ScreenRect::new(-5.0, -5.0, 50.0, 50.0),
            ERASURE_RGB,
        );
        assert_eq!(pixel(&img, 0, 0), ERASURE_RGB);
        assert_eq!(pixel(&img, 9, 9), ERASURE_RGB);
    }

    #[test]
    fn overlays_cover_pending_edits_and_live_rect() {
        let mut img = blank(100, 100);
        let mut edits = PendingEdits::new();
        edits.push_erasure(ScreenRect::new(5.0, 5.0, 20.0, 20.0));
        edits.add_text(ScreenPoint::new(40.0, 60.0), "x".to_string(), 10.0);

        paint_overlays(&mut img, &edits, Some(ScreenRect::new(70.0, 70.0, 90.0, 90.0)));

        assert_eq!(pixel(&img, 5, 5), ERASURE_RGB);
        assert_eq!(pixel(&img, 70, 70), ERASURE_RGB);
        // Annotation box: top edge sits one ascent above the anchor.
        assert_eq!(pixel(&img, 40, 51), TEXT_BOX_RGB);
    }
}
