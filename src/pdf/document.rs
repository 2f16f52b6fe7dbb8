//! Document ownership and page mutation
//!
//! `lopdf` owns the authoritative in-memory document and takes all
//! mutations (whiteout rectangles, text insertion, save). `mupdf` holds a
//! render handle parsed from the serialized bytes; the handle goes stale
//! whenever page content changes and is rebuilt lazily before the next
//! rasterization.
//!
//! Document-space coordinates arrive with a top-left origin (matching the
//! rendered bitmap); PDF content streams use a bottom-left origin, so the
//! y axis is flipped against the page's MediaBox here and nowhere else.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use mupdf::{Colorspace, Matrix};

use super::render::{pixmap_to_rgb, ImageData};
use super::PdfError;
use crate::geom::{DocPoint, DocRect};

/// Resource name under which the annotation font is registered on a page
const FONT_KEY: &[u8] = b"FwoHelv";

/// Mutating operations the edit session needs from a document.
///
/// Split out as a trait so session logic can be exercised against a
/// recording fake without touching the PDF engines.
pub trait DocumentBackend {
    fn page_count(&self) -> usize;

    /// Draw a permanent opaque white filled rectangle onto a page
    fn whiteout(&mut self, page: usize, rect: DocRect) -> Result<(), PdfError>;

    /// Insert text onto a page, baseline-left anchored at `at`
    fn insert_text(
        &mut self,
        page: usize,
        at: DocPoint,
        text: &str,
        font_size: f32,
    ) -> Result<(), PdfError>;

    /// Persist the document (including all committed edits)
    fn save(&mut self, path: &Path) -> Result<(), PdfError>;
}

/// An open PDF document
pub struct PdfDocument {
    raw: lopdf::Document,
    engine: mupdf::Document,
    page_ids: Vec<ObjectId>,
    /// Normalized MediaBox per page: `[x0, y0, x1, y1]`, corners ordered
    page_boxes: Vec<[f32; 4]>,
    helvetica: Option<ObjectId>,
    stale_engine: bool,
}

impl PdfDocument {
    /// Load a document from disk.
    ///
    /// Fails when the path is unreadable or not parseable as a PDF; the
    /// caller's existing state is unaffected.
    pub fn open(path: &Path) -> Result<Self, PdfError> {
        let raw = lopdf::Document::load(path)?;
        Self::from_raw(raw)
    }

    pub(crate) fn from_raw(raw: lopdf::Document) -> Result<Self, PdfError> {
        let page_ids: Vec<ObjectId> = raw.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PdfError::generic("document has no pages"));
        }

        let mut page_boxes = Vec::with_capacity(page_ids.len());
        for &id in &page_ids {
            page_boxes.push(media_box(&raw, id)?);
        }

        let engine = engine_from(&raw)?;

        Ok(Self {
            raw,
            engine,
            page_ids,
            page_boxes,
            helvetica: None,
            stale_engine: false,
        })
    }

    /// Page size in PDF points
    #[must_use]
    pub fn page_size(&self, page: usize) -> Option<(f32, f32)> {
        self.page_boxes
            .get(page)
            .map(|b| (b[2] - b[0], b[3] - b[1]))
    }

    /// Rasterize one page at a scale factor to an RGB buffer
    pub fn render_page(&mut self, page: usize, scale: f32) -> Result<ImageData, PdfError> {
        self.refresh_engine()?;
        let p = self.engine.load_page(page as i32)?;
        let matrix = Matrix::new_scale(scale, scale);
        let pixmap = p.to_pixmap(&matrix, &Colorspace::device_rgb(), false, false)?;
        pixmap_to_rgb(&pixmap)
    }

    fn refresh_engine(&mut self) -> Result<(), PdfError> {
        if self.stale_engine {
            self.engine = engine_from(&self.raw)?;
            self.stale_engine = false;
        }
        Ok(())
    }

    fn page_id(&self, page: usize) -> Result<ObjectId, PdfError> {
        self.page_ids
            .get(page)
            .copied()
            .ok_or_else(|| PdfError::generic(format!("page {page} out of range")))
    }

    fn page_box(&self, page: usize) -> Result<[f32; 4], PdfError> {
        self.page_boxes
            .get(page)
            .copied()
            .ok_or_else(|| PdfError::generic(format!("page {page} out of range")))
    }

    /// Append a self-contained content stream to a page
    fn append_content(&mut self, page: usize, content: Content) -> Result<(), PdfError> {
        let page_id = self.page_id(page)?;
        let encoded = content.encode()?;
        let stream_id = self
            .raw
            .add_object(Object::Stream(Stream::new(Dictionary::new(), encoded)));

        let existing = {
            let dict = self.raw.get_object(page_id)?.as_dict()?;
            dict.get(b"Contents").ok().cloned()
        };

        let replacement = match existing {
            Some(Object::Reference(id)) => {
                // The reference resolves either to one stream or to an
                // array of streams.
                match self.raw.get_object_mut(id).and_then(Object::as_array_mut) {
                    Ok(array) => {
                        array.push(Object::Reference(stream_id));
                        None
                    }
                    Err(_) => Some(Object::Array(vec![
                        Object::Reference(id),
                        Object::Reference(stream_id),
                    ])),
                }
            }
            Some(Object::Array(mut array)) => {
                array.push(Object::Reference(stream_id));
                Some(Object::Array(array))
            }
            _ => Some(Object::Reference(stream_id)),
        };

        if let Some(value) = replacement {
            let dict = self.raw.get_object_mut(page_id)?.as_dict_mut()?;
            dict.set("Contents", value);
        }

        self.stale_engine = true;
        Ok(())
    }

    /// Register the annotation font on a page's own Resources dict.
    ///
    /// Pages relying on inherited Resources get the inherited dict cloned
    /// onto the page first so existing content keeps resolving.
    fn ensure_font(&mut self, page: usize) -> Result<(), PdfError> {
        let page_id = self.page_id(page)?;

        let font_id = match self.helvetica {
            Some(id) => id,
            None => {
                let id = self.raw.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                self.helvetica = Some(id);
                id
            }
        };

        let own = {
            let dict = self.raw.get_object(page_id)?.as_dict()?;
            dict.get(b"Resources").ok().cloned()
        };
        let mut resources = match own {
            Some(Object::Reference(id)) => self.raw.get_object(id)?.as_dict()?.clone(),
            Some(Object::Dictionary(dict)) => dict,
            _ => self.inherited_resources(page_id)?,
        };

        let mut fonts = match resources.get(b"Font").ok().cloned() {
            Some(Object::Reference(id)) => self.raw.get_object(id)?.as_dict()?.clone(),
            Some(Object::Dictionary(dict)) => dict,
            _ => Dictionary::new(),
        };
        fonts.set(FONT_KEY, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        let dict = self.raw.get_object_mut(page_id)?.as_dict_mut()?;
        dict.set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    fn inherited_resources(&self, page_id: ObjectId) -> Result<Dictionary, PdfError> {
        let mut current = page_id;
        loop {
            let dict = self.raw.get_object(current)?.as_dict()?;
            if let Ok(obj) = dict.get(b"Resources") {
                return Ok(match obj {
                    Object::Reference(id) => self.raw.get_object(*id)?.as_dict()?.clone(),
                    other => other.as_dict()?.clone(),
                });
            }
            match dict.get(b"Parent") {
                Ok(parent) => current = parent.as_reference()?,
                Err(_) => return Ok(Dictionary::new()),
            }
        }
    }
}

impl DocumentBackend for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn whiteout(&mut self, page: usize, rect: DocRect) -> Result<(), PdfError> {
        let [mx0, _, _, my1] = self.page_box(page)?;
        let x = mx0 + rect.x0;
        let y = my1 - rect.y1;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "rg",
                    vec![Object::Real(1.0), Object::Real(1.0), Object::Real(1.0)],
                ),
                Operation::new(
                    "re",
                    vec![
                        Object::Real(x),
                        Object::Real(y),
                        Object::Real(rect.width()),
                        Object::Real(rect.height()),
                    ],
                ),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        self.append_content(page, content)
    }

    fn insert_text(
        &mut self,
        page: usize,
        at: DocPoint,
        text: &str,
        font_size: f32,
    ) -> Result<(), PdfError> {
        let line = single_line(text);
        if line.is_empty() {
            return Ok(());
        }

        self.ensure_font(page)?;
        let [mx0, _, _, my1] = self.page_box(page)?;
        let x = mx0 + at.x;
        let y = my1 - at.y;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(FONT_KEY.to_vec()), Object::Real(font_size)],
                ),
                Operation::new(
                    "rg",
                    vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
                ),
                Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        to_win_ansi(&line),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        self.append_content(page, content)
    }

    fn save(&mut self, path: &Path) -> Result<(), PdfError> {
        self.raw.save(path)?;
        Ok(())
    }
}

fn engine_from(raw: &lopdf::Document) -> Result<mupdf::Document, PdfError> {
    let mut bytes = Vec::new();
    let mut copy = raw.clone();
    copy.save_to(&mut bytes)?;
    Ok(mupdf::Document::from_bytes(&bytes, "pdf")?)
}

/// Resolve a page's MediaBox, climbing the Parent chain for inherited
/// values, and return it with corners normalized.
fn media_box(raw: &lopdf::Document, page_id: ObjectId) -> Result<[f32; 4], PdfError> {
    let mut current = page_id;
    loop {
        let dict = raw.get_object(current)?.as_dict()?;
        if let Ok(obj) = dict.get(b"MediaBox") {
            let array = match obj {
                Object::Reference(id) => raw.get_object(*id)?.as_array()?,
                other => other.as_array()?,
            };
            if array.len() != 4 {
                return Err(PdfError::generic("malformed MediaBox"));
            }
            let mut vals = [0.0f32; 4];
            for (slot, obj) in vals.iter_mut().zip(array) {
                *slot = number(obj).ok_or_else(|| PdfError::generic("malformed MediaBox"))?;
            }
            return Ok([
                vals[0].min(vals[2]),
                vals[1].min(vals[3]),
                vals[0].max(vals[2]),
                vals[1].max(vals[3]),
            ]);
        }
        match dict.get(b"Parent") {
            Ok(parent) => current = parent.as_reference()?,
            Err(_) => return Err(PdfError::generic("page has no MediaBox")),
        }
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Collapse the annotation text onto one line
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Latin-1 bytes double as WinAnsi codepoints for everything the tool
/// inserts; anything outside that range degrades to '?'.
fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One-page document in the shape lopdf's own examples build:
    /// MediaBox and Resources inherited from the Pages node.
    fn single_page_raw() -> lopdf::Document {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Real(24.0)],
                ),
                Operation::new("Td", vec![Object::Real(100.0), Object::Real(600.0)]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal("Hello")],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            content.encode().unwrap(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// Decode the content stream appended most recently to a page
    fn last_appended(doc: &PdfDocument, page: usize) -> Content {
        let page_id = doc.page_ids[page];
        let dict = doc.raw.get_object(page_id).unwrap().as_dict().unwrap();
        let contents = dict.get(b"Contents").unwrap();
        let array = contents.as_array().expect("append turns Contents into an array");
        let last = array.last().unwrap().as_reference().unwrap();
        match doc.raw.get_object(last).unwrap() {
            Object::Stream(stream) => Content::decode(&stream.content).unwrap(),
            other => panic!("expected stream, got {other:?}"),
        }
    }

    fn operand(op: &Operation, idx: usize) -> f32 {
        number(&op.operands[idx]).unwrap()
    }

    #[test]
    fn open_resolves_inherited_media_box() {
        let doc = PdfDocument::from_raw(single_page_raw()).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page_size(0), Some((612.0, 792.0)));
    }

    #[test]
    fn whiteout_flips_to_bottom_left_origin() {
        let mut doc = PdfDocument::from_raw(single_page_raw()).unwrap();
        doc.whiteout(
            0,
            DocRect {
                x0: 0.0,
                y0: 0.0,
                x1: 10.0,
                y1: 10.0,
            },
        )
        .unwrap();

        let content = last_appended(&doc, 0);
        let re = content
            .operations
            .iter()
            .find(|op| op.operator == "re")
            .expect("whiteout emits a rectangle op");
        // Top-left (0,0)-(10,10) on a 792pt-high page lands at y=782.
        assert_eq!(operand(re, 0), 0.0);
        assert_eq!(operand(re, 1), 782.0);
        assert_eq!(operand(re, 2), 10.0);
        assert_eq!(operand(re, 3), 10.0);

        let fill = content.operations.iter().find(|op| op.operator == "f");
        assert!(fill.is_some(), "whiteout emits a fill op");
    }

    #[test]
    fn whiteout_out_of_range_page_errors() {
        let mut doc = PdfDocument::from_raw(single_page_raw()).unwrap();
        let result = doc.whiteout(
            5,
            DocRect {
                x0: 0.0,
                y0: 0.0,
                x1: 1.0,
                y1: 1.0,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn insert_text_registers_font_and_shows_text() {
        let mut doc = PdfDocument::from_raw(single_page_raw()).unwrap();
        doc.insert_text(0, DocPoint { x: 30.0, y: 40.0 }, "Hi there", 12.0)
            .unwrap();

        // Font resource lands on the page's own Resources dict, with the
        // inherited font still present.
        let page_id = doc.page_ids[0];
        let page = doc.raw.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(FONT_KEY));
        assert!(fonts.has(b"F1"));

        let content = last_appended(&doc, 0);
        let td = content
            .operations
            .iter()
            .find(|op| op.operator == "Td")
            .unwrap();
        assert_eq!(operand(td, 0), 30.0);
        assert_eq!(operand(td, 1), 752.0);

        let tj = content
            .operations
            .iter()
            .find(|op| op.operator == "Tj")
            .unwrap();
        match &tj.operands[0] {
            Object::String(bytes, _) => assert_eq!(bytes, b"Hi there"),
            other => panic!("expected string operand, got {other:?}"),
        }
    }

    #[test]
    fn insert_text_skips_empty_input() {
        let mut doc = PdfDocument::from_raw(single_page_raw()).unwrap();
        doc.insert_text(0, DocPoint { x: 0.0, y: 0.0 }, "   \n ", 12.0)
            .unwrap();

        let page_id = doc.page_ids[0];
        let dict = doc.raw.get_object(page_id).unwrap().as_dict().unwrap();
        // Contents untouched: still the original single reference.
        assert!(dict.get(b"Contents").unwrap().as_reference().is_ok());
    }

    #[test]
    fn non_latin1_degrades_instead_of_corrupting() {
        assert_eq!(to_win_ansi("a\u{00e9}\u{4e16}b"), b"a\xe9?b".to_vec());
    }

    #[test]
    fn save_roundtrips_through_lopdf() {
        let mut doc = PdfDocument::from_raw(single_page_raw()).unwrap();
        doc.whiteout(
            0,
            DocRect {
                x0: 5.0,
                y0: 5.0,
                x1: 50.0,
                y1: 25.0,
            },
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        doc.save(&path).unwrap();

        let reloaded = lopdf::Document::load(&path).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }

    #[test]
    fn render_page_reflects_committed_whiteout() {
        let mut doc = PdfDocument::from_raw(single_page_raw()).unwrap();
        let before = doc.render_page(0, 1.0).unwrap();
        assert_eq!(before.width, 612);
        assert_eq!(before.height, 792);

        // Cover the whole page; every pixel comes back white.
        doc.whiteout(
            0,
            DocRect {
                x0: 0.0,
                y0: 0.0,
                x1: 612.0,
                y1: 792.0,
            },
        )
        .unwrap();
        let after = doc.render_page(0, 1.0).unwrap();
        assert!(after.pixels.iter().all(|&b| b == 0xFF));
    }
}
