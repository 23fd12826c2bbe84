//! MuPDF-backed engine
//!
//! Annotations are read and written as raw `/Annots` dictionaries through
//! the PDF object API; appearance streams are regenerated by MuPDF when an
//! operation commits.
//!
//! # Design
//!
//! MuPDF documents are not thread-safe. The engine keeps the serialized PDF
//! bytes and opens a document per operation:
//!
//! 1. `begin_operation` opens a fresh document from the bytes
//! 2. Every call in the operation reads and edits that one document
//! 3. `end_operation` regenerates appearances on the pages it touched and
//!    serializes the document back, once
//!
//! Calls made outside an operation open a document of their own.
//!
//! Native space is PDF user space passed through MuPDF's page transform and
//! flipped to a bottom-left origin, so rotated pages and offset media boxes
//! line up with the page's text.
//!
//! An [`AnnotRef`] is the annotation's position in the page's `/Annots`
//! array, which stays stable until the next mutation of that array.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use mupdf::pdf::{PdfDocument, PdfObject, PdfPage};
use mupdf::{Matrix, Rect, TextPageOptions};

use super::{AnnotKind, AnnotRef, AnnotationEngine, EngineError, EngineResult, TextIndex, TextSpan};
use crate::color::ColorSample;
use crate::geometry::{NativeRect, Point, Quad};

/// Print flag; annotations without it are hidden when printing
const ANNOT_FLAG_PRINT: i32 = 4;

impl From<mupdf::Error> for EngineError {
    fn from(err: mupdf::Error) -> Self {
        EngineError::Fault(err.to_string())
    }
}

/// Affine map from PDF user space to native space
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageFrame {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    /// MuPDF page-space left edge
    left: f64,
    /// MuPDF page-space bottom edge (page space grows downward)
    bottom: f64,
}

impl PageFrame {
    /// Compose the page transform with a flip about the page bounds
    fn new(ctm: &Matrix, bounds: &Rect) -> Self {
        let (left, bottom) = (bounds.x0 as f64, bounds.y1 as f64);
        let frame = Self {
            a: ctm.a as f64,
            b: -(ctm.b as f64),
            c: ctm.c as f64,
            d: -(ctm.d as f64),
            e: ctm.e as f64 - left,
            f: bottom - ctm.f as f64,
            left,
            bottom,
        };
        if frame.determinant().abs() < f64::EPSILON {
            // degenerate transform; fall back to raw user space
            return Self {
                a: 1.0,
                b: 0.0,
                c: 0.0,
                d: 1.0,
                e: 0.0,
                f: 0.0,
                ..frame
            };
        }
        frame
    }

    fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    fn native_point(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    fn user_point(&self, p: Point) -> Point {
        let (x, y) = (p.x - self.e, p.y - self.f);
        let det = self.determinant();
        Point::new((self.d * x - self.c * y) / det, (self.a * y - self.b * x) / det)
    }

    /// MuPDF page-space position (text) in native space
    fn page_point(&self, x: f32, y: f32) -> Point {
        Point::new(x as f64 - self.left, self.bottom - y as f64)
    }

    fn quad_to_native(&self, q: &Quad) -> Quad {
        Quad::new(
            self.native_point(q.ul),
            self.native_point(q.ur),
            self.native_point(q.ll),
            self.native_point(q.lr),
        )
    }

    fn quad_to_user(&self, q: &Quad) -> Quad {
        Quad::new(
            self.user_point(q.ul),
            self.user_point(q.ur),
            self.user_point(q.ll),
            self.user_point(q.lr),
        )
    }

    fn rect_to_native(&self, rect: &NativeRect) -> NativeRect {
        self.quad_to_native(&Quad::from_rect(rect)).bounds()
    }

    fn rect_to_user(&self, rect: &NativeRect) -> NativeRect {
        self.quad_to_user(&Quad::from_rect(rect)).bounds()
    }
}

#[derive(Debug, Clone, Copy)]
struct LoadedPage {
    bounds: NativeRect,
    frame: PageFrame,
}

#[derive(Debug, Default)]
struct PageState {
    loaded: Option<LoadedPage>,
    text_index: Option<TextIndex>,
}

/// Document opened for the current operation
struct Session {
    doc: PdfDocument,
    /// Pages whose annotations were edited
    touched: BTreeSet<u32>,
}

/// PDF document engine over MuPDF
pub struct MupdfEngine {
    data: Vec<u8>,
    pages: Vec<PageState>,
    session: Option<Session>,
}

// SAFETY: MupdfEngine is Send because:
//
// 1. `data` and `pages` are owned plain Rust values.
//
// 2. The only MuPDF handle, the session document, is created by
//    `begin_operation` and dropped by `end_operation`. Annotation
//    operations run both while holding the owning `Document`'s mutex, whose
//    guard cannot leave the thread, so the handle is never used from two
//    threads at once.
//
// 3. The binding gives each thread a context cloned from one base context,
//    and MuPDF allows a document to be used from any clone as long as
//    access is serialized.
unsafe impl Send for MupdfEngine {}

impl MupdfEngine {
    /// Open a PDF from owned bytes
    pub fn from_bytes(data: Vec<u8>) -> EngineResult<Self> {
        let doc = PdfDocument::from_bytes(&data)?;
        let count = doc.page_count()?.max(0) as usize;
        let pages = (0..count).map(|_| PageState::default()).collect();
        tracing::debug!("Opened PDF with {} pages ({} bytes)", count, data.len());
        Ok(Self {
            data,
            pages,
            session: None,
        })
    }

    /// Open a PDF file
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let data = std::fs::read(path.as_ref()).map_err(|e| {
            EngineError::Fault(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(data)
    }

    /// Document bytes as of the last committed operation
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Write the document to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        std::fs::write(path.as_ref(), &self.data).map_err(|e| {
            EngineError::Fault(format!("failed to write {}: {}", path.as_ref().display(), e))
        })
    }

    fn with_pdf<F, R>(&self, f: F) -> EngineResult<R>
    where
        F: FnOnce(&PdfDocument) -> EngineResult<R>,
    {
        match &self.session {
            Some(session) => f(&session.doc),
            None => f(&PdfDocument::from_bytes(&self.data)?),
        }
    }

    /// Edit the document on behalf of `page`
    ///
    /// Inside an operation the edit stays in the session document until
    /// `end_operation`; outside one it is committed immediately.
    fn with_pdf_mut<F, R>(&mut self, page: u32, f: F) -> EngineResult<R>
    where
        F: FnOnce(&mut PdfDocument) -> EngineResult<R>,
    {
        if let Some(session) = self.session.as_mut() {
            session.touched.insert(page);
            return f(&mut session.doc);
        }

        let mut doc = PdfDocument::from_bytes(&self.data)?;
        let result = f(&mut doc)?;
        self.data = commit(&doc, &BTreeSet::from([page]), self.data.len())?;
        Ok(result)
    }

    fn ensure_loaded(&self, page: u32) -> EngineResult<LoadedPage> {
        self.pages
            .get(page as usize)
            .and_then(|p| p.loaded)
            .ok_or(EngineError::PageNotLoaded(page))
    }

    fn read_annot<F, R>(&self, page: u32, annot: AnnotRef, f: F) -> EngineResult<R>
    where
        F: FnOnce(&PdfObject, &PageFrame) -> EngineResult<R>,
    {
        let loaded = self.ensure_loaded(page)?;
        self.with_pdf(|doc| {
            let obj = annot_object(doc, page, annot)?;
            f(&obj, &loaded.frame)
        })
    }

    fn write_annot<F>(&mut self, page: u32, annot: AnnotRef, f: F) -> EngineResult<()>
    where
        F: FnOnce(&PdfDocument, &mut PdfObject, &PageFrame) -> EngineResult<()>,
    {
        let loaded = self.ensure_loaded(page)?;
        self.with_pdf_mut(page, |doc| {
            let mut obj = annot_object(doc, page, annot)?;
            f(doc, &mut obj, &loaded.frame)
        })
    }
}

/// Regenerate appearances on `pages` and serialize the document
fn commit(doc: &PdfDocument, pages: &BTreeSet<u32>, size_hint: usize) -> EngineResult<Vec<u8>> {
    for &page in pages {
        let mut pdf_page = PdfPage::try_from(doc.load_page(page as i32)?)?;
        pdf_page.update()?;
    }

    let mut output = Vec::new();
    output
        .try_reserve(size_hint)
        .map_err(|_| EngineError::OutOfMemory)?;
    doc.write_to(&mut output)?;
    Ok(output)
}

fn annots_array(doc: &PdfDocument, page: u32) -> EngineResult<Option<PdfObject>> {
    let page_obj = doc.find_page(page as i32)?;
    Ok(page_obj.get_dict("Annots")?)
}

fn annot_object(doc: &PdfDocument, page: u32, annot: AnnotRef) -> EngineResult<PdfObject> {
    annots_array(doc, page)?
        .and_then(|annots| annots.get_array(annot.0 as i32).ok().flatten())
        .ok_or(EngineError::AnnotationGone)
}

fn name_of(obj: &PdfObject, key: &str) -> EngineResult<Option<String>> {
    Ok(obj
        .get_dict(key)?
        .and_then(|v| v.as_name().ok().map(|n| String::from_utf8_lossy(n).into_owned())))
}

fn numbers_of(obj: &PdfObject, key: &str) -> EngineResult<Vec<f32>> {
    let Some(array) = obj.get_dict(key)? else {
        return Ok(Vec::new());
    };
    let len = array.len()?;
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| EngineError::OutOfMemory)?;
    for i in 0..len {
        if let Some(item) = array.get_array(i as i32)? {
            values.push(item.as_float()?);
        }
    }
    Ok(values)
}

fn number_array(doc: &PdfDocument, values: &[f32]) -> EngineResult<PdfObject> {
    let mut array = doc.new_array()?;
    for v in values {
        array.array_push(doc.new_real(*v)?)?;
    }
    Ok(array)
}

fn rect_values(rect: &NativeRect) -> [f32; 4] {
    [rect.x0, rect.y0, rect.x1, rect.y1].map(|v| v as f32)
}

fn pdf_date() -> String {
    Utc::now().format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Character quads from MuPDF structured text grouped into word spans
fn word_spans(doc: &PdfDocument, page: u32, frame: &PageFrame) -> EngineResult<Vec<TextSpan>> {
    let fz_page = doc.load_page(page as i32)?;
    let text_page = fz_page.to_text_page(TextPageOptions::empty())?;

    let mut spans = Vec::new();
    for block in text_page.blocks() {
        for line in block.lines() {
            let mut word = String::new();
            let mut bbox = NativeRect::empty();
            for ch in line.chars() {
                let Some(c) = ch.char() else { continue };
                if c.is_whitespace() {
                    if !word.is_empty() {
                        spans.push(TextSpan::new(std::mem::take(&mut word), bbox));
                    }
                    bbox = NativeRect::empty();
                    continue;
                }
                let q = ch.quad();
                let glyph = Quad::new(
                    frame.page_point(q.ul.x, q.ul.y),
                    frame.page_point(q.ur.x, q.ur.y),
                    frame.page_point(q.ll.x, q.ll.y),
                    frame.page_point(q.lr.x, q.lr.y),
                );
                bbox = bbox.union(&glyph.bounds());
                word.push(c);
            }
            if !word.is_empty() {
                spans.push(TextSpan::new(word, bbox));
            }
        }
    }
    Ok(spans)
}

impl AnnotationEngine for MupdfEngine {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn load_page(&mut self, page: u32) -> EngineResult<NativeRect> {
        if page as usize >= self.pages.len() {
            return Err(EngineError::Fault(format!("page {} out of range", page)));
        }
        let loaded = self.with_pdf(|doc| {
            let b = doc.load_page(page as i32)?.bounds()?;
            let ctm = doc.find_page(page as i32)?.page_ctm()?;
            Ok(LoadedPage {
                bounds: NativeRect::new(0.0, 0.0, b.width() as f64, b.height() as f64),
                frame: PageFrame::new(&ctm, &b),
            })
        })?;
        self.pages[page as usize].loaded = Some(loaded);
        Ok(loaded.bounds)
    }

    fn unload_page(&mut self, page: u32) {
        if let Some(state) = self.pages.get_mut(page as usize) {
            *state = PageState::default();
        }
    }

    fn is_loaded(&self, page: u32) -> bool {
        self.ensure_loaded(page).is_ok()
    }

    fn begin_operation(&mut self) -> EngineResult<()> {
        if self.session.is_none() {
            self.session = Some(Session {
                doc: PdfDocument::from_bytes(&self.data)?,
                touched: BTreeSet::new(),
            });
        }
        Ok(())
    }

    fn end_operation(&mut self) -> EngineResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        if session.touched.is_empty() {
            return Ok(());
        }
        self.data = commit(&session.doc, &session.touched, self.data.len())?;
        tracing::debug!(
            "Committed edits on {} pages ({} bytes)",
            session.touched.len(),
            self.data.len()
        );
        Ok(())
    }

    fn has_annotation_layer(&self, page: u32) -> EngineResult<bool> {
        self.ensure_loaded(page)?;
        Ok(true)
    }

    fn annotations(&self, page: u32) -> EngineResult<Vec<AnnotRef>> {
        self.ensure_loaded(page)?;
        self.with_pdf(|doc| {
            let count = match annots_array(doc, page)? {
                Some(annots) => annots.len()?,
                None => 0,
            };
            let mut refs = Vec::new();
            refs.try_reserve_exact(count)
                .map_err(|_| EngineError::OutOfMemory)?;
            refs.extend((0..count as u64).map(AnnotRef));
            Ok(refs)
        })
    }

    fn kind(&self, page: u32, annot: AnnotRef) -> EngineResult<AnnotKind> {
        self.read_annot(page, annot, |obj, _| {
            Ok(name_of(obj, "Subtype")?
                .map(|name| AnnotKind::from_subtype(&name))
                .unwrap_or_else(|| AnnotKind::Other(String::new())))
        })
    }

    fn quad_points(&self, page: u32, annot: AnnotRef) -> EngineResult<Vec<Quad>> {
        self.read_annot(page, annot, |obj, frame| {
            // ul, ur, ll, lr per quad; a trailing partial quad is ignored
            let values = numbers_of(obj, "QuadPoints")?;
            Ok(values
                .chunks_exact(8)
                .map(|v| {
                    let p = |i: usize| Point::new(v[i] as f64, v[i + 1] as f64);
                    frame.quad_to_native(&Quad::new(p(0), p(2), p(4), p(6)))
                })
                .collect())
        })
    }

    fn color(&self, page: u32, annot: AnnotRef) -> EngineResult<ColorSample> {
        self.read_annot(page, annot, |obj, _| {
            Ok(ColorSample::from_slice(&numbers_of(obj, "C")?))
        })
    }

    fn contents(&self, page: u32, annot: AnnotRef) -> EngineResult<Option<String>> {
        self.read_annot(page, annot, |obj, _| {
            Ok(obj
                .get_dict("Contents")?
                .and_then(|v| v.as_string().ok().map(str::to_string))
                .filter(|s| !s.is_empty()))
        })
    }

    fn rect(&self, page: u32, annot: AnnotRef) -> EngineResult<NativeRect> {
        self.read_annot(page, annot, |obj, frame| {
            let v = numbers_of(obj, "Rect")?;
            if v.len() < 4 {
                return Err(EngineError::Fault("annotation has no /Rect".to_string()));
            }
            let user = NativeRect::from_corners(
                Point::new(v[0] as f64, v[1] as f64),
                Point::new(v[2] as f64, v[3] as f64),
            );
            Ok(frame.rect_to_native(&user))
        })
    }

    fn create_annotation(&mut self, page: u32, kind: AnnotKind) -> EngineResult<AnnotRef> {
        self.ensure_loaded(page)?;
        self.with_pdf_mut(page, |doc| {
            let mut dict = doc.new_dict()?;
            dict.dict_put("Type", doc.new_name("Annot")?)?;
            dict.dict_put("Subtype", doc.new_name(kind.subtype())?)?;
            dict.dict_put("F", doc.new_int(ANNOT_FLAG_PRINT)?)?;
            dict.dict_put("Rect", number_array(doc, &[0.0, 0.0, 0.0, 0.0])?)?;
            dict.dict_put("M", doc.new_string(&pdf_date())?)?;
            let indirect = doc.add_object(&dict)?;

            let mut page_obj = doc.find_page(page as i32)?;
            let mut annots = match page_obj.get_dict("Annots")? {
                Some(annots) => annots,
                None => {
                    page_obj.dict_put("Annots", doc.new_array()?)?;
                    page_obj
                        .get_dict("Annots")?
                        .ok_or_else(|| EngineError::Fault("failed to create /Annots".to_string()))?
                }
            };
            annots.array_push(indirect)?;
            Ok(AnnotRef((annots.len()? - 1) as u64))
        })
    }

    fn set_quad_points(&mut self, page: u32, annot: AnnotRef, quads: &[Quad]) -> EngineResult<()> {
        self.write_annot(page, annot, |doc, obj, frame| {
            let mut values = Vec::new();
            values
                .try_reserve_exact(quads.len() * 8)
                .map_err(|_| EngineError::OutOfMemory)?;
            let mut bounds = NativeRect::empty();
            for q in quads {
                let user = frame.quad_to_user(q);
                for p in [user.ul, user.ur, user.ll, user.lr] {
                    values.push(p.x as f32);
                    values.push(p.y as f32);
                }
                bounds = bounds.union(&user.bounds());
            }
            obj.dict_put("QuadPoints", number_array(doc, &values)?)?;
            if !bounds.is_empty() {
                obj.dict_put("Rect", number_array(doc, &rect_values(&bounds))?)?;
            }
            Ok(())
        })
    }

    fn set_color(&mut self, page: u32, annot: AnnotRef, color: &ColorSample) -> EngineResult<()> {
        self.write_annot(page, annot, |doc, obj, _| {
            obj.dict_put("C", number_array(doc, color.as_slice())?)?;
            Ok(())
        })
    }

    fn set_contents(&mut self, page: u32, annot: AnnotRef, contents: &str) -> EngineResult<()> {
        self.write_annot(page, annot, |doc, obj, _| {
            obj.dict_put("Contents", doc.new_string(contents)?)?;
            Ok(())
        })
    }

    fn set_rect(&mut self, page: u32, annot: AnnotRef, rect: NativeRect) -> EngineResult<()> {
        self.write_annot(page, annot, |doc, obj, frame| {
            obj.dict_put("Rect", number_array(doc, &rect_values(&frame.rect_to_user(&rect)))?)?;
            Ok(())
        })
    }

    fn update_appearance(&mut self, page: u32, annot: AnnotRef) -> EngineResult<()> {
        // drop the stale stream; the page update on commit synthesizes a new one
        self.write_annot(page, annot, |doc, obj, _| {
            obj.dict_delete("AP")?;
            obj.dict_put("M", doc.new_string(&pdf_date())?)?;
            Ok(())
        })
    }

    fn delete_annotation(&mut self, page: u32, annot: AnnotRef) -> EngineResult<()> {
        self.ensure_loaded(page)?;
        self.with_pdf_mut(page, |doc| {
            let mut annots = annots_array(doc, page)?.ok_or(EngineError::AnnotationGone)?;
            if annot.0 as usize >= annots.len()? {
                return Err(EngineError::AnnotationGone);
            }
            annots.array_delete(annot.0 as i32)?;
            Ok(())
        })
    }

    fn build_text_index(&mut self, page: u32) -> EngineResult<()> {
        let loaded = self.ensure_loaded(page)?;
        if self.has_text_index(page) {
            return Ok(());
        }
        let spans = self.with_pdf(|doc| word_spans(doc, page, &loaded.frame))?;
        tracing::debug!("Indexed {} words on page {}", spans.len(), page);
        if let Some(state) = self.pages.get_mut(page as usize) {
            state.text_index = Some(TextIndex::new(spans));
        }
        Ok(())
    }

    fn has_text_index(&self, page: u32) -> bool {
        self.pages
            .get(page as usize)
            .map(|p| p.loaded.is_some() && p.text_index.is_some())
            .unwrap_or(false)
    }

    fn query_text(&self, page: u32, a: Point, b: Point) -> EngineResult<Option<String>> {
        self.ensure_loaded(page)?;
        Ok(self.pages[page as usize]
            .text_index
            .as_ref()
            .and_then(|index| index.select(a, b)))
    }
}
