//! In-memory annotation engine
//!
//! Keeps each page's annotation list and text spans in plain Rust values.
//! Hosts that manage annotations outside a PDF file can use it directly;
//! tests and benchmarks use it as a deterministic stand-in for a real
//! document.

use std::cell::Cell;

use chrono::{DateTime, Utc};

use super::{AnnotKind, AnnotRef, AnnotationEngine, EngineError, EngineResult, TextIndex, TextSpan};
use crate::color::ColorSample;
use crate::geometry::{NativeRect, Point, Quad};

/// Engine calls that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Annotations,
    QuadPoints,
    Color,
    QueryText,
    BuildTextIndex,
    CreateAnnotation,
    SetContents,
    UpdateAppearance,
    DeleteAnnotation,
    EndOperation,
}

#[derive(Debug)]
struct ArmedFault {
    point: FaultPoint,
    /// Calls allowed to succeed before the fault fires
    remaining: Cell<usize>,
    /// Fail a single call with [`EngineError::OutOfMemory`] instead of
    /// faulting every later one
    out_of_memory: bool,
    spent: Cell<bool>,
}

/// One annotation as stored by [`MemoryEngine`]
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryAnnotation {
    pub kind: AnnotKind,
    pub rect: NativeRect,
    pub quads: Vec<Quad>,
    pub color: ColorSample,
    pub contents: Option<String>,
    /// Bumped on every appearance regeneration
    pub appearance_revision: u32,
    pub modified: Option<DateTime<Utc>>,
}

impl MemoryAnnotation {
    pub fn new(kind: AnnotKind) -> Self {
        Self {
            kind,
            rect: NativeRect::new(0.0, 0.0, 0.0, 0.0),
            quads: Vec::new(),
            color: ColorSample::none(),
            contents: None,
            appearance_revision: 0,
            modified: None,
        }
    }

    /// Quad-point markup; the rectangle is the union of the quads
    pub fn markup(kind: AnnotKind, quads: Vec<Quad>, color: ColorSample) -> Self {
        let rect = quads
            .iter()
            .fold(NativeRect::empty(), |acc, q| acc.union(&q.bounds()));
        Self {
            rect: if rect.is_empty() {
                NativeRect::new(0.0, 0.0, 0.0, 0.0)
            } else {
                rect
            },
            quads,
            color,
            ..Self::new(kind)
        }
    }

    /// Point note anchored at `(x, y)` with a `size`-unit square icon
    pub fn note(x: f64, y: f64, size: f64, contents: Option<&str>) -> Self {
        Self {
            rect: NativeRect::new(x, y, x + size, y + size),
            contents: contents.map(str::to_string),
            ..Self::new(AnnotKind::Text)
        }
    }

    pub fn with_contents(mut self, contents: &str) -> Self {
        self.contents = Some(contents.to_string());
        self
    }
}

#[derive(Debug)]
struct MemoryPage {
    bounds: NativeRect,
    is_pdf: bool,
    loaded: bool,
    annotations: Vec<(u64, MemoryAnnotation)>,
    spans: Vec<TextSpan>,
    text_index: Option<TextIndex>,
    text_index_builds: u32,
}

/// In-process document engine
#[derive(Debug, Default)]
pub struct MemoryEngine {
    pages: Vec<MemoryPage>,
    next_id: u64,
    faults: Vec<ArmedFault>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a PDF page of the given size, returning its index
    pub fn add_page(&mut self, width: f64, height: f64) -> u32 {
        self.push_page(width, height, true)
    }

    /// Append a page without an annotation layer (e.g. an image or EPUB page)
    pub fn add_non_pdf_page(&mut self, width: f64, height: f64) -> u32 {
        self.push_page(width, height, false)
    }

    fn push_page(&mut self, width: f64, height: f64, is_pdf: bool) -> u32 {
        self.pages.push(MemoryPage {
            bounds: NativeRect::new(0.0, 0.0, width, height),
            is_pdf,
            loaded: false,
            annotations: Vec::new(),
            spans: Vec::new(),
            text_index: None,
            text_index_builds: 0,
        });
        (self.pages.len() - 1) as u32
    }

    /// Store an annotation directly, bypassing the mutation API
    pub fn add_annotation(
        &mut self,
        page: u32,
        annotation: MemoryAnnotation,
    ) -> EngineResult<AnnotRef> {
        let id = self.next_id;
        let entry = self
            .pages
            .get_mut(page as usize)
            .ok_or(EngineError::PageNotLoaded(page))?;
        entry.annotations.push((id, annotation));
        self.next_id += 1;
        Ok(AnnotRef(id))
    }

    /// Attach positioned text to a page; invalidates any built index
    pub fn add_text(&mut self, page: u32, span: TextSpan) -> EngineResult<()> {
        let entry = self
            .pages
            .get_mut(page as usize)
            .ok_or(EngineError::PageNotLoaded(page))?;
        entry.spans.push(span);
        entry.text_index = None;
        Ok(())
    }

    /// All annotations on a page in native order
    pub fn page_annotations(&self, page: u32) -> Vec<&MemoryAnnotation> {
        self.pages
            .get(page as usize)
            .map(|p| p.annotations.iter().map(|(_, a)| a).collect())
            .unwrap_or_default()
    }

    /// How many times the page's text index was actually built
    pub fn text_index_builds(&self, page: u32) -> u32 {
        self.pages
            .get(page as usize)
            .map(|p| p.text_index_builds)
            .unwrap_or(0)
    }

    /// Make every call at `point` fail
    #[cfg(any(test, feature = "test-utils"))]
    pub fn inject_fault(&mut self, point: FaultPoint) {
        self.inject_fault_after(point, 0);
    }

    /// Let `successes` calls at `point` through, then fail every later one
    #[cfg(any(test, feature = "test-utils"))]
    pub fn inject_fault_after(&mut self, point: FaultPoint, successes: usize) {
        self.faults.push(ArmedFault {
            point,
            remaining: Cell::new(successes),
            out_of_memory: false,
            spent: Cell::new(false),
        });
    }

    /// Let `successes` calls at `point` through, then fail the next one as
    /// an allocation failure
    #[cfg(any(test, feature = "test-utils"))]
    pub fn inject_out_of_memory_after(&mut self, point: FaultPoint, successes: usize) {
        self.faults.push(ArmedFault {
            point,
            remaining: Cell::new(successes),
            out_of_memory: true,
            spent: Cell::new(false),
        });
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    fn check(&self, point: FaultPoint) -> EngineResult<()> {
        for fault in self.faults.iter().filter(|f| f.point == point && !f.spent.get()) {
            let remaining = fault.remaining.get();
            if remaining > 0 {
                fault.remaining.set(remaining - 1);
            } else if fault.out_of_memory {
                fault.spent.set(true);
                return Err(EngineError::OutOfMemory);
            } else {
                return Err(EngineError::Fault(format!("injected fault at {:?}", point)));
            }
        }
        Ok(())
    }

    fn page(&self, page: u32) -> EngineResult<&MemoryPage> {
        match self.pages.get(page as usize) {
            Some(p) if p.loaded => Ok(p),
            _ => Err(EngineError::PageNotLoaded(page)),
        }
    }

    fn page_mut(&mut self, page: u32) -> EngineResult<&mut MemoryPage> {
        match self.pages.get_mut(page as usize) {
            Some(p) if p.loaded => Ok(p),
            _ => Err(EngineError::PageNotLoaded(page)),
        }
    }

    fn annot(&self, page: u32, annot: AnnotRef) -> EngineResult<&MemoryAnnotation> {
        self.page(page)?
            .annotations
            .iter()
            .find(|(id, _)| *id == annot.0)
            .map(|(_, a)| a)
            .ok_or(EngineError::AnnotationGone)
    }

    fn annot_mut(&mut self, page: u32, annot: AnnotRef) -> EngineResult<&mut MemoryAnnotation> {
        self.page_mut(page)?
            .annotations
            .iter_mut()
            .find(|(id, _)| *id == annot.0)
            .map(|(_, a)| a)
            .ok_or(EngineError::AnnotationGone)
    }

    fn touch(&mut self, page: u32, annot: AnnotRef) -> EngineResult<&mut MemoryAnnotation> {
        let entry = self.annot_mut(page, annot)?;
        entry.modified = Some(Utc::now());
        Ok(entry)
    }
}

impl AnnotationEngine for MemoryEngine {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn load_page(&mut self, page: u32) -> EngineResult<NativeRect> {
        let entry = self
            .pages
            .get_mut(page as usize)
            .ok_or_else(|| EngineError::Fault(format!("page {} out of range", page)))?;
        entry.loaded = true;
        Ok(entry.bounds)
    }

    fn unload_page(&mut self, page: u32) {
        if let Some(entry) = self.pages.get_mut(page as usize) {
            entry.loaded = false;
            entry.text_index = None;
        }
    }

    fn is_loaded(&self, page: u32) -> bool {
        self.pages
            .get(page as usize)
            .map(|p| p.loaded)
            .unwrap_or(false)
    }

    fn end_operation(&mut self) -> EngineResult<()> {
        self.check(FaultPoint::EndOperation)
    }

    fn has_annotation_layer(&self, page: u32) -> EngineResult<bool> {
        Ok(self.page(page)?.is_pdf)
    }

    fn annotations(&self, page: u32) -> EngineResult<Vec<AnnotRef>> {
        self.check(FaultPoint::Annotations)?;
        let entry = self.page(page)?;
        let mut refs = Vec::new();
        refs.try_reserve(entry.annotations.len())
            .map_err(|_| EngineError::OutOfMemory)?;
        refs.extend(entry.annotations.iter().map(|(id, _)| AnnotRef(*id)));
        Ok(refs)
    }

    fn kind(&self, page: u32, annot: AnnotRef) -> EngineResult<AnnotKind> {
        Ok(self.annot(page, annot)?.kind.clone())
    }

    fn quad_points(&self, page: u32, annot: AnnotRef) -> EngineResult<Vec<Quad>> {
        self.check(FaultPoint::QuadPoints)?;
        Ok(self.annot(page, annot)?.quads.clone())
    }

    fn color(&self, page: u32, annot: AnnotRef) -> EngineResult<ColorSample> {
        self.check(FaultPoint::Color)?;
        Ok(self.annot(page, annot)?.color)
    }

    fn contents(&self, page: u32, annot: AnnotRef) -> EngineResult<Option<String>> {
        Ok(self
            .annot(page, annot)?
            .contents
            .clone()
            .filter(|c| !c.is_empty()))
    }

    fn rect(&self, page: u32, annot: AnnotRef) -> EngineResult<NativeRect> {
        Ok(self.annot(page, annot)?.rect)
    }

    fn create_annotation(&mut self, page: u32, kind: AnnotKind) -> EngineResult<AnnotRef> {
        self.check(FaultPoint::CreateAnnotation)?;
        self.page(page)?;
        let mut annotation = MemoryAnnotation::new(kind);
        annotation.modified = Some(Utc::now());
        self.add_annotation(page, annotation)
    }

    fn set_quad_points(
        &mut self,
        page: u32,
        annot: AnnotRef,
        quads: &[Quad],
    ) -> EngineResult<()> {
        let entry = self.touch(page, annot)?;
        entry.quads = quads.to_vec();
        let bounds = quads
            .iter()
            .fold(NativeRect::empty(), |acc, q| acc.union(&q.bounds()));
        if !bounds.is_empty() {
            entry.rect = bounds;
        }
        Ok(())
    }

    fn set_color(&mut self, page: u32, annot: AnnotRef, color: &ColorSample) -> EngineResult<()> {
        self.touch(page, annot)?.color = *color;
        Ok(())
    }

    fn set_contents(&mut self, page: u32, annot: AnnotRef, contents: &str) -> EngineResult<()> {
        self.check(FaultPoint::SetContents)?;
        self.touch(page, annot)?.contents = Some(contents.to_string());
        Ok(())
    }

    fn set_rect(&mut self, page: u32, annot: AnnotRef, rect: NativeRect) -> EngineResult<()> {
        self.touch(page, annot)?.rect = rect;
        Ok(())
    }

    fn update_appearance(&mut self, page: u32, annot: AnnotRef) -> EngineResult<()> {
        self.check(FaultPoint::UpdateAppearance)?;
        self.touch(page, annot)?.appearance_revision += 1;
        Ok(())
    }

    fn delete_annotation(&mut self, page: u32, annot: AnnotRef) -> EngineResult<()> {
        self.check(FaultPoint::DeleteAnnotation)?;
        let entry = self.page_mut(page)?;
        let position = entry
            .annotations
            .iter()
            .position(|(id, _)| *id == annot.0)
            .ok_or(EngineError::AnnotationGone)?;
        entry.annotations.remove(position);
        Ok(())
    }

    fn build_text_index(&mut self, page: u32) -> EngineResult<()> {
        self.check(FaultPoint::BuildTextIndex)?;
        let entry = self.page_mut(page)?;
        if entry.text_index.is_none() {
            entry.text_index = Some(TextIndex::new(entry.spans.clone()));
            entry.text_index_builds += 1;
        }
        Ok(())
    }

    fn has_text_index(&self, page: u32) -> bool {
        self.page(page)
            .map(|p| p.text_index.is_some())
            .unwrap_or(false)
    }

    fn query_text(&self, page: u32, a: Point, b: Point) -> EngineResult<Option<String>> {
        self.check(FaultPoint::QueryText)?;
        Ok(self
            .page(page)?
            .text_index
            .as_ref()
            .and_then(|index| index.select(a, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(x0: f64, y0: f64, x1: f64, y1: f64) -> Quad {
        Quad::from_rect(&NativeRect::new(x0, y0, x1, y1))
    }

    #[test]
    fn test_calls_require_loaded_page() {
        let mut engine = MemoryEngine::new();
        let page = engine.add_page(612.0, 792.0);
        assert!(matches!(
            engine.annotations(page),
            Err(EngineError::PageNotLoaded(0))
        ));

        let bounds = engine.load_page(page).unwrap();
        assert_eq!(bounds.height(), 792.0);
        assert!(engine.annotations(page).unwrap().is_empty());

        engine.unload_page(page);
        assert!(!engine.is_loaded(page));
    }

    #[test]
    fn test_native_order_and_delete() {
        let mut engine = MemoryEngine::new();
        let page = engine.add_page(612.0, 792.0);
        engine.load_page(page).unwrap();
        let first = engine
            .add_annotation(page, MemoryAnnotation::new(AnnotKind::Link))
            .unwrap();
        let second = engine
            .add_annotation(
                page,
                MemoryAnnotation::markup(
                    AnnotKind::Highlight,
                    vec![quad(1.0, 2.0, 3.0, 4.0)],
                    ColorSample::none(),
                ),
            )
            .unwrap();

        assert_eq!(engine.annotations(page).unwrap(), vec![first, second]);
        assert_eq!(engine.rect(page, second).unwrap(), NativeRect::new(1.0, 2.0, 3.0, 4.0));

        engine.delete_annotation(page, first).unwrap();
        assert_eq!(engine.annotations(page).unwrap(), vec![second]);
        assert!(matches!(engine.kind(page, first), Err(EngineError::AnnotationGone)));
    }

    #[test]
    fn test_text_index_built_once() {
        let mut engine = MemoryEngine::new();
        let page = engine.add_page(612.0, 792.0);
        engine
            .add_text(page, TextSpan::new("hello", NativeRect::new(10.0, 10.0, 40.0, 20.0)))
            .unwrap();
        engine.load_page(page).unwrap();

        assert!(!engine.has_text_index(page));
        engine.build_text_index(page).unwrap();
        engine.build_text_index(page).unwrap();
        assert_eq!(engine.text_index_builds(page), 1);

        let text = engine
            .query_text(page, Point::new(0.0, 0.0), Point::new(50.0, 50.0))
            .unwrap();
        assert_eq!(text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_fault_after_successes() {
        let mut engine = MemoryEngine::new();
        let page = engine.add_page(612.0, 792.0);
        engine.load_page(page).unwrap();
        engine.inject_fault_after(FaultPoint::CreateAnnotation, 1);

        assert!(engine.create_annotation(page, AnnotKind::Highlight).is_ok());
        assert!(matches!(
            engine.create_annotation(page, AnnotKind::Highlight),
            Err(EngineError::Fault(_))
        ));

        engine.clear_faults();
        assert!(engine.create_annotation(page, AnnotKind::Highlight).is_ok());
    }

    #[test]
    fn test_out_of_memory_fires_once() {
        let mut engine = MemoryEngine::new();
        let page = engine.add_page(612.0, 792.0);
        engine.load_page(page).unwrap();
        engine.inject_out_of_memory_after(FaultPoint::Annotations, 1);

        assert!(engine.annotations(page).is_ok());
        assert!(matches!(engine.annotations(page), Err(EngineError::OutOfMemory)));
        assert!(engine.annotations(page).is_ok());
    }

    #[test]
    fn test_empty_contents_reads_as_none() {
        let mut engine = MemoryEngine::new();
        let page = engine.add_page(612.0, 792.0);
        engine.load_page(page).unwrap();
        let note = engine
            .add_annotation(page, MemoryAnnotation::note(10.0, 10.0, 24.0, Some("")))
            .unwrap();
        assert_eq!(engine.contents(page, note).unwrap(), None);
    }
}
