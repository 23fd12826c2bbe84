//! Document engine contract
//!
//! The annotation subsystem never talks to a PDF library directly. It goes
//! through [`AnnotationEngine`], which covers the three collaborators the
//! operations need:
//!
//! 1. **Page lifecycle**: load/unload pages and report their bounds
//! 2. **Text index**: build the positioned-text index once, then query regions
//! 3. **Annotation tree**: walk, read, create, mutate and delete annotations
//!
//! An engine is not thread-safe; [`crate::document::Document`] owns it behind
//! a mutex and hands it out for the duration of one operation, bracketed by
//! [`AnnotationEngine::begin_operation`] and
//! [`AnnotationEngine::end_operation`].
//!
//! # Engines
//!
//! - [`MemoryEngine`]: in-process annotation tree
//! - `MupdfEngine` (feature `mupdf`): MuPDF-backed PDF documents

mod memory;
#[cfg(feature = "mupdf")]
mod mupdf;
mod text;

pub use memory::{FaultPoint, MemoryAnnotation, MemoryEngine};
#[cfg(feature = "mupdf")]
pub use mupdf::MupdfEngine;
pub use text::{TextIndex, TextSpan};

use thiserror::Error;

use crate::color::ColorSample;
use crate::geometry::{NativeRect, Point, Quad};

/// Errors raised by an engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine raised a fault while scanning or mutating
    #[error("Engine fault: {0}")]
    Fault(String),

    /// Page index was never loaded or has been unloaded
    #[error("Page {0} is not loaded")]
    PageNotLoaded(u32),

    /// Annotation handle no longer refers to an annotation
    #[error("Annotation handle is stale")]
    AnnotationGone,

    /// Allocation failed inside the engine
    #[error("Out of memory")]
    OutOfMemory,
}

/// Result type alias for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Annotation subtypes the engine can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotKind {
    Highlight,
    Underline,
    StrikeOut,
    Squiggly,
    /// Point note ("sticky note")
    Text,
    FreeText,
    Link,
    Other(String),
}

impl AnnotKind {
    /// Quad-point markup the extractor and deleter care about
    pub fn is_markup(&self) -> bool {
        matches!(
            self,
            AnnotKind::Highlight | AnnotKind::Underline | AnnotKind::StrikeOut
        )
    }

    pub fn is_point_note(&self) -> bool {
        matches!(self, AnnotKind::Text)
    }

    /// PDF `/Subtype` name
    pub fn subtype(&self) -> &str {
        match self {
            AnnotKind::Highlight => "Highlight",
            AnnotKind::Underline => "Underline",
            AnnotKind::StrikeOut => "StrikeOut",
            AnnotKind::Squiggly => "Squiggly",
            AnnotKind::Text => "Text",
            AnnotKind::FreeText => "FreeText",
            AnnotKind::Link => "Link",
            AnnotKind::Other(name) => name,
        }
    }

    pub fn from_subtype(name: &str) -> Self {
        match name {
            "Highlight" => AnnotKind::Highlight,
            "Underline" => AnnotKind::Underline,
            "StrikeOut" => AnnotKind::StrikeOut,
            "Squiggly" => AnnotKind::Squiggly,
            "Text" => AnnotKind::Text,
            "FreeText" => AnnotKind::FreeText,
            "Link" => AnnotKind::Link,
            other => AnnotKind::Other(other.to_string()),
        }
    }
}

/// Opaque handle to one annotation on a page
///
/// Valid until the next mutation of that page's annotation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotRef(pub(crate) u64);

/// Operations the annotation subsystem needs from a document engine
///
/// Every method takes the zero-based page index. Calls on a page that is not
/// loaded fail with [`EngineError::PageNotLoaded`].
pub trait AnnotationEngine: Send {
    /// Number of pages in the document
    fn page_count(&self) -> u32;

    /// Load a page and return its bounds in native space
    fn load_page(&mut self, page: u32) -> EngineResult<NativeRect>;

    /// Drop a loaded page together with its text index
    fn unload_page(&mut self, page: u32);

    fn is_loaded(&self, page: u32) -> bool;

    /// Start one annotation operation
    ///
    /// Engines that batch work open their state here. The default does
    /// nothing.
    fn begin_operation(&mut self) -> EngineResult<()> {
        Ok(())
    }

    /// End the current operation, committing every mutation made in it
    fn end_operation(&mut self) -> EngineResult<()> {
        Ok(())
    }

    /// Whether the page carries a native annotation layer (PDF pages do)
    fn has_annotation_layer(&self, page: u32) -> EngineResult<bool>;

    /// Annotations on the page in native document order
    fn annotations(&self, page: u32) -> EngineResult<Vec<AnnotRef>>;

    fn kind(&self, page: u32, annot: AnnotRef) -> EngineResult<AnnotKind>;

    /// Quad points in native space; empty for annotations without any
    fn quad_points(&self, page: u32, annot: AnnotRef) -> EngineResult<Vec<Quad>>;

    fn color(&self, page: u32, annot: AnnotRef) -> EngineResult<ColorSample>;

    /// Embedded `/Contents` text, `None` when absent or empty
    fn contents(&self, page: u32, annot: AnnotRef) -> EngineResult<Option<String>>;

    /// Annotation rectangle in native space
    fn rect(&self, page: u32, annot: AnnotRef) -> EngineResult<NativeRect>;

    /// Append a new annotation of the given kind
    fn create_annotation(&mut self, page: u32, kind: AnnotKind) -> EngineResult<AnnotRef>;

    fn set_quad_points(&mut self, page: u32, annot: AnnotRef, quads: &[Quad])
        -> EngineResult<()>;

    fn set_color(&mut self, page: u32, annot: AnnotRef, color: &ColorSample) -> EngineResult<()>;

    fn set_contents(&mut self, page: u32, annot: AnnotRef, contents: &str) -> EngineResult<()>;

    fn set_rect(&mut self, page: u32, annot: AnnotRef, rect: NativeRect) -> EngineResult<()>;

    /// Regenerate the annotation's appearance after mutation
    fn update_appearance(&mut self, page: u32, annot: AnnotRef) -> EngineResult<()>;

    fn delete_annotation(&mut self, page: u32, annot: AnnotRef) -> EngineResult<()>;

    /// Build the page's text index; a no-op when already built
    fn build_text_index(&mut self, page: u32) -> EngineResult<()>;

    fn has_text_index(&self, page: u32) -> bool;

    /// Text inside the region spanned by two native-space corners
    fn query_text(&self, page: u32, a: Point, b: Point) -> EngineResult<Option<String>>;
}
