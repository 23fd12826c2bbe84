//! Annotation operations
//!
//! Every operation takes a [`Page`](crate::document::Page) handle and holds
//! the document lock for its whole body.
//!
//! # Modules
//!
//! - [`extractor`]: two-stage markup extraction (scan, then bind text)
//! - [`exporter`]: write highlights as native Highlight annotations
//! - [`deleter`]: delete the first markup matching a rectangle set
//! - [`notes`]: list, delete, update and export point notes
//! - [`types`]: [`Highlight`] and [`Note`]

pub mod deleter;
pub mod exporter;
pub mod extractor;
mod matcher;
pub mod notes;
pub mod types;

pub use deleter::delete_matching;
pub use exporter::export;
pub use extractor::extract;
pub use types::{highlight_id, note_id, Highlight, Note};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::color::ColorSample;
    use crate::document::{Document, Page};
    use crate::engine::{AnnotKind, MemoryAnnotation, MemoryEngine};
    use crate::geometry::{NativeRect, Quad};

    /// A loaded US Letter page (612 x 792) prepared by `setup`
    pub fn page_with<F>(setup: F) -> Page<MemoryEngine>
    where
        F: FnOnce(&mut MemoryEngine, u32),
    {
        let mut engine = MemoryEngine::new();
        let index = engine.add_page(612.0, 792.0);
        setup(&mut engine, index);
        let doc = Arc::new(Document::new("test-doc", engine));
        doc.load_page(index).unwrap()
    }

    pub fn native_quad(x0: f64, y0: f64, x1: f64, y1: f64) -> Quad {
        Quad::from_rect(&NativeRect::new(x0, y0, x1, y1))
    }

    pub fn highlight_annot(
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        color: ColorSample,
    ) -> MemoryAnnotation {
        MemoryAnnotation::markup(AnnotKind::Highlight, vec![native_quad(x0, y0, x1, y1)], color)
    }
}
