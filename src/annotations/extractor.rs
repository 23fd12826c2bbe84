//! Markup annotation extraction
//!
//! Reads Highlight, Underline and StrikeOut annotations from a page and turns
//! them into viewer-space [`Highlight`]s in two stages:
//!
//! 1. **Scan**: walk the page's annotations in native order and buffer each
//!    markup's rectangles, color and bounding box. No text is touched here.
//! 2. **Bind**: query the page's text index over each buffered bounding box
//!    and build the highlights.
//!
//! A fault during the scan aborts the call and drops the buffer; a fault
//! while binding text only costs that highlight its text.
//!
//! Text always comes from the region query; an embedded `/Contents` string is
//! not consulted.

use tracing::{debug, warn};

use super::types::{highlight_id, Highlight};
use crate::color::{classify, HighlightColor};
use crate::document::Page;
use crate::engine::{AnnotRef, AnnotationEngine};
use crate::error::{AnnotationError, Result};
use crate::geometry::{to_viewer, NativeRect, Rectangle};

/// One markup annotation collected during the scan stage
#[derive(Debug)]
struct BufferedAnnotation {
    rectangles: Vec<Rectangle>,
    color: HighlightColor,
    /// Union of all quads, native space
    bounds: NativeRect,
}

/// Scan-stage output, owned by a single extraction call
type AnnotationBuffer = Vec<BufferedAnnotation>;

/// Extract all markup annotations on a page, in native annotation order
///
/// Pages without a native annotation layer yield an empty list.
#[tracing::instrument(skip(page), fields(page = page.index()))]
pub fn extract<E: AnnotationEngine>(page: &Page<E>) -> Result<Vec<Highlight>> {
    let mut engine = page.acquire()?;
    let index = page.index();

    if !engine.has_annotation_layer(index)? {
        debug!("Page {} has no annotation layer", index);
        return Ok(Vec::new());
    }

    let buffer = scan(&*engine, index, page.height())?;

    if !engine.has_text_index(index) {
        if let Err(e) = engine.build_text_index(index) {
            warn!("Failed to build text index for page {}: {}", index, e);
        }
    }

    bind_text(&*engine, index, buffer)
}

fn scan<E: AnnotationEngine>(engine: &E, page: u32, page_height: f64) -> Result<AnnotationBuffer> {
    let annots = engine.annotations(page)?;
    let mut buffer = AnnotationBuffer::new();
    let mut markup_count = 0usize;

    for (position, annot) in annots.iter().copied().enumerate() {
        let kind = engine.kind(page, annot)?;
        debug!("Annotation {}: {}", position, kind.subtype());
        if !kind.is_markup() {
            continue;
        }
        markup_count += 1;

        match buffer_annotation(engine, page, annot, page_height) {
            Ok(Some(entry)) => {
                if buffer.try_reserve(1).is_err() {
                    warn!("Out of memory buffering annotation {}, skipping", position);
                    continue;
                }
                buffer.push(entry);
            }
            Ok(None) => debug!("Annotation {} has no quad points, skipping", position),
            Err(AnnotationError::OutOfMemory) => {
                warn!("Out of memory reading annotation {}, skipping", position);
            }
            Err(e) => return Err(e),
        }
    }

    debug!(
        "Total annotations: {}, markup: {}, buffered: {}",
        annots.len(),
        markup_count,
        buffer.len()
    );
    Ok(buffer)
}

fn buffer_annotation<E: AnnotationEngine>(
    engine: &E,
    page: u32,
    annot: AnnotRef,
    page_height: f64,
) -> Result<Option<BufferedAnnotation>> {
    let quads = engine.quad_points(page, annot)?;
    if quads.is_empty() {
        return Ok(None);
    }

    let mut rectangles = Vec::new();
    rectangles.try_reserve_exact(quads.len())?;

    let mut bounds = NativeRect::empty();
    for quad in &quads {
        let rect = quad.bounds();
        bounds = bounds.union(&rect);
        rectangles.push(to_viewer(&rect, page_height));
    }

    let color = classify(&engine.color(page, annot)?);

    Ok(Some(BufferedAnnotation {
        rectangles,
        color,
        bounds,
    }))
}

fn bind_text<E: AnnotationEngine>(
    engine: &E,
    page: u32,
    buffer: AnnotationBuffer,
) -> Result<Vec<Highlight>> {
    let mut highlights = Vec::new();
    highlights.try_reserve_exact(buffer.len())?;

    let has_index = engine.has_text_index(page);

    for entry in buffer {
        let text = if has_index {
            let (a, b) = entry.bounds.corners();
            match engine.query_text(page, a, b) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Text query failed on page {}: {}", page, e);
                    None
                }
            }
        } else {
            None
        };

        if let Some(text) = &text {
            let preview: String = text.chars().take(50).collect();
            debug!("Extracted text: {}", preview);
        }

        highlights.push(Highlight {
            page_index: page,
            id: highlight_id(page, &entry.bounds),
            rectangles: entry.rectangles,
            color: entry.color,
            text,
        });
    }

    debug!("Returning {} highlights for page {}", highlights.len(), page);
    Ok(highlights)
}
