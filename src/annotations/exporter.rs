//! Writing highlights back as native annotations

use tracing::{debug, info};

use super::types::Highlight;
use crate::color::ColorSample;
use crate::document::Page;
use crate::engine::{AnnotKind, AnnotRef, AnnotationEngine};
use crate::error::{AnnotationError, Result};
use crate::geometry::viewer_to_quad;

/// Write every highlight that belongs to this page as a native Highlight annotation
///
/// The source classification is not preserved: underlines and strike-outs
/// come back as highlights. Highlights for other pages, and highlights with
/// no rectangles, are skipped.
///
/// A fault stops the loop with [`AnnotationError::EngineFault`]. Annotations
/// written before the fault stay in the document.
#[tracing::instrument(
    skip(page, highlights),
    fields(page = page.index(), count = highlights.len())
)]
pub fn export<E: AnnotationEngine>(page: &Page<E>, highlights: &[Highlight]) -> Result<()> {
    let index = page.index();

    for highlight in highlights.iter().filter(|h| h.page_index == index) {
        if let Some(bad) = highlight.rectangles.iter().find(|r| !r.is_valid()) {
            return Err(AnnotationError::InvalidArgument(format!(
                "highlight {} has malformed rectangle {:?}",
                highlight.id, bad
            )));
        }
    }

    let mut engine = page.acquire()?;

    if !engine.has_annotation_layer(index)? {
        return Err(AnnotationError::NotPdf);
    }

    let mut exported = 0usize;
    for highlight in highlights {
        if highlight.page_index != index {
            continue;
        }
        if highlight.rectangles.is_empty() {
            debug!("Skipping highlight {} without rectangles", highlight.id);
            continue;
        }

        write_highlight(&mut *engine, index, page.height(), highlight)?;
        exported += 1;
    }

    engine.finish()?;
    info!("Exported {} highlights to page {}", exported, index);
    Ok(())
}

fn write_highlight<E: AnnotationEngine>(
    engine: &mut E,
    page: u32,
    page_height: f64,
    highlight: &Highlight,
) -> Result<AnnotRef> {
    let mut quads = Vec::new();
    quads.try_reserve_exact(highlight.rectangles.len())?;
    quads.extend(
        highlight
            .rectangles
            .iter()
            .map(|rect| viewer_to_quad(rect, page_height)),
    );

    let annot = engine.create_annotation(page, AnnotKind::Highlight)?;
    engine.set_quad_points(page, annot, &quads)?;
    engine.set_color(page, annot, &ColorSample::from(highlight.color))?;

    if let Some(text) = highlight.text.as_deref().filter(|t| !t.is_empty()) {
        engine.set_contents(page, annot, text)?;
    }

    engine.update_appearance(page, annot)?;
    Ok(annot)
}
