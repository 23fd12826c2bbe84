//! Point-note ("sticky note") management
//!
//! Notes are located by the native-space origin of their anchor rectangle.
//! Listing reports that origin, and exporting writes a square anchor whose
//! origin is the note's `(x, y)`, so a listed note can be passed straight
//! back to [`delete_at`] or [`update_content`].

use tracing::{debug, error, info};

use super::matcher::position_matches;
use super::types::Note;
use crate::document::Page;
use crate::engine::{AnnotKind, AnnotRef, AnnotationEngine};
use crate::error::{AnnotationError, Result};
use crate::geometry::{NativeRect, Point};

/// All point notes on the page in native order
///
/// Pages without an annotation layer have no notes. An engine fault aborts
/// the listing; no partial list is returned.
#[tracing::instrument(skip(page), fields(page = page.index()))]
pub fn list<E: AnnotationEngine>(page: &Page<E>) -> Result<Vec<Note>> {
    let engine = page.acquire()?;
    let index = page.index();

    if !engine.has_annotation_layer(index)? {
        return Ok(Vec::new());
    }

    let annots = engine.annotations(index)?;
    let mut notes = Vec::new();
    for annot in annots {
        if !engine.kind(index, annot)?.is_point_note() {
            continue;
        }
        let rect = engine.rect(index, annot)?;
        let content = engine.contents(index, annot)?;
        notes.try_reserve(1)?;
        let note = Note::new(index, rect.x0, rect.y0, content);
        debug!("Found note {}", note.id);
        notes.push(note);
    }

    debug!("Found {} notes on page {}", notes.len(), index);
    Ok(notes)
}

/// Delete the first note anchored at `(x, y)`
#[tracing::instrument(skip(page), fields(page = page.index()))]
pub fn delete_at<E: AnnotationEngine>(page: &Page<E>, x: f64, y: f64) -> Result<()> {
    let at = checked_point(x, y)?;
    let mut engine = page.acquire()?;
    let index = page.index();

    if !engine.has_annotation_layer(index)? {
        return Err(AnnotationError::NotPdf);
    }

    let annot = find_note(&*engine, index, at, page.config().match_tolerance)?
        .ok_or(AnnotationError::NotFound)?;
    engine.delete_annotation(index, annot)?;
    engine.finish()?;

    info!("Deleted note at ({:.1}, {:.1}) on page {}", x, y, index);
    Ok(())
}

/// Replace the content of the note anchored at `(x, y)` in place
///
/// The number of notes on the page never changes; if the engine reports a
/// different count afterwards the call fails with
/// [`AnnotationError::EngineFault`].
#[tracing::instrument(skip(page, content), fields(page = page.index()))]
pub fn update_content<E: AnnotationEngine>(
    page: &Page<E>,
    x: f64,
    y: f64,
    content: &str,
) -> Result<()> {
    let at = checked_point(x, y)?;
    let mut engine = page.acquire()?;
    let index = page.index();

    if !engine.has_annotation_layer(index)? {
        return Err(AnnotationError::NotPdf);
    }

    let before = count_notes(&*engine, index)?;

    let annot = find_note(&*engine, index, at, page.config().match_tolerance)?
        .ok_or(AnnotationError::NotFound)?;
    engine.set_contents(index, annot, content)?;
    engine.update_appearance(index, annot)?;

    let after = count_notes(&*engine, index)?;
    if after != before {
        error!(
            "Note count changed on page {} during update: before={}, after={}",
            index, before, after
        );
        return Err(AnnotationError::EngineFault(format!(
            "note count changed from {} to {}",
            before, after
        )));
    }
    engine.finish()?;

    info!("Updated note at ({:.1}, {:.1}) on page {}", x, y, index);
    Ok(())
}

/// Create one point note per entry, anchored at its `(x, y)`
///
/// Every note is written to this page. An empty slice succeeds without
/// touching the document.
#[tracing::instrument(skip(page, notes), fields(page = page.index(), count = notes.len()))]
pub fn export_all<E: AnnotationEngine>(page: &Page<E>, notes: &[Note]) -> Result<()> {
    for note in notes {
        checked_point(note.x, note.y)?;
    }

    let mut engine = page.acquire()?;
    let index = page.index();

    if notes.is_empty() {
        return Ok(());
    }

    if !engine.has_annotation_layer(index)? {
        return Err(AnnotationError::NotPdf);
    }

    let size = page.config().note_anchor_size;
    let mut exported = 0usize;
    for note in notes {
        let rect = NativeRect::new(note.x, note.y, note.x + size, note.y + size);
        let annot = engine.create_annotation(index, AnnotKind::Text)?;
        engine.set_rect(index, annot, rect)?;
        if let Some(content) = note.content.as_deref().filter(|c| !c.is_empty()) {
            engine.set_contents(index, annot, content)?;
        }
        engine.update_appearance(index, annot)?;
        exported += 1;
    }

    engine.finish()?;
    info!("Exported {} notes to page {}", exported, index);
    Ok(())
}

fn checked_point(x: f64, y: f64) -> Result<Point> {
    if !x.is_finite() || !y.is_finite() {
        return Err(AnnotationError::InvalidArgument(format!(
            "note position ({}, {}) is not finite",
            x, y
        )));
    }
    Ok(Point::new(x, y))
}

fn find_note<E: AnnotationEngine>(
    engine: &E,
    page: u32,
    at: Point,
    tolerance: f64,
) -> Result<Option<AnnotRef>> {
    for annot in engine.annotations(page)? {
        if !engine.kind(page, annot)?.is_point_note() {
            continue;
        }
        let rect = engine.rect(page, annot)?;
        if position_matches(&rect, at, tolerance) {
            return Ok(Some(annot));
        }
    }
    debug!("No note at ({:.2}, {:.2}) on page {}", at.x, at.y, page);
    Ok(None)
}

fn count_notes<E: AnnotationEngine>(engine: &E, page: u32) -> Result<usize> {
    let mut count = 0;
    for annot in engine.annotations(page)? {
        if engine.kind(page, annot)?.is_point_note() {
            count += 1;
        }
    }
    Ok(count)
}
