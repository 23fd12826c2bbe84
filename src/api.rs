//! Operation surface exposed to the host viewer
//!
//! Thin wrappers over [`crate::annotations`] that collapse the error
//! taxonomy into the viewer's [`ErrorCode`]s. Read operations on a page
//! without an annotation layer succeed with an empty list; mutating
//! operations on such a page fail with [`ErrorCode::Unknown`].

use std::fmt;

use serde::Serialize;

use crate::annotations::{self, notes, Highlight, Note};
use crate::document::Page;
use crate::engine::AnnotationEngine;
use crate::error::AnnotationError;
use crate::geometry::Rectangle;

/// Status returned to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Ok,
    /// Unbound page or malformed input
    InvalidArguments,
    OutOfMemory,
    /// Engine fault, no matching annotation, or non-PDF page on a mutation
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::InvalidArguments => "INVALID_ARGUMENTS",
            ErrorCode::OutOfMemory => "OUT_OF_MEMORY",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AnnotationError> for ErrorCode {
    fn from(err: &AnnotationError) -> Self {
        match err {
            AnnotationError::InvalidArgument(_) => ErrorCode::InvalidArguments,
            AnnotationError::OutOfMemory => ErrorCode::OutOfMemory,
            AnnotationError::EngineFault(_)
            | AnnotationError::NotFound
            | AnnotationError::NotPdf => ErrorCode::Unknown,
        }
    }
}

impl From<AnnotationError> for ErrorCode {
    fn from(err: AnnotationError) -> Self {
        ErrorCode::from(&err)
    }
}

fn report(operation: &'static str, page: u32, err: AnnotationError) -> ErrorCode {
    let code = ErrorCode::from(&err);
    match &err {
        AnnotationError::NotFound => {
            tracing::debug!("{} on page {}: {}", operation, page, err)
        }
        _ => tracing::warn!("{} on page {} failed: {} ({})", operation, page, err, code),
    }
    code
}

/// Markup annotations on the page
pub fn get_annotations<E: AnnotationEngine>(page: &Page<E>) -> Result<Vec<Highlight>, ErrorCode> {
    annotations::extract(page).map_err(|e| report("get_annotations", page.index(), e))
}

/// Write highlights belonging to this page as native annotations
pub fn export_annotations<E: AnnotationEngine>(
    page: &Page<E>,
    highlights: &[Highlight],
) -> Result<(), ErrorCode> {
    annotations::export(page, highlights).map_err(|e| report("export_annotations", page.index(), e))
}

/// Delete the first markup annotation whose rectangles match `rectangles`
pub fn delete_annotation<E: AnnotationEngine>(
    page: &Page<E>,
    rectangles: &[Rectangle],
) -> Result<(), ErrorCode> {
    annotations::delete_matching(page, rectangles)
        .map_err(|e| report("delete_annotation", page.index(), e))
}

pub fn get_notes<E: AnnotationEngine>(page: &Page<E>) -> Result<Vec<Note>, ErrorCode> {
    notes::list(page).map_err(|e| report("get_notes", page.index(), e))
}

pub fn delete_note<E: AnnotationEngine>(page: &Page<E>, x: f64, y: f64) -> Result<(), ErrorCode> {
    notes::delete_at(page, x, y).map_err(|e| report("delete_note", page.index(), e))
}

pub fn update_note_content<E: AnnotationEngine>(
    page: &Page<E>,
    x: f64,
    y: f64,
    content: &str,
) -> Result<(), ErrorCode> {
    notes::update_content(page, x, y, content)
        .map_err(|e| report("update_note_content", page.index(), e))
}

pub fn export_notes<E: AnnotationEngine>(
    page: &Page<E>,
    entries: &[Note],
) -> Result<(), ErrorCode> {
    notes::export_all(page, entries).map_err(|e| report("export_notes", page.index(), e))
}
