//! Amnesia Annotations
//!
//! Markup annotation extraction, export and deletion for paginated
//! documents, plus sticky-note management, reconciling the document's native
//! coordinate space (origin bottom-left) with the viewer's (origin top-left).
//!
//! # Modules
//!
//! - `geometry`: native/viewer rectangles, quads and the flip between them
//! - `color`: highlight palette and color classification
//! - `engine`: the document engine contract and its implementations
//! - `document`: lock-guarded documents and page handles
//! - `annotations`: extraction, export, deletion and note operations
//! - `api`: host-facing operations returning error codes

pub mod annotations;
pub mod api;
pub mod color;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod geometry;

pub use annotations::{Highlight, Note};
pub use color::HighlightColor;
pub use config::Config;
pub use document::{Document, Page};
pub use engine::{AnnotationEngine, MemoryEngine};
pub use error::{AnnotationError, Result};
pub use geometry::Rectangle;
