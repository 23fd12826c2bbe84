//! Highlight and note entities handed to the viewer

use serde::{Deserialize, Serialize};

use crate::color::HighlightColor;
use crate::geometry::{to_native, NativeRect, Rectangle};

/// A markup annotation (highlight, underline or strike-out) in viewer space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    /// Zero-based page index
    pub page_index: u32,
    /// One rectangle per quad of the source annotation, in quad order
    pub rectangles: Vec<Rectangle>,
    pub color: HighlightColor,
    /// Text under the highlighted region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Derived from page index and bounding-box origin
    pub id: String,
}

impl Highlight {
    /// Build a highlight from viewer rectangles
    ///
    /// The id is derived the same way extraction derives it, so exporting
    /// this highlight and extracting it again reproduces the id.
    pub fn new(
        page_index: u32,
        rectangles: Vec<Rectangle>,
        color: HighlightColor,
        page_height: f64,
    ) -> Self {
        let bounds = rectangles
            .iter()
            .map(|r| to_native(r, page_height))
            .fold(NativeRect::empty(), |acc, r| acc.union(&r));
        Self {
            page_index,
            id: highlight_id(page_index, &bounds),
            rectangles,
            color,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A point note ("sticky note")
///
/// `x`/`y` are the native-space origin of the note's anchor rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Note {
    pub fn new(page: u32, x: f64, y: f64, content: Option<String>) -> Self {
        Self {
            page,
            x,
            y,
            id: note_id(page, x, y),
            content,
        }
    }
}

/// Highlight id from page index and native bounding-box origin
pub fn highlight_id(page_index: u32, bounds: &NativeRect) -> String {
    if bounds.is_empty() {
        return format!("highlight-{}-empty", page_index);
    }
    format!(
        "highlight-{}-{}-{}",
        page_index,
        whole(bounds.x0),
        whole(bounds.y0)
    )
}

/// Note id from page index and anchor position
pub fn note_id(page: u32, x: f64, y: f64) -> String {
    format!("embedded-{}-{}-{}", page, whole(x), whole(y))
}

fn whole(v: f64) -> i64 {
    v.round() as i64
}
