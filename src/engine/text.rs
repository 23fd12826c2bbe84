//! Positioned text index
//!
//! A page's words with their native-space boxes, grouped into lines in
//! reading order. Engines build one per page on demand and answer region
//! queries from it.

use crate::geometry::{NativeRect, Point};

/// One word (or run) of text and its box in native space
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub bbox: NativeRect,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, bbox: NativeRect) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Text spans grouped into lines, top to bottom, each line left to right
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    lines: Vec<Vec<TextSpan>>,
}

impl TextIndex {
    pub fn new(mut spans: Vec<TextSpan>) -> Self {
        spans.retain(|s| !s.text.trim().is_empty() && !s.bbox.is_empty());
        // Native Y grows upward: larger centre first is higher on the page
        spans.sort_by(|a, b| b.bbox.center().y.total_cmp(&a.bbox.center().y));

        let mut lines: Vec<Vec<TextSpan>> = Vec::new();
        for span in spans {
            match lines.last_mut() {
                Some(line) if same_line(&line[0], &span) => line.push(span),
                _ => lines.push(vec![span]),
            }
        }
        for line in &mut lines {
            line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        }

        Self { lines }
    }

    /// Text whose span centres fall inside the region spanned by `a` and `b`
    ///
    /// Words on one line are joined by a space, lines by a newline.
    /// Returns `None` when nothing is selected.
    pub fn select(&self, a: Point, b: Point) -> Option<String> {
        let region = NativeRect::from_corners(a, b);
        let mut selected: Vec<String> = Vec::new();

        for line in &self.lines {
            let words: Vec<&str> = line
                .iter()
                .filter(|span| region.contains(span.bbox.center()))
                .map(|span| span.text.as_str())
                .collect();
            if !words.is_empty() {
                selected.push(words.join(" "));
            }
        }

        if selected.is_empty() {
            None
        } else {
            Some(selected.join("\n"))
        }
    }
}

fn same_line(a: &TextSpan, b: &TextSpan) -> bool {
    let tolerance = (a.bbox.height().min(b.bbox.height()) / 2.0).max(0.5);
    (a.bbox.center().y - b.bbox.center().y).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> TextSpan {
        TextSpan::new(text, NativeRect::new(x0, y0, x1, y1))
    }

    fn sample_index() -> TextIndex {
        TextIndex::new(vec![
            word("world", 150.0, 702.0, 190.0, 718.0),
            word("second", 100.0, 672.0, 150.0, 688.0),
            word("hello", 100.0, 700.0, 140.0, 720.0),
            word("  ", 300.0, 700.0, 310.0, 720.0),
        ])
    }

    #[test]
    fn test_lines_in_reading_order() {
        let index = sample_index();
        assert_eq!(index.lines.len(), 2);
        let all = index.select(Point::new(0.0, 0.0), Point::new(612.0, 792.0));
        assert_eq!(all.as_deref(), Some("hello world\nsecond"));
    }

    #[test]
    fn test_select_region() {
        let index = sample_index();
        let text = index.select(Point::new(100.0, 700.0), Point::new(300.0, 720.0));
        assert_eq!(text.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_corner_order_is_irrelevant() {
        let index = sample_index();
        let a = index.select(Point::new(300.0, 720.0), Point::new(100.0, 700.0));
        let b = index.select(Point::new(100.0, 700.0), Point::new(300.0, 720.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_selection() {
        let index = sample_index();
        assert_eq!(index.select(Point::new(400.0, 100.0), Point::new(500.0, 200.0)), None);
        assert!(TextIndex::default().lines.is_empty());
    }
}
