//! Page geometry
//!
//! Two coordinate frames meet here:
//!
//! - **native** (document) space: origin bottom-left, Y grows upward
//! - **viewer** space: origin top-left, Y grows downward
//!
//! Converting between them is a vertical flip about `page_height / 2`;
//! X is untouched. The flip is an involution, so [`to_viewer`] and
//! [`to_native`] undo each other for the same page height.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in viewer space (`x1 <= x2`, `y1 <= y2`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rectangle {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Finite coordinates with ordered corners
    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 <= self.x2
            && self.y1 <= self.y2
    }

    /// Edge-wise comparison: every edge differs by strictly less than `tolerance`
    pub fn approx_eq(&self, other: &Rectangle, tolerance: f64) -> bool {
        (self.x1 - other.x1).abs() < tolerance
            && (self.x2 - other.x2).abs() < tolerance
            && (self.y1 - other.y1).abs() < tolerance
            && (self.y2 - other.y2).abs() < tolerance
    }
}

/// Axis-aligned rectangle in native space (`x0,y0` bottom-left, `x1,y1` top-right)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl NativeRect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// The identity element for [`NativeRect::union`]
    pub fn empty() -> Self {
        Self {
            x0: f64::INFINITY,
            y0: f64::INFINITY,
            x1: f64::NEG_INFINITY,
            y1: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x0 > self.x1 || self.y0 > self.y1
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &NativeRect) -> NativeRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        NativeRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }

    /// Bottom-left and top-right corners
    pub fn corners(&self) -> (Point, Point) {
        (Point::new(self.x0, self.y0), Point::new(self.x1, self.y1))
    }

    /// Normalized rectangle spanned by two arbitrary corners
    pub fn from_corners(a: Point, b: Point) -> NativeRect {
        NativeRect {
            x0: a.x.min(b.x),
            y0: a.y.min(b.y),
            x1: a.x.max(b.x),
            y1: a.y.max(b.y),
        }
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }
}

/// A point in native space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Four corners of a possibly rotated region in native space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub ul: Point,
    pub ur: Point,
    pub ll: Point,
    pub lr: Point,
}

impl Quad {
    pub fn new(ul: Point, ur: Point, ll: Point, lr: Point) -> Self {
        Self { ul, ur, ll, lr }
    }

    /// Axis-aligned bounding box of the four corners
    ///
    /// Rotation is discarded: a rotated quad becomes the box around it.
    pub fn bounds(&self) -> NativeRect {
        let xs = [self.ul.x, self.ur.x, self.ll.x, self.lr.x];
        let ys = [self.ul.y, self.ur.y, self.ll.y, self.lr.y];
        NativeRect {
            x0: xs.iter().copied().fold(f64::INFINITY, f64::min),
            y0: ys.iter().copied().fold(f64::INFINITY, f64::min),
            x1: xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            y1: ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Upright quad covering a native rectangle
    pub fn from_rect(rect: &NativeRect) -> Quad {
        Quad {
            ul: Point::new(rect.x0, rect.y1),
            ur: Point::new(rect.x1, rect.y1),
            ll: Point::new(rect.x0, rect.y0),
            lr: Point::new(rect.x1, rect.y0),
        }
    }
}

/// Native → viewer
pub fn to_viewer(native: &NativeRect, page_height: f64) -> Rectangle {
    Rectangle {
        x1: native.x0,
        y1: page_height - native.y1,
        x2: native.x1,
        y2: page_height - native.y0,
    }
}

/// Viewer → native
pub fn to_native(rect: &Rectangle, page_height: f64) -> NativeRect {
    NativeRect {
        x0: rect.x1,
        y0: page_height - rect.y2,
        x1: rect.x2,
        y1: page_height - rect.y1,
    }
}

/// Reduce a quad to its bounding box and map it into viewer space
pub fn quad_to_viewer(quad: &Quad, page_height: f64) -> Rectangle {
    to_viewer(&quad.bounds(), page_height)
}

/// Upright native quad for a viewer rectangle
///
/// Exact inverse of [`quad_to_viewer`] for upright quads.
pub fn viewer_to_quad(rect: &Rectangle, page_height: f64) -> Quad {
    Quad::from_rect(&to_native(rect, page_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_HEIGHT: f64 = 792.0;

    #[test]
    fn test_to_viewer_flips_y() {
        let native = NativeRect::new(100.0, 700.0, 300.0, 720.0);
        let viewer = to_viewer(&native, PAGE_HEIGHT);
        assert_eq!(viewer, Rectangle::new(100.0, 72.0, 300.0, 92.0));
    }

    #[test]
    fn test_involution() {
        let rect = Rectangle::new(12.5, 40.25, 310.0, 58.75);
        let back = to_viewer(&to_native(&rect, PAGE_HEIGHT), PAGE_HEIGHT);
        assert!(back.approx_eq(&rect, 1e-9));
    }

    #[test]
    fn test_rotated_quad_reduces_to_bounding_box() {
        let quad = Quad::new(
            Point::new(110.0, 720.0),
            Point::new(300.0, 710.0),
            Point::new(100.0, 700.0),
            Point::new(290.0, 690.0),
        );
        let bounds = quad.bounds();
        assert_eq!(bounds, NativeRect::new(100.0, 690.0, 300.0, 720.0));
    }

    #[test]
    fn test_quad_round_trip() {
        let rect = Rectangle::new(100.0, 72.0, 300.0, 92.0);
        let quad = viewer_to_quad(&rect, PAGE_HEIGHT);
        assert_eq!(quad.ul, Point::new(100.0, 720.0));
        assert_eq!(quad.lr, Point::new(300.0, 700.0));
        assert_eq!(quad_to_viewer(&quad, PAGE_HEIGHT), rect);
    }

    #[test]
    fn test_union_with_empty() {
        let r = NativeRect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(NativeRect::empty().union(&r), r);
        assert_eq!(r.union(&NativeRect::empty()), r);
        let u = r.union(&NativeRect::new(0.0, 5.0, 2.0, 6.0));
        assert_eq!(u, NativeRect::new(0.0, 2.0, 3.0, 6.0));
    }

    #[test]
    fn test_rectangle_validity() {
        assert!(Rectangle::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rectangle::new(2.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rectangle::new(0.0, f64::NAN, 1.0, 1.0).is_valid());
    }
}
