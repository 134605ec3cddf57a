//! Axis-aligned rectangle with containment and intersection helpers

use super::Point;

/// An immutable axis-aligned rectangle.
///
/// Negative `width`/`height` denote a degenerate (empty) rectangle; such
/// values never panic, they simply fail containment/intersection queries.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    /// Create a rectangle from its min corner and dimensions.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning two arbitrary corner points.
    #[must_use]
    pub fn from_points(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// True when both dimensions are non-negative.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width >= 0.0 && self.height >= 0.0
    }

    /// True when the rectangle encloses no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[must_use]
    pub fn min_x(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn min_y(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Top-left corner (minimum x/y).
    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// The four corners in top-left, top-right, bottom-left, bottom-right order.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x(), self.min_y()),
            Point::new(self.max_x(), self.min_y()),
            Point::new(self.min_x(), self.max_y()),
            Point::new(self.max_x(), self.max_y()),
        ]
    }

    /// Area; zero for degenerate rectangles.
    #[must_use]
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// Perimeter; zero for degenerate rectangles.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            2.0 * (self.width + self.height)
        }
    }

    /// True when `p` lies inside or on the boundary.
    #[must_use]
    pub fn contains_point(&self, p: Point) -> bool {
        !self.is_empty()
            && p.x >= self.min_x()
            && p.x <= self.max_x()
            && p.y >= self.min_y()
            && p.y <= self.max_y()
    }

    /// True when `other` lies entirely inside this rectangle.
    #[must_use]
    pub fn contains_rect(&self, other: Rectangle) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.min_x() >= self.min_x()
            && other.max_x() <= self.max_x()
            && other.min_y() >= self.min_y()
            && other.max_y() <= self.max_y()
    }

    /// True when the two rectangles overlap (shared edges count).
    #[must_use]
    pub fn intersects(&self, other: Rectangle) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x() <= other.max_x()
            && other.min_x() <= self.max_x()
            && self.min_y() <= other.max_y()
            && other.min_y() <= self.max_y()
    }

    /// Overlapping region, or `None` when the rectangles do not intersect.
    #[must_use]
    pub fn intersection(&self, other: Rectangle) -> Option<Rectangle> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.min_x().max(other.min_x());
        let y = self.min_y().max(other.min_y());
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        Some(Rectangle::new(x, y, max_x - x, max_y - y))
    }

    /// Smallest rectangle covering both inputs. Degenerate inputs are
    /// ignored; two degenerate inputs yield the other operand unchanged.
    #[must_use]
    pub fn union(&self, other: Rectangle) -> Rectangle {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.min_x().min(other.min_x());
        let y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Rectangle::new(x, y, max_x - x, max_y - y)
    }

    /// Grow (or shrink, for negative amounts) outward by `dx`/`dy` on every side.
    #[must_use]
    pub fn expand(&self, dx: f64, dy: f64) -> Rectangle {
        Rectangle::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    /// Scale position and size by per-axis factors.
    #[must_use]
    pub fn scaled(&self, sx: f64, sy: f64) -> Rectangle {
        Rectangle::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }

    /// Translate by a delta vector.
    #[must_use]
    pub fn translated(&self, delta: Point) -> Rectangle {
        Rectangle::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }
}
