//! 2D point with arithmetic and interpolation helpers

use std::ops::{Add, Div, Mul, Neg, Sub};

/// An immutable 2D point (or vector) in document/viewer space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// The origin `(0, 0)`.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a point from x/y coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: Point) -> f64 {
        (other - *self).magnitude()
    }

    /// Midpoint between this point and another.
    #[must_use]
    pub fn midpoint(&self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Linear interpolation: `t = 0` yields `self`, `t = 1` yields `other`.
    #[must_use]
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Rotate this point around `center` by `angle` radians (counter-clockwise).
    #[must_use]
    pub fn rotate_around(&self, center: Point, angle: f64) -> Point {
        let (sin, cos) = angle.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Point::new(
            center.x + dx * cos - dy * sin,
            center.y + dx * sin + dy * cos,
        )
    }

    /// Scale this point away from `center` by per-axis factors.
    #[must_use]
    pub fn scale_around(&self, center: Point, sx: f64, sy: f64) -> Point {
        Point::new(
            center.x + (self.x - center.x) * sx,
            center.y + (self.y - center.y) * sy,
        )
    }

    /// Dot product, treating both points as vectors from the origin.
    #[must_use]
    pub fn dot(&self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Vector length from the origin.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction, or zero for a zero-length vector.
    #[must_use]
    pub fn normalized(&self) -> Point {
        let mag = self.magnitude();
        if mag > 0.0 {
            Point::new(self.x / mag, self.y / mag)
        } else {
            Point::ZERO
        }
    }

    /// True when both coordinates are finite (no NaN or infinity).
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point {
    type Output = Point;

    fn div(self, rhs: f64) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_operators() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(3.0, -4.0);

        assert_eq!(a + b, Point::new(4.0, -2.0));
        assert_eq!(a - b, Point::new(-2.0, 6.0));
        assert_eq!(a * 2.0, Point::new(2.0, 4.0));
        assert_eq!(b / 2.0, Point::new(1.5, -2.0));
        assert_eq!(-a, Point::new(-1.0, -2.0));
    }

    #[test]
    fn distance_and_midpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);

        assert!((a.distance_to(b) - 5.0).abs() < 1e-12);
        assert_eq!(a.midpoint(b), Point::new(1.5, 2.0));
    }

    #[test]
    fn lerp_endpoints_and_middle() {
        let a = Point::new(10.0, 20.0);
        let b = Point::new(30.0, 40.0);

        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Point::new(20.0, 30.0));
    }

    #[test]
    fn rotate_around_quarter_turn() {
        let p = Point::new(2.0, 1.0);
        let rotated = p.rotate_around(Point::new(1.0, 1.0), std::f64::consts::FRAC_PI_2);

        assert!((rotated.x - 1.0).abs() < 1e-12);
        assert!((rotated.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn scale_around_center_is_fixed() {
        let center = Point::new(5.0, 5.0);
        assert_eq!(center.scale_around(center, 3.0, 3.0), center);

        let p = Point::new(7.0, 5.0);
        assert_eq!(p.scale_around(center, 2.0, 2.0), Point::new(9.0, 5.0));
    }

    #[test]
    fn normalized_zero_vector_is_zero() {
        assert_eq!(Point::ZERO.normalized(), Point::ZERO);
        let unit = Point::new(0.0, -8.0).normalized();
        assert_eq!(unit, Point::new(0.0, -1.0));
    }

    #[test]
    fn non_finite_detection() {
        assert!(Point::new(1.0, 2.0).is_finite());
        assert!(!Point::new(f64::NAN, 0.0).is_finite());
        assert!(!Point::new(0.0, f64::INFINITY).is_finite());
    }
}
