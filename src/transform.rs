//! Affine transform engine: 3×3 homogeneous matrices over document space
//!
//! `AffineTransform` instances are immutable; every operation returns a new
//! instance. The bottom matrix row is `[0, 0, 1]` after every constructor and
//! composition, so the type always represents a true affine map.

use std::sync::OnceLock;

use crate::error::TransformError;
use crate::geometry::Point;

/// Determinants below this magnitude are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-10;

/// Row-major 3×3 matrix. Row 2 is fixed at `[0, 0, 1]` by construction.
pub type Matrix3 = [[f64; 3]; 3];

/// An immutable 2D affine transformation.
///
/// Composition order follows matrix multiplication: `a.compose(&b)` is
/// `A·B`, i.e. "apply `b` first, then `a`".
#[derive(Debug)]
pub struct AffineTransform {
    m: Matrix3,
    det: f64,
    inverse: OnceLock<Option<Matrix3>>,
}

impl Clone for AffineTransform {
    fn clone(&self) -> Self {
        let inverse = OnceLock::new();
        if let Some(inv) = self.inverse.get() {
            let _ = inverse.set(*inv);
        }
        Self {
            m: self.m,
            det: self.det,
            inverse,
        }
    }
}

impl PartialEq for AffineTransform {
    fn eq(&self, other: &Self) -> bool {
        self.m == other.m
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    fn from_matrix(m: Matrix3) -> Self {
        // The 2x2 linear block fully determines the determinant of an
        // affine matrix, so it is cheap enough to compute eagerly.
        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        Self {
            m,
            det,
            inverse: OnceLock::new(),
        }
    }

    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self::from_matrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Translation by `(dx, dy)`.
    #[must_use]
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::from_matrix([[1.0, 0.0, dx], [0.0, 1.0, dy], [0.0, 0.0, 1.0]])
    }

    /// Per-axis scaling about the origin.
    #[must_use]
    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::from_matrix([[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Counter-clockwise rotation about the origin, in radians.
    #[must_use]
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::from_matrix([[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Shear by `shx` along x and `shy` along y.
    #[must_use]
    pub fn shearing(shx: f64, shy: f64) -> Self {
        Self::from_matrix([[1.0, shx, 0.0], [shy, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Scaling about an arbitrary center point.
    #[must_use]
    pub fn scaling_around(center: Point, sx: f64, sy: f64) -> Self {
        Self::translation(center.x, center.y)
            .compose(&Self::scaling(sx, sy))
            .compose(&Self::translation(-center.x, -center.y))
    }

    /// Rotation about an arbitrary center point.
    #[must_use]
    pub fn rotation_around(center: Point, angle: f64) -> Self {
        Self::translation(center.x, center.y)
            .compose(&Self::rotation(angle))
            .compose(&Self::translation(-center.x, -center.y))
    }

    /// Solve for the transform mapping `src` points onto `dst` points.
    ///
    /// Uses the first three pairs to solve the 3×3 linear system; fails with
    /// [`TransformError::DegenerateInput`] when fewer than three pairs are
    /// given or the source points are collinear.
    pub fn from_corresponding_points(
        src: &[Point],
        dst: &[Point],
    ) -> Result<Self, TransformError> {
        if src.len() < 3 || dst.len() < 3 {
            return Err(TransformError::DegenerateInput {
                reason: format!(
                    "need at least 3 point pairs, got {} src / {} dst",
                    src.len(),
                    dst.len()
                ),
            });
        }

        // Coefficient matrix [[x_i, y_i, 1]] shared by both coordinate rows.
        let a = [
            [src[0].x, src[0].y, 1.0],
            [src[1].x, src[1].y, 1.0],
            [src[2].x, src[2].y, 1.0],
        ];
        let det = det3(&a);
        if det.abs() < SINGULAR_EPSILON {
            return Err(TransformError::DegenerateInput {
                reason: "source points are collinear".to_string(),
            });
        }

        let u = [dst[0].x, dst[1].x, dst[2].x];
        let v = [dst[0].y, dst[1].y, dst[2].y];
        let row_x = solve3(&a, &u, det);
        let row_y = solve3(&a, &v, det);

        Ok(Self::from_matrix([row_x, row_y, [0.0, 0.0, 1.0]]))
    }

    /// Underlying matrix, row-major.
    #[must_use]
    pub fn matrix(&self) -> &Matrix3 {
        &self.m
    }

    /// Transform a single point.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.m[0][0] * p.x + self.m[0][1] * p.y + self.m[0][2],
            self.m[1][0] * p.x + self.m[1][1] * p.y + self.m[1][2],
        )
    }

    /// Transform a slice of points into a single pre-sized output vector.
    #[must_use]
    pub fn apply_batch(&self, points: &[Point]) -> Vec<Point> {
        let mut out = Vec::with_capacity(points.len());
        out.extend(points.iter().map(|p| self.apply(*p)));
        out
    }

    /// `self · other`: apply `other` first, then `self`.
    #[must_use]
    pub fn compose(&self, other: &AffineTransform) -> AffineTransform {
        Self::from_matrix(multiply(&self.m, &other.m))
    }

    /// `other · self`: apply `self` first, then `other`.
    #[must_use]
    pub fn prepend(&self, other: &AffineTransform) -> AffineTransform {
        Self::from_matrix(multiply(&other.m, &self.m))
    }

    /// Determinant of the linear part, computed at construction.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.det
    }

    /// Inverse transform.
    ///
    /// The inverse matrix is computed once per instance and reused; fails
    /// with [`TransformError::NotInvertible`] when `|det| < 1e-10`.
    pub fn inverse(&self) -> Result<AffineTransform, TransformError> {
        let cached = self.inverse.get_or_init(|| {
            if self.det.abs() < SINGULAR_EPSILON {
                return None;
            }
            let inv_det = 1.0 / self.det;
            let a = self.m[1][1] * inv_det;
            let b = -self.m[0][1] * inv_det;
            let c = -self.m[1][0] * inv_det;
            let d = self.m[0][0] * inv_det;
            let tx = -(a * self.m[0][2] + b * self.m[1][2]);
            let ty = -(c * self.m[0][2] + d * self.m[1][2]);
            Some([[a, b, tx], [c, d, ty], [0.0, 0.0, 1.0]])
        });

        match cached {
            Some(m) => Ok(Self::from_matrix(*m)),
            None => Err(TransformError::NotInvertible { det: self.det }),
        }
    }

    /// True when every element is within `tolerance` of the identity.
    #[must_use]
    pub fn is_identity(&self, tolerance: f64) -> bool {
        let id: Matrix3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        self.m
            .iter()
            .zip(id.iter())
            .all(|(row, id_row)| {
                row.iter()
                    .zip(id_row.iter())
                    .all(|(a, b)| (a - b).abs() <= tolerance)
            })
    }

    /// Translation components `(dx, dy)`.
    #[must_use]
    pub fn translation_components(&self) -> (f64, f64) {
        (self.m[0][2], self.m[1][2])
    }

    /// Per-axis scale magnitudes `(sx, sy)` (column norms).
    #[must_use]
    pub fn scale_components(&self) -> (f64, f64) {
        let sx = self.m[0][0].hypot(self.m[1][0]);
        let sy = self.m[0][1].hypot(self.m[1][1]);
        (sx, sy)
    }

    /// Rotation angle in radians extracted from the first column.
    #[must_use]
    pub fn rotation_angle(&self) -> f64 {
        self.m[1][0].atan2(self.m[0][0])
    }
}

fn multiply(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = [[0.0; 3]; 3];
    for (i, out_row) in out.iter_mut().enumerate() {
        for (j, cell) in out_row.iter_mut().enumerate() {
            *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    // Guard against drift in the projective row.
    out[2] = [0.0, 0.0, 1.0];
    out
}

fn det3(m: &Matrix3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Cramer's rule for `A·x = rhs` with a precomputed determinant.
fn solve3(a: &Matrix3, rhs: &[f64; 3], det: f64) -> [f64; 3] {
    let mut x = [0.0; 3];
    for (col, slot) in x.iter_mut().enumerate() {
        let mut replaced = *a;
        for row in 0..3 {
            replaced[row][col] = rhs[row];
        }
        *slot = det3(&replaced) / det;
    }
    x
}
