//! Width/height pair with fit and fill scaling helpers

/// An immutable width/height pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size::new(0.0, 0.0);

    /// Create a size from width/height dimensions.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero or negative.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// Uniform scale factor that fits this size entirely inside `container`.
    ///
    /// Returns `0.0` when either size is empty.
    #[must_use]
    pub fn scale_to_fit(&self, container: Size) -> f64 {
        if self.is_empty() || container.is_empty() {
            return 0.0;
        }
        (container.width / self.width).min(container.height / self.height)
    }

    /// Uniform scale factor that covers `container` entirely (may crop).
    ///
    /// Returns `0.0` when either size is empty.
    #[must_use]
    pub fn scale_to_fill(&self, container: Size) -> f64 {
        if self.is_empty() || container.is_empty() {
            return 0.0;
        }
        (container.width / self.width).max(container.height / self.height)
    }

    /// Scale both dimensions by a uniform factor.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Size {
        Size::new(self.width * factor, self.height * factor)
    }
}
