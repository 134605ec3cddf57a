//! Error types returned by transform and manager operations

use thiserror::Error;

/// Errors raised by explicit inversion and point-fitting calls.
///
/// The hot transform/cache path never produces these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// The matrix determinant is too close to zero to invert.
    #[error("matrix is not invertible (|det| = {det:.3e})")]
    NotInvertible { det: f64 },

    /// Point-fitting input was collinear or otherwise singular.
    #[error("degenerate input: {reason}")]
    DegenerateInput { reason: String },
}

/// Synchronous input rejection. State is left unchanged and no
/// change notification is emitted for a rejected operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// NaN or infinite numeric input.
    #[error("non-finite value for {field}")]
    NonFinite { field: &'static str },

    /// Requested zoom level falls outside the configured bounds.
    #[error("zoom level {level} outside [{min}, {max}]")]
    ZoomOutOfRange { level: f64, min: f64, max: f64 },

    /// Rotation manager is locked against changes.
    #[error("rotation is locked")]
    RotationLocked,

    /// Page number not present in the current layout.
    #[error("unknown page {page}")]
    UnknownPage { page: usize },

    /// Configuration parameter outside its documented valid range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Union of everything a viewer session operation can fail with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}
