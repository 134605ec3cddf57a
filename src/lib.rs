//! Coordinate transformation and caching engine for multi-page document
//! viewers
//!
//! The crate composes three degrees of freedom (zoom, pan, rotation) over a
//! multi-page layout into a single document-to-viewer affine mapping, with
//! bounded caches for the transforms and the points pushed through them.
//! [`ViewerSession`] wires the pieces together; each manager is usable on
//! its own through the [`ViewController`] trait.

pub mod animation;
pub mod cache;
pub mod controller;
pub mod error;
pub mod events;
pub mod geometry;
pub mod metrics;
pub mod pages;
pub mod pan;
pub mod rotation;
pub mod session;
pub mod transform;
pub mod zoom;

pub use cache::{CacheManager, CacheStats, PointCache, TransformCache};
pub use controller::ViewController;
pub use error::{TransformError, ValidationError, ViewerError};
pub use events::{TransformSource, ViewEvent};
pub use geometry::{Point, Rectangle, Size};
pub use pages::{LayoutMode, PageLayout, ScrollAnchor};
pub use pan::{BoundaryBehavior, PanConfig, PanManager};
pub use rotation::{RotationConfig, RotationManager};
pub use session::{SessionConfig, ViewerSession};
pub use transform::AffineTransform;
pub use zoom::{ZoomConfig, ZoomManager};
