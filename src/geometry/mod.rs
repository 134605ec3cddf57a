//! Geometry primitives: points, rectangles, and sizes in f64 document space

mod point;
mod rect;
mod size;

pub use point::Point;
pub use rect::Rectangle;
pub use size::Size;
