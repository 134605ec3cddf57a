//! Capability interface shared by the zoom, pan, and rotation managers

use std::time::Instant;

use crate::events::{TransformSource, ViewEvent};
use crate::transform::AffineTransform;

/// The fixed contract every manager implements.
///
/// Collaborators drive managers through this trait instead of probing for
/// capabilities at runtime; every manager supports every method.
pub trait ViewController {
    /// Which degree of freedom this manager owns.
    fn source(&self) -> TransformSource;

    /// Current transform for this degree of freedom (lazily built and
    /// cached by the manager).
    fn transform(&mut self) -> AffineTransform;

    /// Advance any in-flight animation, gesture inertia, or momentum.
    /// Non-blocking; emits change/finished events synchronously.
    fn tick(&mut self, now: Instant);

    /// Cancel the in-flight animation or momentum run, leaving the current
    /// value in place. No-op when idle.
    fn cancel(&mut self);

    /// True while an animation or momentum run is active.
    fn is_animating(&self) -> bool;

    /// Subscribe an observer for this manager's events.
    fn subscribe(&mut self, listener: Box<dyn FnMut(&ViewEvent) + Send>);
}
