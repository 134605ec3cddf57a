//! Change notifications delivered to rendering collaborators
//!
//! Plain value events over an observer pattern: delivery is synchronous on
//! the caller's thread, and rejected operations never emit anything.

/// Which degree of freedom produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformSource {
    Zoom,
    Pan,
    Rotation,
    Layout,
}

/// Notifications emitted by the managers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewEvent {
    /// The source's transform changed; the collaborator should re-pull it.
    TransformChanged { source: TransformSource },
    /// An animated operation (or momentum run) completed.
    AnimationFinished { source: TransformSource },
    /// Rotation snapping replaced the requested angle.
    SnapTriggered { raw_angle: f64, snapped_angle: f64 },
}

/// Boxed observer callback.
pub type Listener = Box<dyn FnMut(&ViewEvent) + Send>;

/// A manager's list of subscribed observers.
#[derive(Default)]
pub struct Listeners {
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

impl Listeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ViewEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Deliver an event to every subscriber, in subscription order.
    pub fn emit(&mut self, event: &ViewEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
