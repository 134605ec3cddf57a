//! Pan manager: offset state, gestures, momentum decay, and boundaries

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::animation::{step_seconds, Easing, FixedTimestep, Timeline};
use crate::cache::{TransformCache, TransformCacheConfig};
use crate::controller::ViewController;
use crate::error::ValidationError;
use crate::events::{Listeners, TransformSource, ViewEvent};
use crate::geometry::{Point, Rectangle};
use crate::metrics::ManagerMetrics;
use crate::transform::AffineTransform;
use crate::zoom::millionths;

/// Momentum stops after this many fixed steps no matter what.
const MAX_MOMENTUM_STEPS: u32 = 600;

/// Gesture deltas older than this are ignored for release velocity.
const RELEASE_VELOCITY_WINDOW: Duration = Duration::from_millis(120);

/// Duration of the elastic spring-back animation after gesture release.
const SPRING_BACK_DURATION: Duration = Duration::from_millis(250);

/// How out-of-bounds offsets are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundaryBehavior {
    /// The offset never leaves the bounds.
    #[default]
    HardClamp,
    /// Live drags may overshoot with rubber-band resistance; the offset
    /// animates back inside on release.
    Elastic,
}

/// Momentum, velocity, and boundary parameters.
#[derive(Clone, Copy, Debug)]
pub struct PanConfig {
    /// Velocity multiplier per fixed step during momentum; `0.1..=0.99`.
    pub momentum_factor: f64,
    /// Momentum stops below this speed (units/s); must be >= 0.01.
    pub min_velocity: f64,
    /// Release velocity is clamped to this magnitude (units/s).
    pub max_velocity: f64,
    /// Optional offset bounds.
    pub bounds: Option<Rectangle>,
    /// What happens at the bounds.
    pub boundary: BoundaryBehavior,
    /// Elastic overshoot approaches this many units asymptotically.
    pub elastic_range: f64,
    /// Easing for `smooth_pan_to`; pan defaults to linear.
    pub easing: Easing,
    /// Limits for the manager's transformation cache.
    pub cache: TransformCacheConfig,
}

impl Default for PanConfig {
    fn default() -> Self {
        Self {
            momentum_factor: 0.9,
            min_velocity: 0.5,
            max_velocity: 5000.0,
            bounds: None,
            boundary: BoundaryBehavior::HardClamp,
            elastic_range: 150.0,
            easing: Easing::Linear,
            cache: TransformCacheConfig::default(),
        }
    }
}

impl PanConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(0.1..=0.99).contains(&self.momentum_factor) {
            return Err(ValidationError::InvalidConfig {
                reason: format!("momentum_factor {} outside [0.1, 0.99]", self.momentum_factor),
            });
        }
        if self.min_velocity < 0.01 {
            return Err(ValidationError::InvalidConfig {
                reason: format!("min_velocity {} below 0.01", self.min_velocity),
            });
        }
        if self.max_velocity < self.min_velocity {
            return Err(ValidationError::InvalidConfig {
                reason: "max_velocity below min_velocity".to_string(),
            });
        }
        if self.elastic_range <= 0.0 {
            return Err(ValidationError::InvalidConfig {
                reason: "elastic_range must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Current pan value plus momentum parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanState {
    pub offset: Point,
    pub velocity: Point,
    pub momentum_factor: f64,
    pub min_velocity: f64,
    pub max_velocity: f64,
}

#[derive(Debug)]
enum PanMotion {
    Animation {
        timeline: Timeline,
        from: Point,
        to: Point,
    },
    Momentum {
        steps_run: u32,
    },
}

#[derive(Debug)]
struct PanGesture {
    last_position: Point,
    /// Recent (delta, timestamp) samples for release velocity.
    samples: VecDeque<(Point, Instant)>,
}

/// Owns the pan offset, its animation/momentum driver, and its transform cache.
pub struct PanManager {
    state: PanState,
    config: PanConfig,
    motion: Option<PanMotion>,
    gesture: Option<PanGesture>,
    timestep: FixedTimestep,
    cache: Arc<TransformCache>,
    listeners: Listeners,
    metrics: ManagerMetrics,
}

impl PanManager {
    pub fn new(config: PanConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            state: PanState {
                offset: Point::ZERO,
                velocity: Point::ZERO,
                momentum_factor: config.momentum_factor,
                min_velocity: config.min_velocity,
                max_velocity: config.max_velocity,
            },
            config,
            motion: None,
            gesture: None,
            timestep: FixedTimestep::new(),
            cache: Arc::new(TransformCache::new("pan", config.cache)),
            listeners: Listeners::new(),
            metrics: ManagerMetrics::new(),
        })
    }

    #[must_use]
    pub fn offset(&self) -> Point {
        self.state.offset
    }

    #[must_use]
    pub fn state(&self) -> PanState {
        self.state
    }

    #[must_use]
    pub fn metrics(&self) -> &ManagerMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn cache_handle(&self) -> Arc<TransformCache> {
        Arc::clone(&self.cache)
    }

    /// Set the offset instantly, clamped into the configured bounds.
    pub fn pan_to_offset(&mut self, offset: Point) -> Result<(), ValidationError> {
        let started = Instant::now();
        if !offset.is_finite() {
            return Err(ValidationError::NonFinite { field: "offset" });
        }
        self.cancel();
        self.gesture = None;
        self.state.offset = self.constrain(offset, false);
        self.state.velocity = Point::ZERO;
        self.metrics.record_instant();
        self.metrics.record_op_time(started.elapsed());
        self.emit_changed();
        Ok(())
    }

    /// Shift the offset by a delta, clamped into the configured bounds.
    pub fn pan_by_delta(&mut self, delta: Point) -> Result<(), ValidationError> {
        if !delta.is_finite() {
            return Err(ValidationError::NonFinite { field: "delta" });
        }
        self.pan_to_offset(self.state.offset + delta)
    }

    /// Animate toward `target` over `duration` using the configured easing.
    pub fn smooth_pan_to(&mut self, target: Point, duration: Duration) -> Result<(), ValidationError> {
        if !target.is_finite() {
            return Err(ValidationError::NonFinite { field: "target" });
        }
        self.cancel();
        self.gesture = None;
        let to = self.constrain(target, false);
        trace!("pan: animating {:?} -> {to:?}", self.state.offset);
        self.motion = Some(PanMotion::Animation {
            timeline: Timeline::new(duration, self.config.easing),
            from: self.state.offset,
            to,
        });
        self.timestep.reset();
        self.metrics.record_animated();
        Ok(())
    }

    /// Replace the boundary configuration. Drops cached transforms built
    /// under the old constraints and pulls the offset back inside.
    pub fn set_bounds(&mut self, bounds: Option<Rectangle>, behavior: BoundaryBehavior) {
        self.config.bounds = bounds;
        self.config.boundary = behavior;
        self.cache.clear();
        let constrained = self.constrain(self.state.offset, false);
        if constrained != self.state.offset {
            self.state.offset = constrained;
            self.emit_changed();
        }
        debug!("pan: bounds set to {bounds:?} ({behavior:?})");
    }

    /// Begin a drag gesture at `position` (viewer-space).
    pub fn begin_gesture(&mut self, position: Point, now: Instant) -> Result<(), ValidationError> {
        if !position.is_finite() {
            return Err(ValidationError::NonFinite { field: "position" });
        }
        self.cancel();
        self.state.velocity = Point::ZERO;
        self.gesture = Some(PanGesture {
            last_position: position,
            samples: VecDeque::new(),
        });
        // Touch the samples deque so the first update has a reference time.
        if let Some(g) = &mut self.gesture {
            g.samples.push_back((Point::ZERO, now));
        }
        Ok(())
    }

    /// Continue a drag gesture; applies the position delta to the offset
    /// with live boundary treatment (elastic overshoot allowed).
    pub fn update_gesture(&mut self, position: Point, now: Instant) -> Result<(), ValidationError> {
        if !position.is_finite() {
            return Err(ValidationError::NonFinite { field: "position" });
        }
        let Some(gesture) = &mut self.gesture else {
            return Ok(());
        };
        let delta = position - gesture.last_position;
        gesture.last_position = position;
        gesture.samples.push_back((delta, now));
        while let Some((_, t)) = gesture.samples.front() {
            if now.saturating_duration_since(*t) > RELEASE_VELOCITY_WINDOW {
                gesture.samples.pop_front();
            } else {
                break;
            }
        }

        self.state.offset = self.constrain(self.state.offset + delta, true);
        self.emit_changed();
        Ok(())
    }

    /// End the drag gesture. Starts momentum decay when the release speed
    /// reaches `min_velocity`; otherwise springs back if the drag left an
    /// elastic overshoot behind.
    pub fn finish_gesture(&mut self, now: Instant) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };

        let release = self.release_velocity(&gesture, now);
        if release.magnitude() >= self.config.min_velocity {
            self.state.velocity = release;
            self.motion = Some(PanMotion::Momentum { steps_run: 0 });
            self.timestep.reset();
            self.metrics.record_animated();
            trace!("pan: momentum started at {release:?}");
            return;
        }

        let inside = self.constrain(self.state.offset, false);
        if inside != self.state.offset {
            // Elastic excursion left over; animate back inside the bounds.
            self.motion = Some(PanMotion::Animation {
                timeline: Timeline::new(SPRING_BACK_DURATION, Easing::CubicOut),
                from: self.state.offset,
                to: inside,
            });
            self.timestep.reset();
            self.metrics.record_animated();
        }
    }

    fn release_velocity(&self, gesture: &PanGesture, now: Instant) -> Point {
        let mut total = Point::ZERO;
        let mut oldest = now;
        for (delta, t) in &gesture.samples {
            total = total + *delta;
            if *t < oldest {
                oldest = *t;
            }
        }
        let elapsed = now.saturating_duration_since(oldest).as_secs_f64();
        if elapsed <= 0.0 {
            return Point::ZERO;
        }
        let velocity = total / elapsed;
        let speed = velocity.magnitude();
        if speed > self.config.max_velocity {
            velocity.normalized() * self.config.max_velocity
        } else {
            velocity
        }
    }

    /// Apply boundary constraints. `live` marks in-progress drags, where
    /// elastic bounds compress instead of clamping.
    fn constrain(&self, offset: Point, live: bool) -> Point {
        let Some(bounds) = self.config.bounds else {
            return offset;
        };
        if bounds.is_empty() {
            return offset;
        }
        match self.config.boundary {
            BoundaryBehavior::Elastic if live => Point::new(
                rubber_band(offset.x, bounds.min_x(), bounds.max_x(), self.config.elastic_range),
                rubber_band(offset.y, bounds.min_y(), bounds.max_y(), self.config.elastic_range),
            ),
            _ => Point::new(
                offset.x.clamp(bounds.min_x(), bounds.max_x()),
                offset.y.clamp(bounds.min_y(), bounds.max_y()),
            ),
        }
    }

    fn run_momentum_step(&mut self) -> bool {
        self.state.velocity = self.state.velocity * self.config.momentum_factor;
        if self.state.velocity.magnitude() < self.config.min_velocity {
            self.state.velocity = Point::ZERO;
            return false;
        }

        let raw = self.state.offset + self.state.velocity * step_seconds();
        let constrained = self.constrain(raw, false);
        // Kill velocity on any axis that hit a bound.
        if constrained.x != raw.x {
            self.state.velocity.x = 0.0;
        }
        if constrained.y != raw.y {
            self.state.velocity.y = 0.0;
        }
        self.state.offset = constrained;
        self.emit_changed();
        self.state.velocity != Point::ZERO
    }

    fn emit_changed(&mut self) {
        self.listeners.emit(&ViewEvent::TransformChanged {
            source: TransformSource::Pan,
        });
    }

    fn emit_finished(&mut self) {
        self.listeners.emit(&ViewEvent::AnimationFinished {
            source: TransformSource::Pan,
        });
    }

    fn cache_key(&self) -> String {
        format!(
            "pan:{}:{}",
            millionths(self.state.offset.x),
            millionths(self.state.offset.y)
        )
    }
}

/// Compress `value` toward `[min, max]` with decreasing resistance: the
/// overshoot asymptotically approaches `range` units past the bound.
fn rubber_band(value: f64, min: f64, max: f64, range: f64) -> f64 {
    if value < min {
        let excess = min - value;
        min - range * (1.0 - 1.0 / (1.0 + excess / range))
    } else if value > max {
        let excess = value - max;
        max + range * (1.0 - 1.0 / (1.0 + excess / range))
    } else {
        value
    }
}

impl ViewController for PanManager {
    fn source(&self) -> TransformSource {
        TransformSource::Pan
    }

    fn transform(&mut self) -> AffineTransform {
        let key = self.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let t = AffineTransform::translation(self.state.offset.x, self.state.offset.y);
        self.cache.set(key, t.clone(), None);
        t
    }

    fn tick(&mut self, now: Instant) {
        let steps = self.timestep.advance(now);
        if steps == 0 {
            return;
        }
        let Some(motion) = self.motion.take() else {
            return;
        };

        match motion {
            PanMotion::Animation {
                mut timeline,
                from,
                to,
            } => {
                for _ in 0..steps {
                    timeline.advance_steps(1);
                    let t = timeline.progress();
                    self.state.offset = self.constrain(from.lerp(to, t), false);
                    self.emit_changed();
                    if timeline.is_finished() {
                        break;
                    }
                }
                if timeline.is_finished() {
                    self.state.offset = to;
                    self.emit_finished();
                } else {
                    self.motion = Some(PanMotion::Animation { timeline, from, to });
                }
            }
            PanMotion::Momentum { mut steps_run } => {
                let mut alive = true;
                for _ in 0..steps {
                    steps_run += 1;
                    if steps_run > MAX_MOMENTUM_STEPS || !self.run_momentum_step() {
                        alive = false;
                        break;
                    }
                }
                if alive {
                    self.motion = Some(PanMotion::Momentum { steps_run });
                } else {
                    self.state.velocity = Point::ZERO;
                    self.emit_finished();
                }
            }
        }
    }

    fn cancel(&mut self) {
        if self.motion.take().is_some() {
            trace!("pan: motion cancelled");
        }
        self.timestep.reset();
    }

    fn is_animating(&self) -> bool {
        self.motion.is_some()
    }

    fn subscribe(&mut self, listener: Box<dyn FnMut(&ViewEvent) + Send>) {
        self.listeners.subscribe(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::STEP_DURATION;

    fn manager() -> PanManager {
        PanManager::new(PanConfig::default()).unwrap()
    }

    fn bounded(behavior: BoundaryBehavior) -> PanManager {
        PanManager::new(PanConfig {
            bounds: Some(Rectangle::new(0.0, 0.0, 100.0, 100.0)),
            boundary: behavior,
            ..PanConfig::default()
        })
        .unwrap()
    }

    fn run_ticks(m: &mut PanManager, n: u32) {
        let t0 = Instant::now();
        m.tick(t0);
        for i in 1..=n {
            m.tick(t0 + STEP_DURATION * i);
        }
    }

    #[test]
    fn instant_pan_and_delta() {
        let mut m = manager();
        m.pan_to_offset(Point::new(10.0, 20.0)).unwrap();
        m.pan_by_delta(Point::new(5.0, -5.0)).unwrap();
        assert_eq!(m.offset(), Point::new(15.0, 15.0));
    }

    #[test]
    fn non_finite_pan_is_rejected() {
        let mut m = manager();
        m.pan_to_offset(Point::new(1.0, 1.0)).unwrap();
        assert!(m.pan_to_offset(Point::new(f64::NAN, 0.0)).is_err());
        assert!(m.pan_by_delta(Point::new(0.0, f64::INFINITY)).is_err());
        assert_eq!(m.offset(), Point::new(1.0, 1.0));
    }

    #[test]
    fn hard_clamp_keeps_offset_in_bounds() {
        let mut m = bounded(BoundaryBehavior::HardClamp);
        m.pan_to_offset(Point::new(500.0, -500.0)).unwrap();
        assert_eq!(m.offset(), Point::new(100.0, 0.0));
    }

    #[test]
    fn elastic_drag_overshoots_with_resistance() {
        let mut m = bounded(BoundaryBehavior::Elastic);
        let t0 = Instant::now();
        m.begin_gesture(Point::new(0.0, 0.0), t0).unwrap();
        m.update_gesture(Point::new(-300.0, 0.0), t0 + Duration::from_millis(16))
            .unwrap();

        // Overshoot is compressed: past the bound but well short of -300.
        assert!(m.offset().x < 0.0);
        assert!(m.offset().x > -150.0);
    }

    #[test]
    fn elastic_release_springs_back_inside_bounds() {
        let mut m = bounded(BoundaryBehavior::Elastic);
        let t0 = Instant::now();
        m.begin_gesture(Point::new(0.0, 0.0), t0).unwrap();
        // Slow drag: release velocity stays below min_velocity.
        m.update_gesture(Point::new(-40.0, 0.0), t0 + Duration::from_secs(2))
            .unwrap();
        m.finish_gesture(t0 + Duration::from_secs(2));

        assert!(m.is_animating());
        run_ticks(&mut m, 30);
        assert!(!m.is_animating());
        assert!(m.offset().x >= 0.0);
    }

    #[test]
    fn fast_release_starts_momentum() {
        let mut m = manager();
        let t0 = Instant::now();
        m.begin_gesture(Point::new(0.0, 0.0), t0).unwrap();
        for i in 1..=5 {
            m.update_gesture(
                Point::new(i as f64 * 20.0, 0.0),
                t0 + Duration::from_millis(16 * i as u64),
            )
            .unwrap();
        }
        m.finish_gesture(t0 + Duration::from_millis(80));

        assert!(m.is_animating());
        let before = m.offset().x;
        run_ticks(&mut m, 10);
        assert!(m.offset().x > before);
    }

    #[test]
    fn momentum_decays_and_stops_after_expected_ticks() {
        let mut m = manager();
        // Inject momentum directly: velocity (100, 0), factor 0.9, min 0.5.
        m.state.velocity = Point::new(100.0, 0.0);
        m.motion = Some(PanMotion::Momentum { steps_run: 0 });
        m.timestep.reset();

        // ceil(log(0.5/100) / log(0.9)) = 51 decay steps.
        let expected_steps = ((0.5_f64 / 100.0).ln() / 0.9_f64.ln()).ceil() as u32;
        assert_eq!(expected_steps, 51);

        let mut offsets = vec![m.offset().x];
        let t0 = Instant::now();
        m.tick(t0);
        let mut i = 1;
        while m.is_animating() && i < 700 {
            m.tick(t0 + STEP_DURATION * i);
            offsets.push(m.offset().x);
            i += 1;
        }

        // Stopped exactly at the expected decay step.
        assert_eq!(i - 1, expected_steps);
        // Offset strictly increases while moving, then plateaus.
        for w in offsets.windows(2).take(expected_steps as usize - 1) {
            assert!(w[1] > w[0], "offset should strictly increase: {w:?}");
        }
        assert_eq!(offsets[offsets.len() - 1], offsets[offsets.len() - 2]);
        assert_eq!(m.state().velocity, Point::ZERO);
    }

    #[test]
    fn momentum_respects_hard_bounds() {
        let mut m = bounded(BoundaryBehavior::HardClamp);
        m.state.velocity = Point::new(4000.0, 0.0);
        m.motion = Some(PanMotion::Momentum { steps_run: 0 });
        m.timestep.reset();

        run_ticks(&mut m, 100);
        assert!(m.offset().x <= 100.0);
        assert!(!m.is_animating());
    }

    #[test]
    fn smooth_pan_reaches_target() {
        let mut m = manager();
        m.smooth_pan_to(Point::new(50.0, -30.0), Duration::from_millis(100))
            .unwrap();
        run_ticks(&mut m, 20);
        assert_eq!(m.offset(), Point::new(50.0, -30.0));
        assert!(!m.is_animating());
    }

    #[test]
    fn new_operation_cancels_momentum() {
        let mut m = manager();
        m.state.velocity = Point::new(100.0, 0.0);
        m.motion = Some(PanMotion::Momentum { steps_run: 0 });
        m.pan_to_offset(Point::new(5.0, 5.0)).unwrap();

        assert!(!m.is_animating());
        assert_eq!(m.state().velocity, Point::ZERO);
    }

    #[test]
    fn rubber_band_is_monotone_and_bounded() {
        let range = 150.0;
        let mut prev = rubber_band(100.0, 0.0, 100.0, range);
        for i in 1..200 {
            let v = rubber_band(100.0 + i as f64 * 10.0, 0.0, 100.0, range);
            assert!(v >= prev);
            assert!(v <= 100.0 + range);
            prev = v;
        }
        // Inside the bounds nothing changes.
        assert_eq!(rubber_band(50.0, 0.0, 100.0, range), 50.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(PanManager::new(PanConfig {
            momentum_factor: 0.05,
            ..PanConfig::default()
        })
        .is_err());
        assert!(PanManager::new(PanConfig {
            min_velocity: 0.001,
            ..PanConfig::default()
        })
        .is_err());
    }
}
