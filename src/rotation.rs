//! Rotation manager: angle state, snapping, and angle-from-center gestures

use std::f64::consts::{PI, TAU};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::animation::{Easing, FixedTimestep, Timeline};
use crate::cache::{TransformCache, TransformCacheConfig};
use crate::controller::ViewController;
use crate::error::ValidationError;
use crate::events::{Listeners, TransformSource, ViewEvent};
use crate::geometry::Point;
use crate::metrics::ManagerMetrics;
use crate::transform::AffineTransform;
use crate::zoom::millionths;

/// Normalize an angle into `[0, 2π)`.
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid can round to exactly 2π for tiny negative inputs.
    if a >= TAU { 0.0 } else { a }
}

/// Normalize an angle difference into `(-π, π]`.
#[must_use]
pub fn signed_angle_delta(delta: f64) -> f64 {
    let d = delta.rem_euclid(TAU);
    if d > PI { d - TAU } else { d }
}

/// Wraparound-aware distance between two angles, in `[0, π]`.
fn angular_distance(a: f64, b: f64) -> f64 {
    signed_angle_delta(a - b).abs()
}

/// Snapping and lock parameters.
#[derive(Clone, Debug)]
pub struct RotationConfig {
    pub snap_enabled: bool,
    /// Regular snap grid step in radians; `<= 0` disables grid snapping.
    pub snap_angle_step: f64,
    /// Maximum angular distance pulled onto a snap target.
    pub snap_threshold: f64,
    /// Preferred angles snapped to in addition to the grid.
    pub snap_zones: Vec<f64>,
    /// A locked manager rejects every rotation.
    pub locked: bool,
    /// Limits for the manager's transformation cache.
    pub cache: TransformCacheConfig,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            snap_enabled: true,
            snap_angle_step: PI / 12.0, // 15 degrees
            snap_threshold: PI / 30.0,  // 6 degrees
            snap_zones: Vec::new(),
            locked: false,
            cache: TransformCacheConfig::default(),
        }
    }
}

impl RotationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.snap_angle_step.is_finite() || !self.snap_threshold.is_finite() {
            return Err(ValidationError::InvalidConfig {
                reason: "snap parameters must be finite".to_string(),
            });
        }
        if self.snap_threshold < 0.0 {
            return Err(ValidationError::InvalidConfig {
                reason: "snap_threshold must be non-negative".to_string(),
            });
        }
        if self.snap_zones.iter().any(|z| !z.is_finite()) {
            return Err(ValidationError::InvalidConfig {
                reason: "snap zones must be finite".to_string(),
            });
        }
        Ok(())
    }
}

/// Current rotation value and snap settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationState {
    /// Angle in radians, always normalized into `[0, 2π)`.
    pub angle: f64,
    pub center: Point,
    pub snap_enabled: bool,
    pub snap_angle_step: f64,
    pub snap_threshold: f64,
    pub snap_zones: Vec<f64>,
}

#[derive(Clone, Copy, Debug)]
struct RotationAnimation {
    timeline: Timeline,
    from: f64,
    /// Unnormalized target; `from + shortest signed delta`.
    to: f64,
}

#[derive(Clone, Copy, Debug)]
struct RotationGesture {
    center: Point,
    last_pointer_angle: f64,
}

/// Owns the rotation angle, its animation driver, and its transform cache.
pub struct RotationManager {
    state: RotationState,
    config: RotationConfig,
    animation: Option<RotationAnimation>,
    gesture: Option<RotationGesture>,
    timestep: FixedTimestep,
    cache: Arc<TransformCache>,
    listeners: Listeners,
    metrics: ManagerMetrics,
}

impl RotationManager {
    pub fn new(config: RotationConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let mut snap_zones: Vec<f64> = config.snap_zones.iter().map(|z| normalize_angle(*z)).collect();
        snap_zones.sort_by(|a, b| a.total_cmp(b));
        Ok(Self {
            state: RotationState {
                angle: 0.0,
                center: Point::ZERO,
                snap_enabled: config.snap_enabled,
                snap_angle_step: config.snap_angle_step,
                snap_threshold: config.snap_threshold,
                snap_zones,
            },
            cache: Arc::new(TransformCache::new("rotation", config.cache)),
            config,
            animation: None,
            gesture: None,
            timestep: FixedTimestep::new(),
            listeners: Listeners::new(),
            metrics: ManagerMetrics::new(),
        })
    }

    #[must_use]
    pub fn angle(&self) -> f64 {
        self.state.angle
    }

    #[must_use]
    pub fn state(&self) -> &RotationState {
        &self.state
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.config.locked
    }

    #[must_use]
    pub fn metrics(&self) -> &ManagerMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn cache_handle(&self) -> Arc<TransformCache> {
        Arc::clone(&self.cache)
    }

    /// Lock or unlock the manager. Locking cancels any in-flight animation.
    pub fn set_locked(&mut self, locked: bool) {
        self.config.locked = locked;
        if locked {
            self.cancel();
            self.gesture = None;
            debug!("rotation: locked");
        }
    }

    /// Enable or disable snapping.
    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.config.snap_enabled = enabled;
        self.state.snap_enabled = enabled;
    }

    /// Rotate instantly to `angle` (radians), snapping when enabled.
    pub fn rotate_to_angle(
        &mut self,
        angle: f64,
        center: Option<Point>,
    ) -> Result<(), ValidationError> {
        let started = Instant::now();
        self.check_unlocked()?;
        if !angle.is_finite() {
            return Err(ValidationError::NonFinite { field: "angle" });
        }
        if let Some(c) = center {
            if !c.is_finite() {
                return Err(ValidationError::NonFinite { field: "center" });
            }
            self.state.center = c;
        }

        self.cancel();
        self.apply_with_snap(normalize_angle(angle));
        self.metrics.record_instant();
        self.metrics.record_op_time(started.elapsed());
        Ok(())
    }

    /// Rotate instantly by a delta (radians), snapping when enabled.
    pub fn rotate_by_delta(&mut self, delta: f64) -> Result<(), ValidationError> {
        if !delta.is_finite() {
            return Err(ValidationError::NonFinite { field: "delta" });
        }
        self.rotate_to_angle(self.state.angle + delta, None)
    }

    /// Animate toward `target` along the shortest arc with cubic
    /// ease-in-out. Animated rotation does not snap.
    pub fn smooth_rotate_to(
        &mut self,
        target: f64,
        duration: Duration,
    ) -> Result<(), ValidationError> {
        self.check_unlocked()?;
        if !target.is_finite() {
            return Err(ValidationError::NonFinite { field: "target" });
        }

        self.cancel();
        let target = normalize_angle(target);
        let delta = signed_angle_delta(target - self.state.angle);
        trace!("rotation: animating {} -> {target}", self.state.angle);
        self.animation = Some(RotationAnimation {
            timeline: Timeline::new(duration, Easing::CubicInOut),
            from: self.state.angle,
            to: self.state.angle + delta,
        });
        self.timestep.reset();
        self.metrics.record_animated();
        Ok(())
    }

    /// Begin a rotation gesture around `center` with the pointer at
    /// `position`.
    pub fn begin_gesture(&mut self, center: Point, position: Point) -> Result<(), ValidationError> {
        self.check_unlocked()?;
        if !center.is_finite() || !position.is_finite() {
            return Err(ValidationError::NonFinite { field: "position" });
        }
        self.cancel();
        self.gesture = Some(RotationGesture {
            center,
            last_pointer_angle: pointer_angle(center, position),
        });
        self.state.center = center;
        Ok(())
    }

    /// Continue a rotation gesture: the delta between successive pointer
    /// angles is normalized into `(-π, π]` before applying, so crossing
    /// the ±π boundary never causes a full-turn jump.
    pub fn update_gesture(&mut self, position: Point) -> Result<(), ValidationError> {
        if !position.is_finite() {
            return Err(ValidationError::NonFinite { field: "position" });
        }
        let Some(gesture) = &mut self.gesture else {
            return Ok(());
        };
        let current = pointer_angle(gesture.center, position);
        let delta = signed_angle_delta(current - gesture.last_pointer_angle);
        gesture.last_pointer_angle = current;

        self.state.angle = normalize_angle(self.state.angle + delta);
        self.emit_changed();
        Ok(())
    }

    /// End the gesture, snapping the final angle when enabled.
    pub fn finish_gesture(&mut self) {
        if self.gesture.take().is_none() {
            return;
        }
        self.apply_with_snap(self.state.angle);
    }

    /// Nearest snap target for `angle`, when within the threshold.
    ///
    /// Candidates are the configured snap zones plus every multiple of the
    /// snap step; distances account for wraparound.
    #[must_use]
    pub fn snap_target(&self, angle: f64) -> Option<f64> {
        if !self.config.snap_enabled {
            return None;
        }
        let angle = normalize_angle(angle);
        let mut best: Option<(f64, f64)> = None;

        let mut consider = |candidate: f64| {
            let candidate = normalize_angle(candidate);
            let dist = angular_distance(angle, candidate);
            if best.is_none_or(|(_, d)| dist < d) {
                best = Some((candidate, dist));
            }
        };

        for zone in &self.state.snap_zones {
            consider(*zone);
        }
        if self.config.snap_angle_step > 0.0 {
            let steps = (TAU / self.config.snap_angle_step).round() as i64;
            for k in 0..steps.max(1) {
                consider(k as f64 * self.config.snap_angle_step);
            }
        }

        match best {
            Some((candidate, dist)) if dist <= self.config.snap_threshold => Some(candidate),
            _ => None,
        }
    }

    fn apply_with_snap(&mut self, raw: f64) {
        let raw = normalize_angle(raw);
        match self.snap_target(raw) {
            Some(snapped) if snapped != raw => {
                self.state.angle = snapped;
                self.metrics.record_snapped();
                self.emit_changed();
                self.listeners.emit(&ViewEvent::SnapTriggered {
                    raw_angle: raw,
                    snapped_angle: snapped,
                });
            }
            _ => {
                self.state.angle = raw;
                self.emit_changed();
            }
        }
    }

    fn check_unlocked(&self) -> Result<(), ValidationError> {
        if self.config.locked {
            Err(ValidationError::RotationLocked)
        } else {
            Ok(())
        }
    }

    fn emit_changed(&mut self) {
        self.listeners.emit(&ViewEvent::TransformChanged {
            source: TransformSource::Rotation,
        });
    }

    fn cache_key(&self) -> String {
        format!(
            "rot:{}:{}:{}",
            millionths(self.state.angle),
            millionths(self.state.center.x),
            millionths(self.state.center.y)
        )
    }
}

fn pointer_angle(center: Point, position: Point) -> f64 {
    (position.y - center.y).atan2(position.x - center.x)
}

impl ViewController for RotationManager {
    fn source(&self) -> TransformSource {
        TransformSource::Rotation
    }

    fn transform(&mut self) -> AffineTransform {
        let key = self.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let t = AffineTransform::rotation_around(self.state.center, self.state.angle);
        self.cache.set(key, t.clone(), None);
        t
    }

    fn tick(&mut self, now: Instant) {
        let steps = self.timestep.advance(now);
        if steps == 0 {
            return;
        }
        let Some(mut anim) = self.animation.take() else {
            return;
        };

        for _ in 0..steps {
            anim.timeline.advance_steps(1);
            let t = anim.timeline.progress();
            self.state.angle = normalize_angle(anim.from + (anim.to - anim.from) * t);
            self.emit_changed();
            if anim.timeline.is_finished() {
                break;
            }
        }

        if anim.timeline.is_finished() {
            self.state.angle = normalize_angle(anim.to);
            self.listeners.emit(&ViewEvent::AnimationFinished {
                source: TransformSource::Rotation,
            });
        } else {
            self.animation = Some(anim);
        }
    }

    fn cancel(&mut self) {
        if self.animation.take().is_some() {
            trace!("rotation: animation cancelled");
        }
        self.timestep.reset();
    }

    fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    fn subscribe(&mut self, listener: Box<dyn FnMut(&ViewEvent) + Send>) {
        self.listeners.subscribe(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::STEP_DURATION;
    use std::f64::consts::FRAC_PI_4;
    use std::sync::Arc as StdArc;
    use std::sync::Mutex as StdMutex;

    fn manager() -> RotationManager {
        RotationManager::new(RotationConfig::default()).unwrap()
    }

    fn no_snap() -> RotationManager {
        RotationManager::new(RotationConfig {
            snap_enabled: false,
            ..RotationConfig::default()
        })
        .unwrap()
    }

    fn degrees(d: f64) -> f64 {
        d.to_radians()
    }

    fn run_ticks(m: &mut RotationManager, n: u32) {
        let t0 = Instant::now();
        m.tick(t0);
        for i in 1..=n {
            m.tick(t0 + STEP_DURATION * i);
        }
    }

    #[test]
    fn normalize_angle_covers_full_range() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!((normalize_angle(TAU + 1.0) - 1.0).abs() < 1e-12);
        assert!((normalize_angle(-1.0) - (TAU - 1.0)).abs() < 1e-12);
        assert_eq!(normalize_angle(TAU), 0.0);
    }

    #[test]
    fn signed_delta_wraps_into_half_open_interval() {
        assert!((signed_angle_delta(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert_eq!(signed_angle_delta(PI), PI);
        assert!((signed_angle_delta(-PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn forty_four_degrees_snaps_to_forty_five() {
        let mut m = manager();
        m.rotate_to_angle(degrees(44.0), None).unwrap();
        assert!((m.angle() - FRAC_PI_4).abs() < 1e-9);
        assert_eq!(m.metrics().snapped_ops(), 1);
    }

    #[test]
    fn snap_is_idempotent() {
        let mut m = manager();
        m.rotate_to_angle(degrees(44.0), None).unwrap();
        let snapped = m.angle();
        m.rotate_to_angle(snapped, None).unwrap();
        assert_eq!(m.angle(), snapped);
        // Second call was already on the target; no second snap event.
        assert_eq!(m.metrics().snapped_ops(), 1);
    }

    #[test]
    fn far_from_grid_angles_do_not_snap() {
        let mut m = manager();
        m.rotate_to_angle(degrees(37.0), None).unwrap();
        assert!((m.angle() - degrees(37.0)).abs() < 1e-12);
        assert_eq!(m.metrics().snapped_ops(), 0);
    }

    #[test]
    fn snap_zones_beat_distant_grid_points() {
        let mut m = RotationManager::new(RotationConfig {
            snap_angle_step: 0.0,
            snap_zones: vec![degrees(30.0)],
            snap_threshold: degrees(6.0),
            ..RotationConfig::default()
        })
        .unwrap();

        m.rotate_to_angle(degrees(33.0), None).unwrap();
        assert!((m.angle() - degrees(30.0)).abs() < 1e-12);
    }

    #[test]
    fn snap_event_carries_raw_and_snapped_values() {
        let mut m = manager();
        let seen = StdArc::new(StdMutex::new(None));
        let sink = StdArc::clone(&seen);
        m.subscribe(Box::new(move |event| {
            if let ViewEvent::SnapTriggered {
                raw_angle,
                snapped_angle,
            } = event
            {
                *sink.lock().unwrap() = Some((*raw_angle, *snapped_angle));
            }
        }));

        m.rotate_to_angle(degrees(44.0), None).unwrap();
        let (raw, snapped) = seen.lock().unwrap().unwrap();
        assert!((raw - degrees(44.0)).abs() < 1e-12);
        assert!((snapped - FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn angle_stays_normalized_under_delta_sequences() {
        let mut m = no_snap();
        for delta in [3.0, 3.0, 3.0, -10.0, 20.0, -0.5] {
            m.rotate_by_delta(delta).unwrap();
            assert!(m.angle() >= 0.0 && m.angle() < TAU, "angle {}", m.angle());
        }
    }

    #[test]
    fn locked_rotation_rejects_everything() {
        let mut m = manager();
        m.rotate_to_angle(1.0, None).unwrap();
        let before = m.angle();
        m.set_locked(true);

        assert_eq!(
            m.rotate_to_angle(2.0, None),
            Err(ValidationError::RotationLocked)
        );
        assert_eq!(m.rotate_by_delta(0.1), Err(ValidationError::RotationLocked));
        assert!(m.smooth_rotate_to(2.0, Duration::from_millis(50)).is_err());
        assert_eq!(m.angle(), before);
    }

    #[test]
    fn gesture_applies_angle_from_center() {
        let mut m = no_snap();
        let center = Point::new(0.0, 0.0);
        m.begin_gesture(center, Point::new(1.0, 0.0)).unwrap();
        m.update_gesture(Point::new(0.0, 1.0)).unwrap();
        m.finish_gesture();

        assert!((m.angle() - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn gesture_handles_pi_wraparound() {
        let mut m = no_snap();
        let center = Point::new(0.0, 0.0);
        // Start just below +π, cross to just above -π: a small positive step,
        // not a near-full negative turn.
        m.begin_gesture(center, Point::new(-1.0, 0.01)).unwrap();
        m.update_gesture(Point::new(-1.0, -0.01)).unwrap();
        m.finish_gesture();

        let moved = signed_angle_delta(m.angle()).abs();
        assert!(moved < 0.1, "wraparound produced a jump of {moved}");
    }

    #[test]
    fn gesture_finish_snaps() {
        let mut m = manager();
        let center = Point::new(0.0, 0.0);
        m.begin_gesture(center, Point::new(1.0, 0.0)).unwrap();
        // Drag to 44 degrees.
        let target = degrees(44.0);
        m.update_gesture(Point::new(target.cos(), target.sin())).unwrap();
        m.finish_gesture();

        assert!((m.angle() - FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn smooth_rotate_takes_shortest_path() {
        let mut m = no_snap();
        m.rotate_to_angle(degrees(350.0), None).unwrap();
        m.smooth_rotate_to(degrees(10.0), Duration::from_millis(100))
            .unwrap();
        run_ticks(&mut m, 20);

        assert!((m.angle() - degrees(10.0)).abs() < 1e-9);
    }

    #[test]
    fn transform_rotates_around_center() {
        let mut m = no_snap();
        m.rotate_to_angle(PI / 2.0, Some(Point::new(10.0, 10.0)))
            .unwrap();
        let t = m.transform();

        let p = t.apply(Point::new(11.0, 10.0));
        assert!((p.x - 10.0).abs() < 1e-12);
        assert!((p.y - 11.0).abs() < 1e-12);
    }
}
