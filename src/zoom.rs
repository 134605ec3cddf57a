//! Zoom manager: one state machine for the zoom degree of freedom

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

/// Zoom limits and step rates.
#[derive(Clone, Copy, Debug)]
pub struct ZoomConfig {
    /// Lowest allowed zoom level; must be positive.
    pub min_zoom: f64,
    /// Highest allowed zoom level; must be >= `min_zoom`.
    pub max_zoom: f64,
    /// Multiplier for one [`ZoomManager::step_in`] call.
    pub step_in_rate: f64,
    /// Divisor for one [`ZoomManager::step_out`] call.
    pub step_out_rate: f64,
    /// Limits for the manager's transformation cache.
    pub cache: TransformCacheConfig,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 10.0,
            step_in_rate: 1.1,
            step_out_rate: 1.05,
            cache: TransformCacheConfig::default(),
        }
    }
}

impl ZoomConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(self.min_zoom.is_finite() && self.max_zoom.is_finite()) {
            return Err(ValidationError::InvalidConfig {
                reason: "zoom bounds must be finite".to_string(),
            });
        }
        if self.min_zoom <= 0.0 || self.min_zoom > self.max_zoom {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "zoom bounds must satisfy 0 < min <= max, got [{}, {}]",
                    self.min_zoom, self.max_zoom
                ),
            });
        }
        if self.step_in_rate <= 1.0 || self.step_out_rate <= 1.0 {
            return Err(ValidationError::InvalidConfig {
                reason: "zoom step rates must be > 1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// Current zoom value and its invariant bounds.
///
/// `min_zoom <= level <= max_zoom` holds after every mutation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomState {
    pub level: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub center: Point,
}

#[derive(Clone, Copy, Debug)]
struct ZoomAnimation {
    timeline: Timeline,
    from: f64,
    to: f64,
}

/// Owns the zoom level, its animation driver, and its transform cache.
pub struct ZoomManager {
    state: ZoomState,
    config: ZoomConfig,
    animation: Option<ZoomAnimation>,
    timestep: FixedTimestep,
    cache: Arc<TransformCache>,
    listeners: Listeners,
    metrics: ManagerMetrics,
}

impl ZoomManager {
    pub fn new(config: ZoomConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            state: ZoomState {
                level: 1.0_f64.clamp(config.min_zoom, config.max_zoom),
                min_zoom: config.min_zoom,
                max_zoom: config.max_zoom,
                center: Point::ZERO,
            },
            config,
            animation: None,
            timestep: FixedTimestep::new(),
            cache: Arc::new(TransformCache::new("zoom", config.cache)),
            listeners: Listeners::new(),
            metrics: ManagerMetrics::new(),
        })
    }

    #[must_use]
    pub fn level(&self) -> f64 {
        self.state.level
    }

    #[must_use]
    pub fn state(&self) -> ZoomState {
        self.state
    }

    #[must_use]
    pub fn metrics(&self) -> &ManagerMetrics {
        &self.metrics
    }

    /// Shared handle to this manager's cache, for registry purposes.
    #[must_use]
    pub fn cache_handle(&self) -> Arc<TransformCache> {
        Arc::clone(&self.cache)
    }

    /// Set the zoom level instantly.
    ///
    /// Out-of-bounds or non-finite levels are rejected with the previous
    /// state intact; `center` updates the anchor the scale is built around.
    pub fn zoom_to_level(
        &mut self,
        level: f64,
        center: Option<Point>,
    ) -> Result<(), ValidationError> {
        let started = Instant::now();
        if !level.is_finite() {
            return Err(ValidationError::NonFinite { field: "level" });
        }
        if level < self.state.min_zoom || level > self.state.max_zoom {
            return Err(ValidationError::ZoomOutOfRange {
                level,
                min: self.state.min_zoom,
                max: self.state.max_zoom,
            });
        }
        if let Some(c) = center {
            if !c.is_finite() {
                return Err(ValidationError::NonFinite { field: "center" });
            }
            self.state.center = c;
        }

        self.cancel();
        self.state.level = level;
        self.metrics.record_instant();
        self.metrics.record_op_time(started.elapsed());
        self.emit_changed();
        Ok(())
    }

    /// Zoom in by one step, clamped to the bounds.
    pub fn step_in(&mut self) {
        let target = (self.state.level * self.config.step_in_rate)
            .clamp(self.state.min_zoom, self.state.max_zoom);
        // Clamped target is always in bounds.
        let _ = self.zoom_to_level(target, None);
    }

    /// Zoom out by one step, clamped to the bounds.
    pub fn step_out(&mut self) {
        let target = (self.state.level / self.config.step_out_rate)
            .clamp(self.state.min_zoom, self.state.max_zoom);
        let _ = self.zoom_to_level(target, None);
    }

    /// Animate toward `target` with cubic ease-in-out over `duration`.
    pub fn smooth_zoom_to(
        &mut self,
        target: f64,
        duration: Duration,
    ) -> Result<(), ValidationError> {
        if !target.is_finite() {
            return Err(ValidationError::NonFinite { field: "target" });
        }
        if target < self.state.min_zoom || target > self.state.max_zoom {
            return Err(ValidationError::ZoomOutOfRange {
                level: target,
                min: self.state.min_zoom,
                max: self.state.max_zoom,
            });
        }

        self.cancel();
        trace!("zoom: animating {} -> {target}", self.state.level);
        self.animation = Some(ZoomAnimation {
            timeline: Timeline::new(duration, Easing::CubicInOut),
            from: self.state.level,
            to: target,
        });
        self.timestep.reset();
        self.metrics.record_animated();
        Ok(())
    }

    /// Replace the zoom bounds, clamping the current level into them and
    /// dropping cached transforms that assumed the old constraints.
    pub fn set_bounds(&mut self, min_zoom: f64, max_zoom: f64) -> Result<(), ValidationError> {
        let candidate = ZoomConfig {
            min_zoom,
            max_zoom,
            ..self.config
        };
        candidate.validate()?;

        self.config = candidate;
        self.state.min_zoom = min_zoom;
        self.state.max_zoom = max_zoom;
        let clamped = self.state.level.clamp(min_zoom, max_zoom);
        let changed = clamped != self.state.level;
        self.state.level = clamped;
        self.cache.clear();
        debug!("zoom: bounds set to [{min_zoom}, {max_zoom}]");
        if changed {
            self.emit_changed();
        }
        Ok(())
    }

    fn emit_changed(&mut self) {
        self.listeners.emit(&ViewEvent::TransformChanged {
            source: TransformSource::Zoom,
        });
    }

    fn cache_key(&self) -> String {
        format!(
            "zoom:{}:{}:{}",
            millionths(self.state.level),
            millionths(self.state.center.x),
            millionths(self.state.center.y)
        )
    }
}

impl ViewController for ZoomManager {
    fn source(&self) -> TransformSource {
        TransformSource::Zoom
    }

    fn transform(&mut self) -> AffineTransform {
        let key = self.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let t = AffineTransform::scaling_around(self.state.center, self.state.level, self.state.level);
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
            self.state.level =
                (anim.from + (anim.to - anim.from) * t).clamp(self.state.min_zoom, self.state.max_zoom);
            self.emit_changed();
            if anim.timeline.is_finished() {
                break;
            }
        }

        if anim.timeline.is_finished() {
            self.state.level = anim.to.clamp(self.state.min_zoom, self.state.max_zoom);
            self.listeners.emit(&ViewEvent::AnimationFinished {
                source: TransformSource::Zoom,
            });
        } else {
            self.animation = Some(anim);
        }
    }

    fn cancel(&mut self) {
        if self.animation.take().is_some() {
            trace!("zoom: animation cancelled");
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

/// Quantize a parameter for a stable cache key.
pub(crate) fn millionths(v: f64) -> i64 {
    (v * 1_000_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::STEP_DURATION;

    fn manager() -> ZoomManager {
        ZoomManager::new(ZoomConfig::default()).unwrap()
    }

    /// Advance enough ticks to fully run any animation.
    fn run_ticks(m: &mut ZoomManager, n: u32) {
        let t0 = Instant::now();
        m.tick(t0);
        for i in 1..=n {
            m.tick(t0 + STEP_DURATION * i);
        }
    }

    #[test]
    fn instant_zoom_within_bounds() {
        let mut m = manager();
        m.zoom_to_level(2.5, Some(Point::new(100.0, 50.0))).unwrap();
        assert_eq!(m.level(), 2.5);
        assert_eq!(m.state().center, Point::new(100.0, 50.0));
    }

    #[test]
    fn out_of_bounds_zoom_is_rejected_not_clamped() {
        let mut m = manager();
        m.zoom_to_level(2.0, None).unwrap();

        let err = m.zoom_to_level(50.0, None).unwrap_err();
        assert!(matches!(err, ValidationError::ZoomOutOfRange { .. }));
        assert_eq!(m.level(), 2.0);
    }

    #[test]
    fn non_finite_zoom_is_rejected() {
        let mut m = manager();
        assert!(m.zoom_to_level(f64::NAN, None).is_err());
        assert!(m.zoom_to_level(f64::INFINITY, None).is_err());
        assert!(m
            .zoom_to_level(2.0, Some(Point::new(f64::NAN, 0.0)))
            .is_err());
        assert_eq!(m.level(), 1.0);
    }

    #[test]
    fn bounds_invariant_after_any_sequence() {
        let mut m = manager();
        for level in [5.0, 0.2, 100.0, -3.0, 9.9, f64::NAN, 0.1] {
            let _ = m.zoom_to_level(level, None);
            assert!(m.level() >= m.state().min_zoom);
            assert!(m.level() <= m.state().max_zoom);
        }
    }

    #[test]
    fn step_in_and_out_stay_clamped() {
        let mut m = manager();
        for _ in 0..100 {
            m.step_in();
        }
        assert!(m.level() <= m.state().max_zoom);
        for _ in 0..200 {
            m.step_out();
        }
        assert!(m.level() >= m.state().min_zoom);
    }

    #[test]
    fn transform_scales_around_center() {
        let mut m = manager();
        m.zoom_to_level(2.0, Some(Point::new(10.0, 10.0))).unwrap();

        let t = m.transform();
        assert_eq!(t.apply(Point::new(10.0, 10.0)), Point::new(10.0, 10.0));
        assert_eq!(t.apply(Point::new(15.0, 10.0)), Point::new(20.0, 10.0));
    }

    #[test]
    fn transform_is_cached_by_quantized_key() {
        let mut m = manager();
        m.zoom_to_level(2.0, None).unwrap();
        let _ = m.transform();
        let _ = m.transform();

        let stats = m.cache_handle().stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn smooth_zoom_reaches_target_and_notifies() {
        let mut m = manager();
        let finished = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&finished);
        m.subscribe(Box::new(move |event| {
            if matches!(
                event,
                ViewEvent::AnimationFinished {
                    source: TransformSource::Zoom
                }
            ) {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }));

        m.smooth_zoom_to(3.0, Duration::from_millis(100)).unwrap();
        assert!(m.is_animating());
        run_ticks(&mut m, 20);

        assert!(!m.is_animating());
        assert_eq!(m.level(), 3.0);
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn new_operation_cancels_in_flight_animation() {
        let mut m = manager();
        m.smooth_zoom_to(5.0, Duration::from_secs(1)).unwrap();
        m.zoom_to_level(2.0, None).unwrap();

        assert!(!m.is_animating());
        run_ticks(&mut m, 10);
        assert_eq!(m.level(), 2.0);
    }

    #[test]
    fn set_bounds_clamps_level_and_clears_cache() {
        let mut m = manager();
        m.zoom_to_level(8.0, None).unwrap();
        let _ = m.transform();
        assert!(!m.cache_handle().is_empty());

        m.set_bounds(0.5, 4.0).unwrap();
        assert_eq!(m.level(), 4.0);
        assert!(m.cache_handle().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(ZoomManager::new(ZoomConfig {
            min_zoom: 0.0,
            ..ZoomConfig::default()
        })
        .is_err());
        assert!(ZoomManager::new(ZoomConfig {
            min_zoom: 5.0,
            max_zoom: 1.0,
            ..ZoomConfig::default()
        })
        .is_err());
    }
}
