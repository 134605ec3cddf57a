//! Fixed-timestep animation driver and easing curves
//!
//! Managers advance their animations from collaborator frame ticks. The
//! `FixedTimestep` accumulator converts arbitrary frame cadence into whole
//! ~16.67 ms steps so momentum physics and eased interpolation behave the
//! same at any frame rate. Nothing here sleeps or blocks.

use std::time::{Duration, Instant};

/// Steps per second the drivers target.
pub const STEPS_PER_SECOND: f64 = 60.0;

/// Duration of one animation step (~16.67 ms).
pub const STEP_DURATION: Duration = Duration::from_nanos(16_666_667);

/// Safety bound: no animation may outlive this, regardless of the
/// requested duration.
pub const MAX_ANIMATION_DURATION: Duration = Duration::from_secs(10);

/// Steps processed per tick are capped so a long stall cannot trigger a
/// catch-up burst that blows the frame budget.
const MAX_STEPS_PER_TICK: u32 = 30;

/// Easing curve applied to animation progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    /// Cubic ease-in-out; used by zoom and rotation animations.
    CubicInOut,
    /// Cubic ease-out; used for elastic spring-back.
    CubicOut,
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` through the curve.
    #[must_use]
    pub fn ease(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - u * u * u / 2.0
                }
            }
            Easing::CubicOut => {
                let u = 1.0 - t;
                1.0 - u * u * u
            }
        }
    }
}

/// Step-counted progress tracker for one animation.
///
/// Elapsed time advances only through [`Timeline::advance_steps`], so a
/// timeline is fully deterministic given a step count.
#[derive(Clone, Copy, Debug)]
pub struct Timeline {
    elapsed: Duration,
    duration: Duration,
    easing: Easing,
}

impl Timeline {
    /// Create a timeline; the duration is clamped into
    /// `(0, MAX_ANIMATION_DURATION]`.
    #[must_use]
    pub fn new(duration: Duration, easing: Easing) -> Self {
        let duration = duration.clamp(STEP_DURATION, MAX_ANIMATION_DURATION);
        Self {
            elapsed: Duration::ZERO,
            duration,
            easing,
        }
    }

    /// Advance by `steps` fixed steps.
    pub fn advance_steps(&mut self, steps: u32) {
        self.elapsed = (self.elapsed + STEP_DURATION * steps).min(self.duration);
    }

    /// Eased progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        let t = self.elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.easing.ease(t)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Accumulates wall-clock time into whole fixed steps.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedTimestep {
    last_tick: Option<Instant>,
    accumulator: Duration,
}

impl FixedTimestep {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of whole steps elapsed since the previous tick, capped at
    /// `MAX_STEPS_PER_TICK`. The first tick after a reset yields zero and
    /// only establishes the reference instant.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return 0;
        };
        self.last_tick = Some(now);
        self.accumulator += now.saturating_duration_since(last);

        let mut steps = 0;
        while self.accumulator >= STEP_DURATION && steps < MAX_STEPS_PER_TICK {
            self.accumulator -= STEP_DURATION;
            steps += 1;
        }
        if steps == MAX_STEPS_PER_TICK {
            // Drop the backlog instead of catching up.
            self.accumulator = Duration::ZERO;
        }
        steps
    }

    /// Forget the reference instant so the next tick starts fresh.
    pub fn reset(&mut self) {
        self.last_tick = None;
        self.accumulator = Duration::ZERO;
    }
}

/// Seconds represented by one fixed step.
#[must_use]
pub fn step_seconds() -> f64 {
    1.0 / STEPS_PER_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_endpoints_are_exact() {
        for easing in [Easing::Linear, Easing::CubicInOut, Easing::CubicOut] {
            assert_eq!(easing.ease(0.0), 0.0);
            assert_eq!(easing.ease(1.0), 1.0);
        }
    }

    #[test]
    fn cubic_in_out_is_symmetric_around_midpoint() {
        let e = Easing::CubicInOut;
        assert!((e.ease(0.5) - 0.5).abs() < 1e-12);
        assert!((e.ease(0.25) + e.ease(0.75) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn easing_clamps_out_of_range_input() {
        assert_eq!(Easing::CubicInOut.ease(-1.0), 0.0);
        assert_eq!(Easing::CubicInOut.ease(2.0), 1.0);
    }

    #[test]
    fn timeline_progress_monotonic_and_finishes() {
        let mut tl = Timeline::new(Duration::from_millis(100), Easing::Linear);
        let mut prev = tl.progress();
        assert_eq!(prev, 0.0);

        while !tl.is_finished() {
            tl.advance_steps(1);
            let p = tl.progress();
            assert!(p >= prev);
            prev = p;
        }
        assert_eq!(tl.progress(), 1.0);
    }

    #[test]
    fn timeline_duration_is_bounded() {
        let mut tl = Timeline::new(Duration::from_secs(3600), Easing::Linear);
        // 10 s at 60 steps/s = 600 steps.
        tl.advance_steps(600);
        assert!(tl.is_finished());
    }

    #[test]
    fn fixed_timestep_counts_whole_steps() {
        let mut ts = FixedTimestep::new();
        let t0 = Instant::now();
        assert_eq!(ts.advance(t0), 0);

        let steps = ts.advance(t0 + Duration::from_millis(50));
        assert_eq!(steps, 2); // 50 ms / 16.67 ms, remainder carried over

        let steps = ts.advance(t0 + Duration::from_millis(67));
        assert_eq!(steps, 2); // carried remainder pushes this over two more
    }

    #[test]
    fn fixed_timestep_caps_catch_up_bursts() {
        let mut ts = FixedTimestep::new();
        let t0 = Instant::now();
        ts.advance(t0);
        let steps = ts.advance(t0 + Duration::from_secs(60));
        assert_eq!(steps, 30);

        // Backlog was dropped, not deferred.
        let steps = ts.advance(t0 + Duration::from_secs(60) + Duration::from_millis(1));
        assert_eq!(steps, 0);
    }
}
