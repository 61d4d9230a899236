use std::fmt;
use std::str::FromStr;

use foundation::math::Rotation;
use foundation::time::Instant;

/// Degrees of longitude per millisecond a fresh globe spins at.
pub const DEFAULT_VELOCITY: f64 = 0.05;
/// Step used when a velocity change does not name a rate.
pub const DEFAULT_VELOCITY_STEP: f64 = 0.005;
/// Velocity changes are refused once velocity is at or below this.
pub const VELOCITY_FLOOR: f64 = 0.01;

/// Spin state. `Paused` waits for an implicit trigger (a drag ending) or an
/// explicit `resume`; `Stopped` waits for an explicit `resume` only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SpinState {
    Running,
    #[default]
    Paused,
    Stopped,
}

/// Amount to change velocity by.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum Rate {
    /// The configured default step.
    #[default]
    Default,
    /// Degrees per millisecond.
    Absolute(f64),
    /// Percentage of the current velocity, in `(0, 100]`.
    Percent(f64),
}

impl Rate {
    /// Increment in degrees per millisecond, or `None` for an unusable rate.
    pub fn resolve(self, velocity: f64, default_step: f64) -> Option<f64> {
        let step = match self {
            Rate::Default => default_step,
            Rate::Absolute(v) => v,
            Rate::Percent(p) if p > 0.0 && p <= 100.0 => p / 100.0 * velocity,
            Rate::Percent(_) => return None,
        };
        (step.is_finite() && step > 0.0).then_some(step)
    }
}

impl From<f64> for Rate {
    fn from(v: f64) -> Self {
        Rate::Absolute(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateParseError {
    Malformed(String),
    OutOfRange(String),
}

impl fmt::Display for RateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateParseError::Malformed(s) => write!(f, "malformed rate: {s:?}"),
            RateParseError::OutOfRange(s) => write!(f, "rate out of range: {s:?}"),
        }
    }
}

impl std::error::Error for RateParseError {}

impl FromStr for Rate {
    type Err = RateParseError;

    /// `""` is the default step, `"10%"` a percentage, `"0.01"` absolute.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Rate::Default);
        }
        let (number, percent) = match trimmed.strip_suffix('%') {
            Some(n) => (n.trim(), true),
            None => (trimmed, false),
        };
        let value: f64 = number
            .parse()
            .map_err(|_| RateParseError::Malformed(s.to_string()))?;
        if !value.is_finite() {
            return Err(RateParseError::Malformed(s.to_string()));
        }
        let in_range = if percent {
            value > 0.0 && value <= 100.0
        } else {
            value > 0.0
        };
        if !in_range {
            return Err(RateParseError::OutOfRange(s.to_string()));
        }
        Ok(if percent {
            Rate::Percent(value)
        } else {
            Rate::Absolute(value)
        })
    }
}

/// Continuous rotation advanced by `velocity × elapsed` every frame.
#[derive(Debug, Clone)]
pub struct InertialSpinner {
    state: SpinState,
    velocity: f64,
    last_tick: Instant,
    step: f64,
    floor: f64,
}

impl InertialSpinner {
    pub fn new(velocity: f64, step: f64, floor: f64, now: Instant) -> Self {
        Self {
            state: SpinState::default(),
            velocity,
            last_tick: now,
            step,
            floor,
        }
    }

    pub fn state(&self) -> SpinState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SpinState::Running
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn last_tick(&self) -> Instant {
        self.last_tick
    }

    /// Non-finite values are ignored. Returns the velocity in effect.
    pub fn set_velocity(&mut self, velocity: f64) -> f64 {
        if velocity.is_finite() {
            self.velocity = velocity;
        }
        self.velocity
    }

    /// New velocity, or `None` when refused (at the floor, or a bad rate).
    pub fn increase(&mut self, rate: Rate) -> Option<f64> {
        let step = self.step_for(rate)?;
        self.velocity += step;
        Some(self.velocity)
    }

    pub fn decrease(&mut self, rate: Rate) -> Option<f64> {
        let step = self.step_for(rate)?;
        self.velocity -= step;
        Some(self.velocity)
    }

    /// Running → Paused. Returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        if self.state == SpinState::Running {
            self.state = SpinState::Paused;
            return true;
        }
        false
    }

    /// Any state → Running, rebasing the tick time so the pause is not
    /// integrated as motion.
    pub fn resume(&mut self, now: Instant) {
        self.state = SpinState::Running;
        self.last_tick = now;
    }

    /// Running/Paused → Stopped. Returns whether the state changed.
    pub fn stop(&mut self) -> bool {
        if self.state == SpinState::Stopped {
            return false;
        }
        self.state = SpinState::Stopped;
        true
    }

    /// The implicit trigger a finished drag delivers: Paused → Running.
    /// A stopped spinner stays stopped. The tick time is rebased either way.
    pub fn release_pause(&mut self, now: Instant) -> bool {
        self.last_tick = now;
        if self.state == SpinState::Paused {
            self.state = SpinState::Running;
            return true;
        }
        false
    }

    /// Advances `rotation` when running and `can_advance` holds. The tick
    /// time always moves to `now`, so time spent not spinning never turns
    /// into a jump on the next frame.
    pub fn tick(&mut self, now: Instant, rotation: &mut Rotation, can_advance: bool) -> bool {
        let advanced = can_advance && self.is_running();
        if advanced {
            let angle = self.velocity * now.since(self.last_tick);
            *rotation = rotation.apply_delta(angle, 0.0, 0.0);
        }
        self.last_tick = now;
        advanced
    }

    fn step_for(&self, rate: Rate) -> Option<f64> {
        if self.velocity <= self.floor {
            return None;
        }
        rate.resolve(self.velocity, self.step)
    }
}

impl Default for InertialSpinner {
    fn default() -> Self {
        Self::new(
            DEFAULT_VELOCITY,
            DEFAULT_VELOCITY_STEP,
            VELOCITY_FLOOR,
            Instant::ZERO,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{InertialSpinner, Rate, RateParseError, SpinState};
    use foundation::math::Rotation;
    use foundation::time::Instant;

    fn ms(v: f64) -> Instant {
        Instant::from_millis(v)
    }

    fn running() -> InertialSpinner {
        let mut s = InertialSpinner::default();
        s.resume(Instant::ZERO);
        s
    }

    #[test]
    fn parses_rates() {
        assert_eq!("".parse::<Rate>(), Ok(Rate::Default));
        assert_eq!("10%".parse::<Rate>(), Ok(Rate::Percent(10.0)));
        assert_eq!(" 2.5 % ".parse::<Rate>(), Ok(Rate::Percent(2.5)));
        assert_eq!("0.01".parse::<Rate>(), Ok(Rate::Absolute(0.01)));
        assert!(matches!("fast".parse::<Rate>(), Err(RateParseError::Malformed(_))));
        assert!(matches!("NaN".parse::<Rate>(), Err(RateParseError::Malformed(_))));
        assert!(matches!("150%".parse::<Rate>(), Err(RateParseError::OutOfRange(_))));
        assert!(matches!("-1".parse::<Rate>(), Err(RateParseError::OutOfRange(_))));
        assert!(matches!("0%".parse::<Rate>(), Err(RateParseError::OutOfRange(_))));
    }

    #[test]
    fn decrease_stops_at_floor() {
        let mut s = InertialSpinner::default();
        for _ in 0..9 {
            assert!(s.decrease(Rate::Default).is_some());
        }
        assert!((s.velocity() - 0.005).abs() < 1e-9);
        let before = s.velocity();
        assert_eq!(s.decrease(Rate::Default), None);
        assert_eq!(s.increase(Rate::Default), None);
        assert_eq!(s.velocity(), before);
    }

    #[test]
    fn percent_rate_is_relative_to_current_velocity() {
        let mut s = InertialSpinner::default();
        let v = s.increase(Rate::Percent(10.0)).expect("applied");
        assert!((v - 0.055).abs() < 1e-12);
        let v = s.decrease(Rate::Absolute(0.005)).expect("applied");
        assert!((v - 0.05).abs() < 1e-12);
    }

    #[test]
    fn unusable_rates_leave_velocity_alone() {
        let mut s = InertialSpinner::default();
        assert_eq!(s.increase(Rate::Absolute(f64::NAN)), None);
        assert_eq!(s.increase(Rate::Absolute(-1.0)), None);
        assert_eq!(s.decrease(Rate::Percent(250.0)), None);
        assert_eq!(s.velocity(), 0.05);
        assert_eq!(s.set_velocity(f64::INFINITY), 0.05);
    }

    #[test]
    fn transition_table() {
        let mut s = InertialSpinner::default();
        assert_eq!(s.state(), SpinState::Paused);

        s.resume(ms(0.0));
        assert_eq!(s.state(), SpinState::Running);
        assert!(s.pause());
        assert!(!s.pause());
        assert_eq!(s.state(), SpinState::Paused);
        assert!(s.release_pause(ms(1.0)));
        assert_eq!(s.state(), SpinState::Running);

        assert!(s.stop());
        assert!(!s.pause());
        assert!(!s.release_pause(ms(2.0)));
        assert_eq!(s.state(), SpinState::Stopped);
        s.resume(ms(3.0));
        assert_eq!(s.state(), SpinState::Running);

        s.pause();
        assert!(s.stop());
        assert_eq!(s.state(), SpinState::Stopped);
    }

    #[test]
    fn tick_advances_longitude_by_velocity_times_elapsed() {
        let mut s = running();
        let mut rot = Rotation::default();
        assert!(s.tick(ms(100.0), &mut rot, true));
        assert!((rot.longitude - 5.0).abs() < 1e-12);
        assert_eq!(s.last_tick(), ms(100.0));
    }

    #[test]
    fn ticks_while_paused_still_rebase_time() {
        let mut s = running();
        let mut rot = Rotation::default();
        s.pause();
        assert!(!s.tick(ms(5000.0), &mut rot, true));
        assert_eq!(rot, Rotation::default());
        s.resume(ms(5000.0));
        s.tick(ms(5010.0), &mut rot, true);
        assert!((rot.longitude - 0.5).abs() < 1e-12);
    }

    #[test]
    fn stopped_spinner_never_moves() {
        let mut s = running();
        let mut rot = Rotation::new(42.0, 0.0, 0.0);
        s.stop();
        for t in 1..100 {
            s.tick(ms(f64::from(t) * 16.0), &mut rot, true);
        }
        assert_eq!(rot.longitude, 42.0);
    }

    #[test]
    fn non_rotatable_blocks_advance() {
        let mut s = running();
        let mut rot = Rotation::default();
        assert!(!s.tick(ms(100.0), &mut rot, false));
        assert_eq!(rot.longitude, 0.0);
        assert_eq!(s.last_tick(), ms(100.0));
    }

    #[test]
    fn spin_wraps_at_antimeridian() {
        let mut s = running();
        let mut rot = Rotation::new(179.0, 0.0, 0.0);
        s.tick(ms(40.0), &mut rot, true);
        assert!((rot.longitude - -179.0).abs() < 1e-9);
    }
}
