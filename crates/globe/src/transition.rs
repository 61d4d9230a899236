//! Tweening from one projection style to another.

use foundation::math::{Rotation, Vec2};
use foundation::time::{Instant, TimeSpan};

use crate::projection::Projection;
use crate::style::ProjectionStyle;

pub const DEFAULT_TRANSITION_MS: f64 = 750.0;

/// Floors the requested duration; missing, non-finite or non-positive
/// requests fall back to 750ms.
pub fn transition_duration(requested: Option<f64>) -> f64 {
    match requested.map(f64::floor) {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => DEFAULT_TRANSITION_MS,
    }
}

/// A projection blending two others in screen space.
///
/// The blend works on flipped y, mirroring how the path stream is drawn
/// during a tween.
pub struct TweenProjection {
    source: Box<dyn Projection>,
    target: Box<dyn Projection>,
    t: f64,
}

impl TweenProjection {
    pub fn new(source: Box<dyn Projection>, target: Box<dyn Projection>) -> Self {
        Self {
            source,
            target,
            t: 0.0,
        }
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn set_t(&mut self, t: f64) {
        self.t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 1.0 };
    }

    pub fn into_target(self) -> Box<dyn Projection> {
        self.target
    }

    pub fn into_source(self) -> Box<dyn Projection> {
        self.source
    }
}

impl Projection for TweenProjection {
    fn project(&self, longitude: f64, latitude: f64) -> Vec2 {
        let flip = |p: Vec2| Vec2::new(p.x, -p.y);
        Vec2::lerp(
            flip(self.source.project(longitude, latitude)),
            flip(self.target.project(longitude, latitude)),
            self.t,
        )
    }

    /// Only the endpoints of a tween can be inverted.
    fn invert(&self, point: Vec2) -> Option<[f64; 2]> {
        if self.t <= 0.0 {
            self.source.invert(point)
        } else if self.t >= 1.0 {
            self.target.invert(point)
        } else {
            None
        }
    }

    fn rotate(&mut self, rotation: Rotation) {
        self.source.rotate(rotation);
        self.target.rotate(rotation);
    }

    fn scale(&mut self, value: f64) {
        self.source.scale(value);
        self.target.scale(value);
    }

    fn translate(&mut self, point: Vec2) {
        self.source.translate(point);
        self.target.translate(point);
    }
}

pub type CompletionCallback = Box<dyn FnOnce()>;

/// What a frame did to a running transition.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransitionStep {
    InProgress(f64),
    /// The final frame; returned exactly once.
    Completed,
    /// Nothing left to do.
    Done,
}

/// One in-flight style transition.
pub struct TransitionJob {
    tween: TweenProjection,
    target_style: ProjectionStyle,
    span: TimeSpan,
    in_flight: usize,
    on_complete: Option<CompletionCallback>,
    completed: bool,
}

impl TransitionJob {
    pub fn new(
        tween: TweenProjection,
        target_style: ProjectionStyle,
        started_at: Instant,
        duration_ms: f64,
        paths: usize,
    ) -> Self {
        Self {
            tween,
            target_style,
            span: TimeSpan::starting_at(started_at, duration_ms),
            in_flight: paths,
            on_complete: None,
            completed: false,
        }
    }

    pub fn with_completion(mut self, on_complete: CompletionCallback) -> Self {
        self.on_complete = Some(on_complete);
        self
    }

    pub fn target_style(&self) -> &ProjectionStyle {
        &self.target_style
    }

    pub fn duration_ms(&self) -> f64 {
        self.span.duration()
    }

    pub fn started_at(&self) -> Instant {
        self.span.start
    }

    /// Paths still tweening.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn projection(&self) -> &TweenProjection {
        &self.tween
    }

    /// Moves the tween to `now`. Reaching `t = 1` drains every in-flight
    /// path at once and reports `Completed` a single time.
    pub fn step(&mut self, now: Instant) -> TransitionStep {
        if self.completed {
            return TransitionStep::Done;
        }
        let t = self.span.progress(now);
        self.tween.set_t(t);
        if t >= 1.0 {
            self.in_flight = 0;
            self.completed = true;
            return TransitionStep::Completed;
        }
        TransitionStep::InProgress(t)
    }

    /// Projection the tween started from. Used when a newer transition
    /// takes over before this one completes.
    pub fn into_source(self) -> Box<dyn Projection> {
        self.tween.into_source()
    }

    /// Target style, target projection and the caller's callback.
    pub fn finish(self) -> (ProjectionStyle, Box<dyn Projection>, Option<CompletionCallback>) {
        (self.target_style, self.tween.into_target(), self.on_complete)
    }
}
