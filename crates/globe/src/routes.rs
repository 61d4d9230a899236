//! Leg-by-leg travel timing for routes.
//!
//! A route with `n` legs drawn over `D` milliseconds gives every leg `D / n`
//! ms, leg `i` starting at `i · D / n`. Looping plans restart on a fixed
//! period that leaves a short pause between cycles.

use foundation::ids::RouteId;
use foundation::time::{Instant, TimeSpan};

use crate::render::RouteRenderer;

pub const DEFAULT_TRAVEL_DURATION_MS: f64 = 1000.0;
/// Gap appended to every loop period.
pub const LOOP_GAP_MS: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    /// `[longitude, latitude]`.
    pub origin: [f64; 2],
    pub waypoints: Vec<[f64; 2]>,
}

impl Route {
    pub fn new(id: RouteId, origin: [f64; 2]) -> Self {
        Self {
            id,
            origin,
            waypoints: Vec::new(),
        }
    }

    pub fn to(mut self, waypoint: [f64; 2]) -> Self {
        self.waypoints.push(waypoint);
        self
    }

    /// Drops waypoints with non-finite coordinates. `None` when the origin is
    /// unusable or nothing is left to travel to.
    pub fn sanitized(&self) -> Option<Route> {
        if !is_position(self.origin) {
            return None;
        }
        let waypoints: Vec<[f64; 2]> = self
            .waypoints
            .iter()
            .copied()
            .filter(|p| is_position(*p))
            .collect();
        if waypoints.is_empty() {
            return None;
        }
        Some(Route {
            id: self.id,
            origin: self.origin,
            waypoints,
        })
    }

    pub fn leg_count(&self) -> usize {
        self.waypoints.len()
    }

    /// Endpoints of leg `i`.
    pub fn leg(&self, i: usize) -> Option<([f64; 2], [f64; 2])> {
        let to = *self.waypoints.get(i)?;
        let from = if i == 0 {
            self.origin
        } else {
            self.waypoints[i - 1]
        };
        Some((from, to))
    }
}

fn is_position(p: [f64; 2]) -> bool {
    p[0].is_finite() && p[1].is_finite()
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TravelOptions {
    /// Total time for all legs. Missing or NaN means 1000ms.
    pub duration_ms: Option<f64>,
    pub looping: bool,
    /// A travel icon rides along each leg. Without one only the dashes
    /// animate, and looping plans wait twice as long between cycles.
    pub icon: bool,
}

impl Default for TravelOptions {
    fn default() -> Self {
        Self {
            duration_ms: None,
            looping: false,
            icon: false,
        }
    }
}

impl TravelOptions {
    pub fn total_ms(&self) -> f64 {
        match self.duration_ms {
            Some(d) if d.is_finite() => d.floor().max(0.0),
            _ => DEFAULT_TRAVEL_DURATION_MS,
        }
    }
}

/// Timing for one route.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    route: Route,
    leg_ms: f64,
    total_ms: f64,
    period_ms: Option<f64>,
}

impl RoutePlan {
    pub fn new(route: Route, options: &TravelOptions) -> Self {
        let total_ms = options.total_ms();
        let legs = route.leg_count().max(1);
        let period_ms = options.looping.then(|| {
            if options.icon {
                total_ms + LOOP_GAP_MS
            } else {
                total_ms * 2.0 + LOOP_GAP_MS
            }
        });
        Self {
            route,
            leg_ms: total_ms / legs as f64,
            total_ms,
            period_ms,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn leg_ms(&self) -> f64 {
        self.leg_ms
    }

    pub fn total_ms(&self) -> f64 {
        self.total_ms
    }

    /// Loop period, `None` for one-shot plans.
    pub fn period_ms(&self) -> Option<f64> {
        self.period_ms
    }

    /// Active window of leg `i` in a cycle starting at `cycle_start`.
    pub fn leg_span(&self, i: usize, cycle_start: Instant) -> TimeSpan {
        TimeSpan::starting_at(cycle_start.add_millis(self.leg_ms * i as f64), self.leg_ms)
    }

    /// Progress of every leg `elapsed_ms` after the plan started. Looping
    /// plans fold `elapsed_ms` into the current cycle.
    pub fn progress_at(&self, elapsed_ms: f64) -> Vec<f64> {
        let local = match self.period_ms {
            Some(period) if period > 0.0 => elapsed_ms.max(0.0) % period,
            _ => elapsed_ms.max(0.0),
        };
        let start = Instant::ZERO;
        let now = Instant::from_millis(local);
        (0..self.route.leg_count())
            .map(|i| self.leg_span(i, start).progress(now))
            .collect()
    }

    /// One-shot plans finish once the last leg is drawn.
    pub fn is_finished(&self, elapsed_ms: f64) -> bool {
        self.period_ms.is_none() && elapsed_ms >= self.total_ms
    }
}

/// Every plan started by one travel request, sharing a start time.
#[derive(Debug, Clone)]
pub struct RouteAnimationScheduler {
    plans: Vec<RoutePlan>,
    started_at: Instant,
    finished: bool,
}

impl RouteAnimationScheduler {
    /// Invalid routes are dropped; the scheduler may end up empty.
    pub fn new(routes: &[Route], options: &TravelOptions, now: Instant) -> Self {
        let plans = routes
            .iter()
            .filter_map(Route::sanitized)
            .map(|r| RoutePlan::new(r, options))
            .collect();
        Self {
            plans,
            started_at: now,
            finished: false,
        }
    }

    pub fn plans(&self) -> &[RoutePlan] {
        &self.plans
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reports every leg's progress at `now`. Returns `false` once all
    /// plans have finished; the last frame is still reported.
    pub fn frame(&mut self, now: Instant, renderer: &mut dyn RouteRenderer) -> bool {
        if self.finished {
            return false;
        }
        let elapsed = now.since(self.started_at);
        for plan in &self.plans {
            for (leg, progress) in plan.progress_at(elapsed).into_iter().enumerate() {
                renderer.leg_progress(plan.route.id, leg, progress);
            }
        }
        if self.plans.iter().all(|p| p.is_finished(elapsed)) {
            for plan in &self.plans {
                renderer.finished(plan.route.id);
            }
            self.finished = true;
            return false;
        }
        true
    }
}
