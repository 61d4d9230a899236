//! Drawing capabilities the engine drives. Element creation and styling
//! belong to the host.

use foundation::ids::{MarkerId, RouteId};

use crate::markers::{Marker, MarkerPhase};
use crate::projection::Projection;

pub trait PathRenderer {
    /// Redraws every displayed shape path through `projection`.
    fn redraw(&mut self, projection: &dyn Projection);

    /// Number of shape paths currently displayed.
    fn path_count(&self) -> usize;
}

pub trait MarkerRenderer {
    /// Replaces the drawn markers. New markers start with zero stroke width.
    fn draw(&mut self, markers: &[Marker], projection: &dyn Projection);

    fn clear(&mut self);

    /// Sets a marker's stroke width immediately.
    fn set_stroke_width(&mut self, marker: MarkerId, width: f64);

    /// Starts a chained stroke-width animation, interrupting any running one.
    fn animate(&mut self, marker: MarkerId, phases: &[MarkerPhase]);
}

pub trait RouteRenderer {
    /// `progress` runs from 0 (leg not yet drawn) to 1 (leg fully drawn).
    fn leg_progress(&mut self, route: RouteId, leg: usize, progress: f64);

    /// Called once when a one-shot plan has drawn its last leg.
    fn finished(&mut self, _route: RouteId) {}
}
