//! Recording fakes for the collaborator traits.

use std::cell::RefCell;
use std::rc::Rc;

use foundation::ids::{MarkerId, RouteId};
use foundation::math::{Rotation, Vec2};

use crate::markers::{Marker, MarkerPhase};
use crate::projection::{Projection, ProjectionSource};
use crate::render::{MarkerRenderer, PathRenderer, RouteRenderer};
use crate::style::ProjectionStyle;

/// Plate-carrée-like stand-in: `(lon, lat)` lands at
/// `center + offset + (lon, -lat)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeProjection {
    pub scale: f64,
    pub center: Vec2,
    pub offset: Vec2,
    pub rotation: Rotation,
    pub parallels: Option<[f64; 2]>,
}

impl Projection for FakeProjection {
    fn project(&self, longitude: f64, latitude: f64) -> Vec2 {
        self.center + self.offset + Vec2::new(longitude, -latitude)
    }

    fn invert(&self, point: Vec2) -> Option<[f64; 2]> {
        let local = point - self.center - self.offset;
        Some([local.x, -local.y])
    }

    fn rotate(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    fn scale(&mut self, value: f64) {
        self.scale = value;
    }

    fn translate(&mut self, point: Vec2) {
        self.center = point;
    }

    fn parallels(&mut self, parallels: [f64; 2]) {
        self.parallels = Some(parallels);
    }
}

/// Creates a [`FakeProjection`] for every style except the refused ids.
/// Each style id gets a distinct offset so tweens are observable.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    pub refused: Vec<String>,
    pub created: Rc<RefCell<Vec<String>>>,
}

impl ProjectionSource for FakeSource {
    fn create(&self, style: &ProjectionStyle) -> Option<Box<dyn Projection>> {
        if self.refused.contains(&style.id) {
            return None;
        }
        self.created.borrow_mut().push(style.id.clone());
        let offset = if style.rotatable {
            Vec2::ZERO
        } else {
            Vec2::new(100.0, 100.0)
        };
        Some(Box::new(FakeProjection {
            offset,
            ..FakeProjection::default()
        }))
    }
}

#[derive(Debug, Default)]
pub struct PathLog {
    pub redraws: usize,
    /// Screen position of `(0, 0)` at each redraw.
    pub origins: Vec<Vec2>,
}

#[derive(Debug, Clone)]
pub struct RecordingPaths {
    pub paths: usize,
    pub log: Rc<RefCell<PathLog>>,
}

impl Default for RecordingPaths {
    fn default() -> Self {
        Self {
            paths: 3,
            log: Rc::default(),
        }
    }
}

impl PathRenderer for RecordingPaths {
    fn redraw(&mut self, projection: &dyn Projection) {
        let origin = projection.project(0.0, 0.0);
        let mut log = self.log.borrow_mut();
        log.redraws += 1;
        log.origins.push(origin);
    }

    fn path_count(&self) -> usize {
        self.paths
    }
}

#[derive(Debug, Default)]
pub struct MarkerLog {
    pub draws: Vec<Vec<MarkerId>>,
    pub clears: usize,
    pub widths: Vec<(MarkerId, f64)>,
    pub animations: Vec<(MarkerId, Vec<MarkerPhase>)>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingMarkers {
    pub log: Rc<RefCell<MarkerLog>>,
}

impl MarkerRenderer for RecordingMarkers {
    fn draw(&mut self, markers: &[Marker], _projection: &dyn Projection) {
        self.log
            .borrow_mut()
            .draws
            .push(markers.iter().map(|m| m.id).collect());
    }

    fn clear(&mut self) {
        self.log.borrow_mut().clears += 1;
    }

    fn set_stroke_width(&mut self, marker: MarkerId, width: f64) {
        self.log.borrow_mut().widths.push((marker, width));
    }

    fn animate(&mut self, marker: MarkerId, phases: &[MarkerPhase]) {
        self.log
            .borrow_mut()
            .animations
            .push((marker, phases.to_vec()));
    }
}

#[derive(Debug, Default)]
pub struct RouteLog {
    pub progress: Vec<(RouteId, usize, f64)>,
    pub finished: Vec<RouteId>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingRoutes {
    pub log: Rc<RefCell<RouteLog>>,
}

impl RouteRenderer for RecordingRoutes {
    fn leg_progress(&mut self, route: RouteId, leg: usize, progress: f64) {
        self.log.borrow_mut().progress.push((route, leg, progress));
    }

    fn finished(&mut self, route: RouteId) {
        self.log.borrow_mut().finished.push(route);
    }
}
