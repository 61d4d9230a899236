//! Headless driver for a [`GlobeEngine`]: scenario files, simple
//! projections and recording renderers.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use foundation::ids::{MarkerId, RouteId};
use foundation::math::{Rotation, Vec2};
use globe::{
    Collaborators, ConfigError, EventKind, GlobeConfig, GlobeEngine, GlobeEvent, Marker,
    MarkerPhase, MarkerRenderer, PathRenderer, Projection, ProjectionSource, ProjectionStyle,
    Rate, RateParseError, Route, RouteRenderer, Shape, TravelOptions,
};
use runtime::ManualClock;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STEP_MS: f64 = 16.0;
pub const DEFAULT_SAMPLE_MS: f64 = 100.0;

#[derive(Debug)]
pub enum ScenarioError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Config(ConfigError),
    Rate { at: f64, source: RateParseError },
    Invalid(String),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Io(e) => write!(f, "scenario io error: {e}"),
            ScenarioError::Json(e) => write!(f, "scenario json error: {e}"),
            ScenarioError::Config(e) => write!(f, "scenario config: {e}"),
            ScenarioError::Rate { at, source } => write!(f, "action at {at}ms: {source}"),
            ScenarioError::Invalid(msg) => write!(f, "invalid scenario: {msg}"),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScenarioError::Io(e) => Some(e),
            ScenarioError::Json(e) => Some(e),
            ScenarioError::Config(e) => Some(e),
            ScenarioError::Rate { source, .. } => Some(source),
            ScenarioError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ScenarioError {
    fn from(e: std::io::Error) -> Self {
        ScenarioError::Io(e)
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(e: serde_json::Error) -> Self {
        ScenarioError::Json(e)
    }
}

impl From<ConfigError> for ScenarioError {
    fn from(e: ConfigError) -> Self {
        ScenarioError::Config(e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub id: u64,
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub size: Option<f64>,
}

impl MarkerSpec {
    fn to_marker(&self) -> Marker {
        Marker {
            id: MarkerId::new(self.id),
            longitude: self.lon,
            latitude: self.lat,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub id: u64,
    pub origin: [f64; 2],
    pub to: Vec<[f64; 2]>,
}

impl RouteSpec {
    fn to_route(&self) -> Route {
        Route {
            id: RouteId::new(self.id),
            origin: self.origin,
            waypoints: self.to.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Render,
    SetStyle {
        style: String,
    },
    Pause,
    Resume,
    Stop,
    SetVelocity {
        velocity: f64,
    },
    IncreaseVelocity {
        #[serde(default)]
        rate: String,
    },
    DecreaseVelocity {
        #[serde(default)]
        rate: String,
    },
    DragStart {
        x: f64,
        y: f64,
    },
    DragMove {
        x: f64,
        y: f64,
    },
    DragEnd,
    Transition {
        style: String,
        #[serde(default)]
        duration_ms: Option<f64>,
    },
    SetMarkers {
        markers: Vec<MarkerSpec>,
    },
    SetMarkerAnimation {
        mode: String,
    },
    SetMarkerAnimationDuration {
        duration_ms: f64,
    },
    Travel {
        routes: Vec<RouteSpec>,
        #[serde(default)]
        duration_ms: Option<f64>,
        #[serde(default)]
        looping: bool,
        #[serde(default)]
        icon: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedAction {
    pub at: f64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: Option<GlobeConfig>,
    pub duration_ms: f64,
    #[serde(default = "default_step")]
    pub step_ms: f64,
    #[serde(default = "default_sample")]
    pub sample_every_ms: f64,
    #[serde(default)]
    pub actions: Vec<TimedAction>,
}

fn default_step() -> f64 {
    DEFAULT_STEP_MS
}

fn default_sample() -> f64 {
    DEFAULT_SAMPLE_MS
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        let mut scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        scenario
            .actions
            .sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(scenario)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.duration_ms.is_finite() && self.duration_ms >= 0.0) {
            return Err(ScenarioError::Invalid(format!(
                "duration_ms {} is not a non-negative number",
                self.duration_ms
            )));
        }
        if !(self.step_ms.is_finite() && self.step_ms >= 1.0) {
            return Err(ScenarioError::Invalid("step_ms must be at least 1".to_string()));
        }
        if !(self.sample_every_ms.is_finite() && self.sample_every_ms > 0.0) {
            return Err(ScenarioError::Invalid(
                "sample_every_ms must be positive".to_string(),
            ));
        }
        if let Some(config) = &self.config {
            config.validate()?;
        }
        for timed in &self.actions {
            if !(timed.at.is_finite() && timed.at >= 0.0) {
                return Err(ScenarioError::Invalid(format!(
                    "action time {} is not a non-negative number",
                    timed.at
                )));
            }
            match &timed.action {
                Action::IncreaseVelocity { rate } | Action::DecreaseVelocity { rate } => {
                    rate.parse::<Rate>().map_err(|source| ScenarioError::Rate {
                        at: timed.at,
                        source,
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Equirectangular projection; stands in for every flat style.
#[derive(Debug, Clone, PartialEq)]
pub struct Equirectangular {
    scale: f64,
    center: Vec2,
    rotation: Rotation,
}

impl Default for Equirectangular {
    fn default() -> Self {
        Self {
            scale: 150.0,
            center: Vec2::new(480.0, 250.0),
            rotation: Rotation::default(),
        }
    }
}

impl Projection for Equirectangular {
    fn project(&self, longitude: f64, latitude: f64) -> Vec2 {
        let lon = foundation::math::wrap_longitude(longitude + self.rotation.longitude);
        Vec2::new(
            self.center.x + self.scale * lon.to_radians(),
            self.center.y - self.scale * latitude.to_radians(),
        )
    }

    fn invert(&self, point: Vec2) -> Option<[f64; 2]> {
        let lon = ((point.x - self.center.x) / self.scale).to_degrees();
        let lat = ((self.center.y - point.y) / self.scale).to_degrees();
        if lon.abs() > 180.0 || lat.abs() > 90.0 {
            return None;
        }
        Some([
            foundation::math::wrap_longitude(lon - self.rotation.longitude),
            lat,
        ])
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
}

/// Orthographic projection; the rotatable globe.
#[derive(Debug, Clone, PartialEq)]
pub struct Orthographic {
    radius: f64,
    center: Vec2,
    rotation: Rotation,
}

impl Default for Orthographic {
    fn default() -> Self {
        Self {
            radius: 250.0,
            center: Vec2::new(480.0, 250.0),
            rotation: Rotation::default(),
        }
    }
}

impl Projection for Orthographic {
    fn project(&self, longitude: f64, latitude: f64) -> Vec2 {
        let lambda = (longitude + self.rotation.longitude).to_radians();
        let phi = latitude.to_radians();
        let phi0 = (-self.rotation.latitude).to_radians();
        let x = self.radius * phi.cos() * lambda.sin();
        let y = self.radius * (phi0.cos() * phi.sin() - phi0.sin() * phi.cos() * lambda.cos());
        Vec2::new(self.center.x + x, self.center.y - y)
    }

    fn invert(&self, point: Vec2) -> Option<[f64; 2]> {
        let x = point.x - self.center.x;
        let y = self.center.y - point.y;
        let rho = x.hypot(y);
        if rho > self.radius {
            return None;
        }
        let phi0 = (-self.rotation.latitude).to_radians();
        if rho == 0.0 {
            return Some([
                foundation::math::wrap_longitude(-self.rotation.longitude),
                phi0.to_degrees(),
            ]);
        }
        let c = (rho / self.radius).asin();
        let phi = (c.cos() * phi0.sin() + y * c.sin() * phi0.cos() / rho).asin();
        let lambda = (x * c.sin()).atan2(rho * phi0.cos() * c.cos() - y * phi0.sin() * c.sin());
        Some([
            foundation::math::wrap_longitude(lambda.to_degrees() - self.rotation.longitude),
            phi.to_degrees(),
        ])
    }

    fn rotate(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    fn scale(&mut self, value: f64) {
        self.radius = value;
    }

    fn translate(&mut self, point: Vec2) {
        self.center = point;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleProjections;

impl ProjectionSource for SimpleProjections {
    fn create(&self, style: &ProjectionStyle) -> Option<Box<dyn Projection>> {
        Some(match style.shape {
            Shape::Sphere => Box::new(Orthographic::default()),
            Shape::Rectangle => Box::new(Equirectangular::default()),
        })
    }
}

/// Counters shared by the recording renderers.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RenderStats {
    pub redraws: u64,
    pub marker_draws: u64,
    pub marker_cycles: u64,
    pub route_frames: u64,
    pub routes_finished: Vec<u64>,
    /// Screen position of `(0, 0)` at the last redraw.
    pub origin: Option<[f64; 2]>,
}

#[derive(Clone, Default)]
pub struct Recorder {
    stats: Rc<RefCell<RenderStats>>,
}

impl Recorder {
    pub fn stats(&self) -> RenderStats {
        self.stats.borrow().clone()
    }
}

impl PathRenderer for Recorder {
    fn redraw(&mut self, projection: &dyn Projection) {
        let origin = projection.project(0.0, 0.0);
        let mut stats = self.stats.borrow_mut();
        stats.redraws += 1;
        stats.origin = Some([origin.x, origin.y]);
    }

    fn path_count(&self) -> usize {
        1
    }
}

impl MarkerRenderer for Recorder {
    fn draw(&mut self, _markers: &[Marker], _projection: &dyn Projection) {
        self.stats.borrow_mut().marker_draws += 1;
    }

    fn clear(&mut self) {}

    fn set_stroke_width(&mut self, _marker: MarkerId, _width: f64) {}

    fn animate(&mut self, _marker: MarkerId, _phases: &[MarkerPhase]) {
        self.stats.borrow_mut().marker_cycles += 1;
    }
}

impl RouteRenderer for Recorder {
    fn leg_progress(&mut self, _route: RouteId, _leg: usize, _progress: f64) {
        self.stats.borrow_mut().route_frames += 1;
    }

    fn finished(&mut self, route: RouteId) {
        self.stats.borrow_mut().routes_finished.push(route.get());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub t_ms: f64,
    pub style: String,
    pub rotation: [f64; 3],
    pub velocity: f64,
    pub rotating: bool,
    pub transitioning: bool,
    /// Events published since the previous snapshot.
    pub events: Vec<String>,
    pub render: RenderStats,
}

/// Runs `scenario` on a fixed-step manual clock and returns one snapshot
/// per sample interval, plus a final one at the end.
pub fn simulate(scenario: &Scenario, config: &GlobeConfig) -> Result<Vec<Snapshot>, ScenarioError> {
    scenario.validate()?;
    let clock = ManualClock::new();
    let recorder = Recorder::default();
    let engine = GlobeEngine::new(
        config,
        Rc::new(clock.clone()),
        Collaborators {
            projections: Box::new(SimpleProjections),
            paths: Box::new(recorder.clone()),
            markers: Box::new(recorder.clone()),
            routes: Box::new(recorder.clone()),
        },
    );

    let events: Rc<RefCell<Vec<String>>> = Rc::default();
    for kind in EventKind::ALL {
        let events = events.clone();
        engine.on(kind.name(), move |e: &GlobeEvent| {
            events.borrow_mut().push(describe(e));
        });
    }

    let mut actions = scenario.actions.iter().peekable();
    let mut snapshots = Vec::new();
    let mut next_sample = 0.0;
    loop {
        let now = clock.frame().now.as_millis();
        while let Some(timed) = actions.next_if(|a| a.at <= now) {
            tracing::debug!(at = timed.at, now, action = ?timed.action, "apply");
            apply(&engine, &timed.action);
        }
        if now >= next_sample || now >= scenario.duration_ms {
            snapshots.push(snapshot(now, &engine, &recorder, &events));
            next_sample += scenario.sample_every_ms;
        }
        if now >= scenario.duration_ms {
            break;
        }
        clock.advance(scenario.step_ms.min(scenario.duration_ms - now));
    }
    engine.shutdown();
    Ok(snapshots)
}

fn describe(event: &GlobeEvent) -> String {
    match event {
        GlobeEvent::Accelerated { velocity } | GlobeEvent::Slowed { velocity } => {
            format!("{}({velocity})", event_name(event))
        }
        GlobeEvent::Rendered { style } => format!("rendered({style})"),
        _ => event_name(event).to_string(),
    }
}

fn event_name(event: &GlobeEvent) -> &'static str {
    use runtime::BusEvent;
    event.kind().name()
}

fn snapshot(
    now: f64,
    engine: &GlobeEngine,
    recorder: &Recorder,
    events: &RefCell<Vec<String>>,
) -> Snapshot {
    Snapshot {
        t_ms: now,
        style: engine.style().id,
        rotation: engine.rotation().as_array(),
        velocity: engine.velocity(),
        rotating: engine.is_rotating(),
        transitioning: engine.is_transitioning(),
        events: std::mem::take(&mut *events.borrow_mut()),
        render: recorder.stats(),
    }
}

fn apply(engine: &GlobeEngine, action: &Action) {
    // Rates were checked when the scenario was loaded.
    let rate = |s: &str| s.parse::<Rate>().unwrap_or_default();
    match action {
        Action::Render => {
            engine.render();
        }
        Action::SetStyle { style } => {
            engine.set_style(style);
        }
        Action::Pause => engine.pause(),
        Action::Resume => engine.resume(),
        Action::Stop => engine.stop(),
        Action::SetVelocity { velocity } => {
            engine.set_velocity(*velocity);
        }
        Action::IncreaseVelocity { rate: r } => {
            engine.increase_velocity(rate(r));
        }
        Action::DecreaseVelocity { rate: r } => {
            engine.decrease_velocity(rate(r));
        }
        Action::DragStart { x, y } => {
            engine.drag_start(Vec2::new(*x, *y));
        }
        Action::DragMove { x, y } => {
            engine.drag_move(Vec2::new(*x, *y));
        }
        Action::DragEnd => {
            engine.drag_end();
        }
        Action::Transition { style, duration_ms } => {
            engine.transition_to(style, *duration_ms);
        }
        Action::SetMarkers { markers } => {
            engine.set_markers(markers.iter().map(MarkerSpec::to_marker).collect());
        }
        Action::SetMarkerAnimation { mode } => {
            engine.set_marker_animation(mode);
        }
        Action::SetMarkerAnimationDuration { duration_ms } => {
            engine.set_marker_animation_duration(*duration_ms);
        }
        Action::Travel {
            routes,
            duration_ms,
            looping,
            icon,
        } => {
            let routes: Vec<Route> = routes.iter().map(RouteSpec::to_route).collect();
            engine.travel(
                &routes,
                TravelOptions {
                    duration_ms: *duration_ms,
                    looping: *looping,
                    icon: *icon,
                },
            );
        }
    }
}
