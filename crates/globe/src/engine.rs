//! The per-map engine: wires the interaction and animation components to
//! the host's projection library, renderers and clock.
//!
//! All state lives behind one `RefCell`. Clock callbacks hold a `Weak`
//! reference, so timers outliving the engine do nothing. Events are
//! published only after the state borrow is released, which lets handlers
//! call back into the engine.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use foundation::ids::MarkerId;
use foundation::math::{Rotation, Vec2};
use foundation::time::Instant;
use runtime::{BusEvent, Clock, EventBus, Frame, TimerCallback, TimerHandle, dispatch};

use crate::config::GlobeConfig;
use crate::drag::PointerDragController;
use crate::events::{EventKind, GlobeEvent};
use crate::markers::{Marker, MarkerAnimation, MarkerAnimationScheduler, MarkerPhase};
use crate::projection::{Projection, ProjectionSource, Viewport, prepare};
use crate::render::{MarkerRenderer, PathRenderer, RouteRenderer};
use crate::routes::{Route, RouteAnimationScheduler, TravelOptions};
use crate::spinner::{InertialSpinner, Rate, SpinState};
use crate::style::{ProjectionStyle, StyleRegistry};
use crate::transition::{
    CompletionCallback, TransitionJob, TransitionStep, TweenProjection, transition_duration,
};

/// Host-provided capabilities.
pub struct Collaborators {
    pub projections: Box<dyn ProjectionSource>,
    pub paths: Box<dyn PathRenderer>,
    pub markers: Box<dyn MarkerRenderer>,
    pub routes: Box<dyn RouteRenderer>,
}

#[derive(Default)]
struct Timers {
    spin: Option<TimerHandle>,
    markers: Option<TimerHandle>,
    transition: Option<TimerHandle>,
}

struct Travel {
    timer: Option<TimerHandle>,
    scheduler: RouteAnimationScheduler,
}

struct EngineState {
    registry: StyleRegistry,
    style: ProjectionStyle,
    projection: Option<Box<dyn Projection>>,
    viewport: Viewport,
    rotation: Rotation,
    spinner: InertialSpinner,
    drag: PointerDragController,
    transition: Option<TransitionJob>,
    markers: Vec<Marker>,
    marker_animation: MarkerAnimationScheduler,
    travels: BTreeMap<u64, Travel>,
    next_travel: u64,
    timers: Timers,
    collaborators: Collaborators,
    rendered: bool,
    shut_down: bool,
}

impl EngineState {
    /// Pushes the current rotation into the projection and redraws.
    fn redraw(&mut self) {
        if let Some(projection) = self.projection.as_mut() {
            projection.rotate(self.rotation);
            self.collaborators.paths.redraw(&**projection);
        }
    }

    fn markers_live(&self) -> bool {
        self.rendered && self.transition.is_none() && !self.shut_down
    }
}

struct Shared {
    clock: Rc<dyn Clock>,
    state: RefCell<EngineState>,
    bus: RefCell<EventBus<GlobeEvent>>,
}

impl Shared {
    fn emit(&self, event: GlobeEvent) {
        let handlers = {
            let mut bus = self.bus.borrow_mut();
            bus.note_published();
            bus.handlers_for(event.kind())
        };
        tracing::trace!(event = %event.kind(), handlers = handlers.len(), "publish");
        dispatch(&handlers, &event);
    }

    fn timer(self: &Rc<Self>, on_frame: impl Fn(&Rc<Shared>, Instant) + 'static) -> TimerCallback {
        let weak: Weak<Shared> = Rc::downgrade(self);
        Box::new(move |frame: Frame| {
            if let Some(shared) = weak.upgrade() {
                on_frame(&shared, frame.now);
            }
        })
    }

    fn cancel(&self, handle: &mut Option<TimerHandle>) {
        if let Some(h) = handle.take() {
            self.clock.cancel(h);
        }
    }

    fn ensure_spin_loop(self: &Rc<Self>, st: &mut EngineState) {
        if st.timers.spin.is_some() || !st.markers_live() {
            return;
        }
        let callback = self.timer(|shared, now| shared.spin_frame(now));
        st.timers.spin = Some(self.clock.schedule_frame(callback));
    }

    fn spin_frame(&self, now: Instant) {
        let Ok(mut guard) = self.state.try_borrow_mut() else {
            return;
        };
        let st = &mut *guard;
        let can_advance = st.style.rotatable && !st.drag.is_dragging() && st.transition.is_none();
        if st.spinner.tick(now, &mut st.rotation, can_advance) {
            st.redraw();
        }
    }

    /// Redraws the markers and (re)starts their animation timer.
    fn restart_markers(self: &Rc<Self>, st: &mut EngineState) {
        self.cancel(&mut st.timers.markers);
        st.collaborators.markers.clear();
        if st.markers.is_empty() || !st.markers_live() {
            return;
        }
        let Some(projection) = st.projection.as_deref() else {
            return;
        };
        st.collaborators.markers.draw(&st.markers, projection);
        match st.marker_animation.interval_ms() {
            None => st
                .marker_animation
                .apply_static(st.collaborators.markers.as_mut()),
            Some(interval) => {
                let callback = self.timer(|shared, _| shared.marker_cycle());
                st.timers.markers = Some(self.clock.schedule_repeating(callback, interval));
            }
        }
    }

    fn marker_cycle(&self) {
        let Ok(mut guard) = self.state.try_borrow_mut() else {
            return;
        };
        let st = &mut *guard;
        st.marker_animation
            .play_cycle(st.collaborators.markers.as_mut());
    }

    /// Engine reaction to `rendered`, registered ahead of any user handler.
    fn after_render(self: &Rc<Self>) {
        let now = self.clock.now();
        let Ok(mut guard) = self.state.try_borrow_mut() else {
            return;
        };
        let st = &mut *guard;
        if st.spinner.state() != SpinState::Stopped && !st.drag.is_dragging() {
            st.spinner.resume(now);
        }
        self.ensure_spin_loop(st);
        self.restart_markers(st);
    }

    /// Renders `style`, or the current style when `None`.
    fn render_style(self: &Rc<Self>, style: Option<ProjectionStyle>) -> bool {
        let name = {
            let mut guard = self.state.borrow_mut();
            let st = &mut *guard;
            if st.shut_down {
                return false;
            }
            let style = style.unwrap_or_else(|| st.style.clone());
            let Some(mut projection) = st.collaborators.projections.create(&style) else {
                tracing::debug!(style = %style.id, "no projection available; render dropped");
                return false;
            };
            if st.transition.take().is_some() {
                tracing::debug!("render interrupts running transition");
            }
            self.cancel(&mut st.timers.transition);
            if !style.rotatable {
                if st.drag.on_drag_end().is_some() {
                    tracing::debug!(style = %style.id, "drag ended by flat style");
                }
                st.rotation = Rotation::default();
            }
            prepare(projection.as_mut(), &style, st.viewport);
            st.projection = Some(projection);
            st.style = style;
            st.rendered = true;
            st.redraw();
            tracing::info!(style = %st.style.id, "rendered");
            st.style.name.clone()
        };
        self.emit(GlobeEvent::Rendered { style: name });
        true
    }

    fn transition_frame(self: &Rc<Self>, now: Instant) {
        let callback = {
            let Ok(mut guard) = self.state.try_borrow_mut() else {
                return;
            };
            let st = &mut *guard;
            let Some(job) = st.transition.as_mut() else {
                return;
            };
            match job.step(now) {
                TransitionStep::InProgress(t) => {
                    tracing::trace!(t, "transition frame");
                    st.collaborators.paths.redraw(job.projection());
                    return;
                }
                TransitionStep::Done => return,
                TransitionStep::Completed => {}
            }
            let Some(job) = st.transition.take() else {
                return;
            };
            self.cancel(&mut st.timers.transition);
            let (style, projection, callback) = job.finish();
            tracing::info!(style = %style.id, "transition complete");
            st.style = style;
            st.projection = Some(projection);
            st.redraw();
            self.restart_markers(st);
            if st.spinner.state() != SpinState::Stopped {
                st.spinner.resume(now);
            }
            self.ensure_spin_loop(st);
            callback
        };
        if let Some(callback) = callback {
            callback();
        }
    }

    fn travel_frame(&self, id: u64, now: Instant) {
        let Ok(mut guard) = self.state.try_borrow_mut() else {
            return;
        };
        let st = &mut *guard;
        let Some(travel) = st.travels.get_mut(&id) else {
            return;
        };
        if !travel
            .scheduler
            .frame(now, st.collaborators.routes.as_mut())
        {
            if let Some(mut travel) = st.travels.remove(&id) {
                self.cancel(&mut travel.timer);
            }
        }
    }
}

/// A rotatable world map's interaction and animation engine.
pub struct GlobeEngine {
    shared: Rc<Shared>,
}

impl GlobeEngine {
    pub fn new(config: &GlobeConfig, clock: Rc<dyn Clock>, collaborators: Collaborators) -> Self {
        Self::with_registry(config, StyleRegistry::builtin(), clock, collaborators)
    }

    /// Unknown configured styles fall back to the globe.
    pub fn with_registry(
        config: &GlobeConfig,
        registry: StyleRegistry,
        clock: Rc<dyn Clock>,
        collaborators: Collaborators,
    ) -> Self {
        let style = registry
            .lookup(&config.style)
            .or_else(|| {
                tracing::debug!(style = %config.style, "unknown style; using globe");
                registry.lookup("globe")
            })
            .cloned()
            .unwrap_or_else(|| ProjectionStyle::sphere("globe", "Globe"));

        let state = EngineState {
            style,
            projection: None,
            viewport: Viewport::new(config.width, config.height),
            rotation: Rotation::default(),
            spinner: InertialSpinner::new(
                config.velocity,
                config.velocity_step,
                config.velocity_floor,
                clock.now(),
            ),
            drag: PointerDragController::new(),
            transition: None,
            markers: Vec::new(),
            marker_animation: MarkerAnimationScheduler::new(
                config.marker_animation,
                config.marker_animation_duration_ms,
                config.marker_size,
            ),
            travels: BTreeMap::new(),
            next_travel: 0,
            timers: Timers::default(),
            collaborators,
            rendered: false,
            shut_down: false,
            registry,
        };
        let shared = Rc::new(Shared {
            clock,
            state: RefCell::new(state),
            bus: RefCell::new(EventBus::new()),
        });

        let weak = Rc::downgrade(&shared);
        shared
            .bus
            .borrow_mut()
            .subscribe(EventKind::Rendered, move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.after_render();
                }
            });

        Self { shared }
    }

    /// Subscribes to a named event. Unknown names return `false`.
    pub fn on(&self, event: &str, handler: impl Fn(&GlobeEvent) + 'static) -> bool {
        let ok = self.shared.bus.borrow_mut().subscribe_named(event, handler);
        if !ok {
            tracing::debug!(event, "ignoring subscription to unknown event");
        }
        ok
    }

    /// Draws the map in the current style and publishes `rendered`.
    /// Returns `false` when no projection is available for the style.
    pub fn render(&self) -> bool {
        self.shared.render_style(None)
    }

    pub fn is_rendered(&self) -> bool {
        self.shared.state.borrow().rendered
    }

    /// Switches style without a tween. A rendered map is redrawn at once.
    pub fn set_style(&self, name: &str) -> bool {
        let style = {
            let mut st = self.shared.state.borrow_mut();
            let Some(style) = st.registry.lookup(name).cloned() else {
                tracing::debug!(style = name, "unknown style");
                return false;
            };
            if !st.rendered {
                if !style.rotatable {
                    st.rotation = Rotation::default();
                }
                st.style = style;
                return true;
            }
            style
        };
        self.shared.render_style(Some(style))
    }

    pub fn style(&self) -> ProjectionStyle {
        self.shared.state.borrow().style.clone()
    }

    pub fn supported_styles(&self) -> Vec<String> {
        let st = self.shared.state.borrow();
        st.registry.names().into_iter().map(str::to_string).collect()
    }

    pub fn rotatable(&self) -> bool {
        self.shared.state.borrow().style.rotatable
    }

    pub fn is_rotating(&self) -> bool {
        let st = self.shared.state.borrow();
        st.style.rotatable && st.spinner.is_running()
    }

    pub fn rotation(&self) -> Rotation {
        self.shared.state.borrow().rotation
    }

    /// Ignored for styles that do not rotate.
    pub fn set_rotation(&self, rotation: Rotation) -> bool {
        let mut st = self.shared.state.borrow_mut();
        if st.shut_down || !st.style.rotatable || st.transition.is_some() {
            return false;
        }
        st.rotation = rotation.normalize();
        st.redraw();
        true
    }

    pub fn viewport(&self) -> Viewport {
        self.shared.state.borrow().viewport
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        let mut guard = self.shared.state.borrow_mut();
        let st = &mut *guard;
        st.viewport = viewport;
        if let Some(projection) = st.projection.as_mut() {
            prepare(projection.as_mut(), &st.style, viewport);
            st.redraw();
        }
    }

    pub fn velocity(&self) -> f64 {
        self.shared.state.borrow().spinner.velocity()
    }

    /// Non-finite values are ignored. Returns the velocity in effect.
    pub fn set_velocity(&self, velocity: f64) -> f64 {
        let mut st = self.shared.state.borrow_mut();
        if st.shut_down {
            return st.spinner.velocity();
        }
        st.spinner.set_velocity(velocity)
    }

    /// Publishes `accelerated` when applied. Refused changes return the
    /// current velocity.
    pub fn increase_velocity(&self, rate: impl Into<Rate>) -> f64 {
        let rate = rate.into();
        let (applied, velocity) = {
            let mut st = self.shared.state.borrow_mut();
            if st.shut_down {
                return st.spinner.velocity();
            }
            let applied = st.spinner.increase(rate);
            (applied, st.spinner.velocity())
        };
        match applied {
            Some(v) => self.shared.emit(GlobeEvent::Accelerated { velocity: v }),
            None => tracing::debug!(?rate, velocity, "velocity increase refused"),
        }
        velocity
    }

    /// Publishes `slowed` when applied.
    pub fn decrease_velocity(&self, rate: impl Into<Rate>) -> f64 {
        let rate = rate.into();
        let (applied, velocity) = {
            let mut st = self.shared.state.borrow_mut();
            if st.shut_down {
                return st.spinner.velocity();
            }
            let applied = st.spinner.decrease(rate);
            (applied, st.spinner.velocity())
        };
        match applied {
            Some(v) => self.shared.emit(GlobeEvent::Slowed { velocity: v }),
            None => tracing::debug!(?rate, velocity, "velocity decrease refused"),
        }
        velocity
    }

    /// Always publishes `paused`, unless the engine is shut down.
    pub fn pause(&self) {
        {
            let mut st = self.shared.state.borrow_mut();
            if st.shut_down {
                return;
            }
            st.spinner.pause();
        }
        self.shared.emit(GlobeEvent::Paused);
    }

    /// Clears a pause or a stop and publishes `resumed`.
    pub fn resume(&self) {
        {
            let now = self.shared.clock.now();
            let mut guard = self.shared.state.borrow_mut();
            let st = &mut *guard;
            if st.shut_down {
                return;
            }
            st.spinner.resume(now);
            self.shared.ensure_spin_loop(st);
        }
        self.shared.emit(GlobeEvent::Resumed);
    }

    /// Stops spinning until the next explicit `resume`.
    pub fn stop(&self) {
        let mut st = self.shared.state.borrow_mut();
        if !st.shut_down {
            st.spinner.stop();
        }
    }

    /// Starts a drag and pauses the spinner. Ignored for styles that do not
    /// rotate, during transitions, and while a drag is already running.
    pub fn drag_start(&self, pointer: Vec2) -> bool {
        let started = {
            let mut guard = self.shared.state.borrow_mut();
            let st = &mut *guard;
            if st.shut_down || !st.style.rotatable || st.transition.is_some() {
                return false;
            }
            let started = st.drag.on_drag_start(pointer, st.rotation);
            if started {
                st.spinner.pause();
            }
            started
        };
        if started {
            self.shared.emit(GlobeEvent::Paused);
        }
        started
    }

    /// Same guards as [`drag_start`](Self::drag_start).
    pub fn drag_move(&self, pointer: Vec2) -> bool {
        let mut guard = self.shared.state.borrow_mut();
        let st = &mut *guard;
        if st.shut_down || !st.style.rotatable || st.transition.is_some() {
            return false;
        }
        let Some(rotation) = st.drag.on_drag_move(pointer, st.rotation, st.viewport) else {
            return false;
        };
        st.rotation = rotation;
        st.redraw();
        true
    }

    /// Ends the drag. A paused spinner picks up again; a stopped one stays
    /// stopped.
    pub fn drag_end(&self) -> bool {
        let now = self.shared.clock.now();
        let mut st = self.shared.state.borrow_mut();
        if st.drag.on_drag_end().is_none() {
            return false;
        }
        st.spinner.release_pause(now);
        true
    }

    /// Tweens to `style` over `duration_ms` (750ms when missing or invalid).
    pub fn transition_to(&self, style: &str, duration_ms: Option<f64>) -> bool {
        self.transition_to_with(style, duration_ms, || {})
    }

    /// Like [`transition_to`](Self::transition_to), calling `on_complete`
    /// once the new style is installed. A transition replaced by a newer
    /// one never completes. Before the first render the style is installed
    /// at once.
    pub fn transition_to_with(
        &self,
        style: &str,
        duration_ms: Option<f64>,
        on_complete: impl FnOnce() + 'static,
    ) -> bool {
        let callback: CompletionCallback = Box::new(on_complete);
        let now = self.shared.clock.now();
        let immediate = {
            let mut guard = self.shared.state.borrow_mut();
            let st = &mut *guard;
            if st.shut_down {
                return false;
            }
            let Some(target_style) = st.registry.lookup(style).cloned() else {
                tracing::debug!(style, "unknown style; transition dropped");
                return false;
            };
            if !st.rendered {
                if !target_style.rotatable {
                    st.rotation = Rotation::default();
                }
                st.style = target_style;
                Some(callback)
            } else {
                let Some(mut target) = st.collaborators.projections.create(&target_style) else {
                    tracing::debug!(style = %target_style.id, "no projection; transition dropped");
                    return false;
                };
                let source = match st.transition.take() {
                    Some(previous) => {
                        tracing::debug!(
                            style = %previous.target_style().id,
                            "transition superseded"
                        );
                        previous.into_source()
                    }
                    None => match st.projection.take() {
                        Some(p) => p,
                        None => match st.collaborators.projections.create(&st.style) {
                            Some(p) => p,
                            None => return false,
                        },
                    },
                };
                prepare(target.as_mut(), &target_style, st.viewport);

                let shared = &self.shared;
                shared.cancel(&mut st.timers.transition);
                shared.cancel(&mut st.timers.spin);
                shared.cancel(&mut st.timers.markers);
                st.collaborators.markers.clear();
                if st.drag.on_drag_end().is_some() {
                    tracing::debug!("drag ended by transition");
                }
                st.rotation = Rotation::default();

                let mut tween = TweenProjection::new(source, target);
                tween.rotate(st.rotation);
                let duration = transition_duration(duration_ms);
                let paths = st.collaborators.paths.path_count();
                tracing::info!(
                    from = %st.style.id,
                    to = %target_style.id,
                    duration,
                    paths,
                    "transition started"
                );
                st.transition = Some(
                    TransitionJob::new(tween, target_style, now, duration, paths)
                        .with_completion(callback),
                );
                let frame = shared.timer(|shared, now| shared.transition_frame(now));
                st.timers.transition = Some(shared.clock.schedule_frame(frame));
                None
            }
        };
        if let Some(callback) = immediate {
            callback();
        }
        true
    }

    pub fn is_transitioning(&self) -> bool {
        self.shared.state.borrow().transition.is_some()
    }

    /// Replaces the marker dataset. Drawn right away on a rendered map.
    pub fn set_markers(&self, markers: Vec<Marker>) {
        let mut guard = self.shared.state.borrow_mut();
        let st = &mut *guard;
        st.marker_animation.load(&markers);
        st.markers = markers;
        if st.markers_live() {
            self.shared.restart_markers(st);
        }
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.shared.state.borrow().markers.clone()
    }

    /// Accepts `pulse`, `ping` or `none` in any case; anything else is
    /// ignored.
    pub fn set_marker_animation(&self, mode: &str) -> bool {
        let Ok(mode) = mode.parse::<MarkerAnimation>() else {
            tracing::debug!(mode, "unknown marker animation");
            return false;
        };
        let mut guard = self.shared.state.borrow_mut();
        let st = &mut *guard;
        st.marker_animation.set_mode(mode);
        if st.markers_live() {
            self.shared.restart_markers(st);
        }
        true
    }

    pub fn marker_animation(&self) -> MarkerAnimation {
        self.shared.state.borrow().marker_animation.mode()
    }

    /// Accepts durations above 100ms. Returns the duration in effect.
    pub fn set_marker_animation_duration(&self, duration_ms: f64) -> f64 {
        let mut guard = self.shared.state.borrow_mut();
        let st = &mut *guard;
        let before = st.marker_animation.duration_ms();
        let after = st.marker_animation.set_duration(duration_ms);
        if after != before && st.markers_live() {
            self.shared.restart_markers(st);
        }
        after
    }

    pub fn marker_phase_plan(&self) -> Vec<(MarkerId, Vec<MarkerPhase>)> {
        self.shared.state.borrow().marker_animation.plan()
    }

    /// Animates travel along `routes`. Returns how many routes were
    /// accepted.
    pub fn travel(&self, routes: &[Route], options: TravelOptions) -> usize {
        let now = self.shared.clock.now();
        let mut st = self.shared.state.borrow_mut();
        if st.shut_down {
            return 0;
        }
        let scheduler = RouteAnimationScheduler::new(routes, &options, now);
        if scheduler.is_empty() {
            tracing::debug!(requested = routes.len(), "no travelable routes");
            return 0;
        }
        let accepted = scheduler.plans().len();
        let id = st.next_travel;
        st.next_travel += 1;
        let frame = self
            .shared
            .timer(move |shared, now| shared.travel_frame(id, now));
        let timer = Some(self.shared.clock.schedule_frame(frame));
        st.travels.insert(id, Travel { timer, scheduler });
        tracing::info!(routes = accepted, looping = options.looping, "travel started");
        accepted
    }

    /// Cancels every timer the engine owns. Terminal.
    pub fn shutdown(&self) {
        let Ok(mut guard) = self.shared.state.try_borrow_mut() else {
            return;
        };
        let st = &mut *guard;
        if st.shut_down {
            return;
        }
        st.shut_down = true;
        let shared = &self.shared;
        shared.cancel(&mut st.timers.spin);
        shared.cancel(&mut st.timers.markers);
        shared.cancel(&mut st.timers.transition);
        for (_, mut travel) in std::mem::take(&mut st.travels) {
            shared.cancel(&mut travel.timer);
        }
        st.transition = None;
        st.spinner.stop();
        tracing::info!("globe engine shut down");
    }
}

impl Drop for GlobeEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{Collaborators, GlobeEngine};
    use crate::config::GlobeConfig;
    use crate::events::{EventKind, GlobeEvent};
    use crate::markers::{Marker, MarkerAnimation};
    use crate::projection::Viewport;
    use crate::routes::{Route, TravelOptions};
    use crate::spinner::Rate;
    use crate::testing::{
        FakeSource, MarkerLog, PathLog, RecordingMarkers, RecordingPaths, RecordingRoutes,
        RouteLog,
    };
    use foundation::ids::{MarkerId, RouteId};
    use foundation::math::{Rotation, Vec2};
    use pretty_assertions::assert_eq;
    use runtime::{BusEvent, ManualClock};

    struct Harness {
        clock: ManualClock,
        engine: GlobeEngine,
        paths: Rc<RefCell<PathLog>>,
        markers: Rc<RefCell<MarkerLog>>,
        routes: Rc<RefCell<RouteLog>>,
        events: Rc<RefCell<Vec<GlobeEvent>>>,
    }

    impl Harness {
        fn longitude(&self) -> f64 {
            self.engine.rotation().longitude
        }

        fn event_kinds(&self) -> Vec<EventKind> {
            self.events.borrow().iter().map(|e| e.kind()).collect()
        }
    }

    fn harness_with(config: GlobeConfig, refused: &[&str]) -> Harness {
        let clock = ManualClock::new();
        let paths = RecordingPaths::default();
        let markers = RecordingMarkers::default();
        let routes = RecordingRoutes::default();
        let (path_log, marker_log, route_log) =
            (paths.log.clone(), markers.log.clone(), routes.log.clone());
        let source = FakeSource {
            refused: refused.iter().map(|s| s.to_string()).collect(),
            ..FakeSource::default()
        };
        let engine = GlobeEngine::new(
            &config,
            Rc::new(clock.clone()),
            Collaborators {
                projections: Box::new(source),
                paths: Box::new(paths),
                markers: Box::new(markers),
                routes: Box::new(routes),
            },
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        for kind in EventKind::ALL {
            let events = events.clone();
            assert!(engine.on(kind.name(), move |e| events.borrow_mut().push(e.clone())));
        }
        Harness {
            clock,
            engine,
            paths: path_log,
            markers: marker_log,
            routes: route_log,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(GlobeConfig::default(), &[])
    }

    fn marker(id: u64, size: f64) -> Marker {
        Marker::new(MarkerId::new(id), 0.0, 0.0).with_size(size)
    }

    #[test]
    fn render_publishes_and_starts_spinning() {
        let h = harness();
        assert!(!h.engine.is_rotating());
        assert!(h.engine.render());
        assert_eq!(
            *h.events.borrow(),
            vec![GlobeEvent::Rendered {
                style: "Globe".to_string()
            }]
        );
        assert!(h.engine.is_rendered());
        assert!(h.engine.is_rotating());

        h.clock.advance(100.0);
        assert_eq!(h.longitude(), 5.0);
        assert_eq!(h.paths.borrow().redraws, 2);
    }

    #[test]
    fn pause_and_resume_do_not_integrate_the_pause() {
        let h = harness();
        h.engine.render();
        h.clock.advance(100.0);
        h.engine.pause();
        assert!(!h.engine.is_rotating());
        h.clock.advance(1000.0);
        assert_eq!(h.longitude(), 5.0);

        h.engine.resume();
        assert!(h.engine.is_rotating());
        h.clock.advance(10.0);
        assert_eq!(h.longitude(), 5.5);
        assert_eq!(
            h.event_kinds(),
            vec![EventKind::Rendered, EventKind::Paused, EventKind::Resumed]
        );
    }

    #[test]
    fn stop_holds_until_explicit_resume() {
        let h = harness();
        h.engine.render();
        h.engine.stop();
        h.clock.run_for(500.0, 16.0);
        assert_eq!(h.longitude(), 0.0);

        assert!(h.engine.drag_start(Vec2::new(0.0, 0.0)));
        assert!(h.engine.drag_end());
        h.clock.advance(100.0);
        assert_eq!(h.longitude(), 0.0);

        h.engine.resume();
        h.clock.advance(20.0);
        assert_eq!(h.longitude(), 1.0);
    }

    #[test]
    fn drag_rotates_and_release_resumes_spin() {
        let h = harness_with(
            GlobeConfig {
                width: 360.0,
                height: 360.0,
                ..GlobeConfig::default()
            },
            &[],
        );
        h.engine.render();
        h.clock.advance(100.0);
        assert_eq!(h.longitude(), 5.0);

        assert!(h.engine.drag_start(Vec2::new(100.0, 100.0)));
        assert!(!h.engine.is_rotating());
        h.clock.advance(100.0);
        assert_eq!(h.longitude(), 5.0);

        assert!(h.engine.drag_move(Vec2::new(110.0, 100.0)));
        assert_eq!(h.longitude(), 10.0);

        assert!(h.engine.drag_end());
        assert!(!h.engine.drag_move(Vec2::new(200.0, 100.0)));
        h.clock.advance(20.0);
        assert_eq!(h.longitude(), 11.0);
        assert_eq!(h.event_kinds(), vec![EventKind::Rendered, EventKind::Paused]);
    }

    #[test]
    fn flat_styles_ignore_drags_and_never_spin() {
        let h = harness_with(
            GlobeConfig {
                style: "Mollweide".to_string(),
                ..GlobeConfig::default()
            },
            &[],
        );
        h.engine.render();
        assert!(!h.engine.rotatable());
        assert!(!h.engine.is_rotating());
        assert!(!h.engine.drag_start(Vec2::ZERO));
        assert!(!h.engine.set_rotation(Rotation::new(10.0, 0.0, 0.0)));
        h.clock.run_for(200.0, 16.0);
        assert_eq!(h.engine.rotation(), Rotation::default());
    }

    #[test]
    fn velocity_changes_publish_only_when_applied() {
        let h = harness();
        let v = h.engine.increase_velocity(Rate::Percent(10.0));
        assert!((v - 0.055).abs() < 1e-12);
        assert_eq!(h.engine.increase_velocity(f64::NAN), v);
        assert_eq!(h.engine.decrease_velocity(Rate::Percent(150.0)), v);

        h.engine.set_velocity(0.01);
        assert_eq!(h.engine.decrease_velocity(Rate::Default), 0.01);
        assert_eq!(h.event_kinds(), vec![EventKind::Accelerated]);
    }

    #[test]
    fn transition_tweens_then_installs_target() {
        let h = harness();
        h.engine.set_markers(vec![marker(1, 4.0)]);
        h.engine.render();
        h.clock.advance(100.0);
        assert_eq!(h.markers.borrow().draws.len(), 1);

        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        assert!(h.engine.transition_to_with("mollweide", Some(500.0), move || {
            f.set(f.get() + 1)
        }));
        assert!(h.engine.is_transitioning());
        assert_eq!(h.engine.rotation(), Rotation::default());
        assert!(!h.engine.drag_start(Vec2::ZERO));

        h.clock.advance(250.0);
        assert_eq!(
            h.paths.borrow().origins.last().copied(),
            Some(Vec2::new(530.0, -530.0))
        );
        assert_eq!(h.engine.rotation(), Rotation::default());

        h.clock.advance(250.0);
        assert!(!h.engine.is_transitioning());
        assert_eq!(h.engine.style().id, "mollweide");
        assert_eq!(fired.get(), 1);
        assert_eq!(h.markers.borrow().draws.len(), 2);

        h.clock.run_for(1000.0, 50.0);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn newer_transition_replaces_running_one() {
        let h = harness();
        h.engine.render();
        let first = Rc::new(Cell::new(false));
        let second = Rc::new(Cell::new(false));
        let (a, b) = (first.clone(), second.clone());
        h.engine
            .transition_to_with("mollweide", Some(500.0), move || a.set(true));
        h.clock.advance(100.0);
        h.engine
            .transition_to_with("robinson", Some(500.0), move || b.set(true));
        h.clock.run_for(600.0, 50.0);

        assert_eq!(h.engine.style().id, "robinson");
        assert!(!first.get());
        assert!(second.get());
    }

    #[test]
    fn unavailable_transitions_change_nothing() {
        let h = harness_with(GlobeConfig::default(), &["hammer"]);
        h.engine.render();
        h.clock.advance(100.0);
        let before = h.engine.rotation();
        assert_eq!(before.longitude, 5.0);

        let fired = Rc::new(Cell::new(false));
        let (a, b) = (fired.clone(), fired.clone());
        assert!(!h
            .engine
            .transition_to_with("no-such-style", Some(500.0), move || a.set(true)));
        assert!(!h
            .engine
            .transition_to_with("Hammer", Some(500.0), move || b.set(true)));
        assert_eq!(h.engine.rotation(), before);
        assert!(!h.engine.is_transitioning());

        h.clock.run_for(1000.0, 50.0);
        assert!(!fired.get());
        assert_eq!(h.engine.style().id, "globe");
        assert!(h.engine.is_rotating());
        assert!(h.longitude() > before.longitude);
    }

    #[test]
    fn flat_style_ends_a_running_drag() {
        let h = harness();
        h.engine.render();
        assert!(h.engine.drag_start(Vec2::ZERO));
        assert!(h.engine.set_style("mollweide"));

        assert!(!h.engine.drag_move(Vec2::new(96.0, 0.0)));
        assert_eq!(h.engine.rotation(), Rotation::default());
        assert!(!h.engine.drag_end());
        assert!(!h.engine.is_rotating());
    }

    #[test]
    fn transition_ends_a_running_drag() {
        let h = harness();
        h.engine.render();
        h.clock.advance(100.0);
        assert!(h.engine.drag_start(Vec2::ZERO));
        assert!(h.engine.transition_to("orthographic", Some(500.0)));

        assert!(!h.engine.drag_move(Vec2::new(96.0, 0.0)));
        assert_eq!(h.engine.rotation(), Rotation::default());
        h.clock.advance(250.0);
        assert_eq!(h.engine.rotation(), Rotation::default());

        h.clock.advance(250.0);
        assert!(!h.engine.is_transitioning());
        assert!(!h.engine.drag_move(Vec2::new(192.0, 0.0)));
        assert!(!h.engine.drag_end());
        assert!(h.engine.is_rotating());
    }

    #[test]
    fn transition_before_render_installs_immediately() {
        let h = harness();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        assert!(h.engine.transition_to_with("2D", None, move || f.set(true)));
        assert!(fired.get());
        assert!(!h.engine.is_transitioning());
        assert_eq!(h.engine.style().id, "equirectangular");
    }

    #[test]
    fn set_style_rerenders() {
        let h = harness();
        h.engine.render();
        h.clock.advance(100.0);
        assert!(h.engine.set_style("2D"));
        assert_eq!(h.engine.rotation(), Rotation::default());
        assert!(!h.engine.is_rotating());
        assert!(!h.engine.set_style("cube"));
        assert_eq!(
            h.events.borrow().last(),
            Some(&GlobeEvent::Rendered {
                style: "Equirectangular (Plate Carree)".to_string()
            })
        );
    }

    #[test]
    fn markers_cycle_on_the_configured_cadence() {
        let h = harness();
        h.engine.set_markers(vec![marker(1, 4.0), marker(2, 2.0)]);
        h.engine.render();
        assert_eq!(
            h.markers.borrow().draws,
            vec![vec![MarkerId::new(1), MarkerId::new(2)]]
        );
        assert!(h.markers.borrow().animations.is_empty());

        h.clock.advance(1500.0);
        {
            let log = h.markers.borrow();
            assert_eq!(log.animations.len(), 2);
            let durations: Vec<f64> = log.animations[1].1.iter().map(|p| p.duration_ms).collect();
            assert_eq!(durations, vec![225.0, 450.0, 450.0]);
        }

        assert!(h.engine.set_marker_animation("NONE"));
        assert!(!h.engine.set_marker_animation("wobble"));
        assert_eq!(h.engine.marker_animation(), MarkerAnimation::None);
        h.clock.run_for(3000.0, 100.0);
        let log = h.markers.borrow();
        assert_eq!(log.animations.len(), 2);
        assert_eq!(
            log.widths,
            vec![(MarkerId::new(1), 4.0), (MarkerId::new(2), 2.0)]
        );
    }

    #[test]
    fn marker_duration_setter_validates() {
        let h = harness();
        assert_eq!(h.engine.set_marker_animation_duration(50.0), 1500.0);
        assert_eq!(h.engine.set_marker_animation_duration(999.9), 999.0);
        h.engine.set_markers(vec![marker(3, 1.0)]);
        let plan = h.engine.marker_phase_plan();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].1[0].duration_ms, 299.0);
    }

    #[test]
    fn travel_reports_leg_progress_then_finishes() {
        let h = harness();
        let route = Route::new(RouteId::new(4), [0.0, 0.0]).to([10.0, 10.0]);
        let accepted = h.engine.travel(
            &[route, Route::new(RouteId::new(5), [0.0, 0.0])],
            TravelOptions {
                duration_ms: Some(200.0),
                ..TravelOptions::default()
            },
        );
        assert_eq!(accepted, 1);
        h.clock.advance(100.0);
        h.clock.advance(100.0);
        h.clock.advance(100.0);

        let log = h.routes.borrow();
        assert_eq!(
            log.progress,
            vec![(RouteId::new(4), 0, 0.5), (RouteId::new(4), 0, 1.0)]
        );
        assert_eq!(log.finished, vec![RouteId::new(4)]);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[test]
    fn internal_render_work_runs_before_user_handlers() {
        let h = harness();
        h.engine.set_markers(vec![marker(1, 3.0)]);
        let seen = Rc::new(Cell::new(usize::MAX));
        let (s, log) = (seen.clone(), h.markers.clone());
        h.engine.on("Rendered", move |_| s.set(log.borrow().draws.len()));
        assert!(!h.engine.on("exploded", |_| {}));
        h.engine.render();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn shutdown_and_drop_cancel_every_timer() {
        let h = harness();
        h.engine.set_markers(vec![marker(1, 3.0)]);
        h.engine.render();
        h.engine.transition_to("robinson", None);
        h.engine.travel(
            &[Route::new(RouteId::new(1), [0.0, 0.0]).to([1.0, 1.0])],
            TravelOptions {
                looping: true,
                ..TravelOptions::default()
            },
        );
        assert!(h.clock.pending_timers() > 0);
        h.engine.shutdown();
        assert_eq!(h.clock.pending_timers(), 0);
        assert!(!h.engine.render());

        let h = harness();
        h.engine.render();
        let clock = h.clock.clone();
        drop(h);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn controls_are_inert_after_shutdown() {
        let h = harness();
        h.engine.render();
        h.engine.shutdown();

        h.engine.resume();
        h.engine.pause();
        h.engine.stop();
        assert_eq!(h.engine.increase_velocity(Rate::Percent(10.0)), 0.05);
        assert_eq!(h.engine.decrease_velocity(Rate::Default), 0.05);
        assert_eq!(h.engine.set_velocity(1.0), 0.05);
        assert!(!h.engine.drag_start(Vec2::ZERO));
        assert!(!h.engine.set_rotation(Rotation::new(30.0, 0.0, 0.0)));
        h.clock.run_for(500.0, 16.0);

        assert!(!h.engine.is_rotating());
        assert_eq!(h.longitude(), 0.0);
        assert_eq!(h.event_kinds(), vec![EventKind::Rendered]);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[test]
    fn viewport_changes_drag_scale() {
        let h = harness();
        h.engine.render();
        h.engine.stop();
        h.engine.set_viewport(Viewport::square(180.0));
        h.engine.drag_start(Vec2::ZERO);
        h.engine.drag_move(Vec2::new(18.0, 0.0));
        assert_eq!(h.longitude(), 18.0);
    }
}
