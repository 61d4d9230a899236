use foundation::math::{LinearScale, Rotation, Vec2};

use crate::projection::Viewport;

/// Longitude swept by dragging across the full viewport width. A globe
/// shows at most half the world at once.
pub const DRAG_LONGITUDE_SPAN: f64 = 180.0;
/// Latitude swept by dragging down the full viewport height (inverted:
/// dragging down tilts the north pole towards the viewer).
pub const DRAG_LATITUDE_SPAN: f64 = -90.0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DragSession {
    pub origin_pointer: Vec2,
    pub last_pointer: Vec2,
    pub origin_rotation: Rotation,
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// Turns pointer drags into rotation changes.
#[derive(Debug, Clone, Default)]
pub struct PointerDragController {
    state: DragState,
}

impl PointerDragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            DragState::Idle => None,
        }
    }

    /// Returns `false` when a drag is already in progress; the running
    /// session is kept.
    pub fn on_drag_start(&mut self, pointer: Vec2, rotation: Rotation) -> bool {
        if self.is_dragging() {
            return false;
        }
        self.state = DragState::Dragging(DragSession {
            origin_pointer: pointer,
            last_pointer: pointer,
            origin_rotation: rotation,
        });
        true
    }

    /// Rotation after the pointer moved to `pointer`, or `None` when no drag
    /// is active (a late or out-of-order move).
    pub fn on_drag_move(
        &mut self,
        pointer: Vec2,
        rotation: Rotation,
        viewport: Viewport,
    ) -> Option<Rotation> {
        let DragState::Dragging(session) = &mut self.state else {
            return None;
        };
        let [d_lon, d_lat] = drag_delta(pointer - session.last_pointer, viewport);
        session.last_pointer = pointer;
        Some(rotation.apply_delta(d_lon, d_lat, 0.0))
    }

    /// Returns the finished session, or `None` when no drag was active.
    pub fn on_drag_end(&mut self) -> Option<DragSession> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(session) => Some(session),
            DragState::Idle => None,
        }
    }
}

/// Pixel delta to `[d_longitude, d_latitude]` in degrees.
pub fn drag_delta(delta: Vec2, viewport: Viewport) -> [f64; 2] {
    let lambda = LinearScale::new([0.0, viewport.width], [0.0, DRAG_LONGITUDE_SPAN]);
    let phi = LinearScale::new([0.0, viewport.height], [0.0, DRAG_LATITUDE_SPAN]);
    [lambda.map(delta.x), phi.map(delta.y)]
}
