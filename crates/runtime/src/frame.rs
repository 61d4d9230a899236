use foundation::time::Instant;

/// Metadata handed to every scheduled callback.
///
/// Small and `Copy` so a recorded sequence of frames can be replayed
/// against an engine deterministically.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index. Frame 0 is the clock's starting instant.
    pub index: u64,
    /// Clock time at the start of the frame.
    pub now: Instant,
}

impl Frame {
    pub fn new(index: u64, now: Instant) -> Self {
        Self { index, now }
    }

    pub fn next(self, dt_ms: f64) -> Self {
        Self::new(self.index + 1, self.now.add_millis(dt_ms))
    }
}
