use foundation::time::Instant;

use crate::scheduler::{TimerCallback, TimerHandle};

/// Time source and timer host for cooperative, single-threaded animation.
///
/// Implementations never invoke a callback from inside `schedule_*` or
/// `cancel`; callbacks only run when the host advances the clock, so a
/// callback is free to schedule or cancel timers (including its own).
pub trait Clock {
    fn now(&self) -> Instant;

    /// Runs `callback` once per rendered frame until cancelled.
    fn schedule_frame(&self, callback: TimerCallback) -> TimerHandle;

    /// Runs `callback` every `interval_ms` until cancelled. The first call
    /// happens one full interval after scheduling.
    fn schedule_repeating(&self, callback: TimerCallback, interval_ms: f64) -> TimerHandle;

    /// Returns `false` if the handle was already cancelled or never existed.
    fn cancel(&self, handle: TimerHandle) -> bool;
}
