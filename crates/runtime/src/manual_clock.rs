use std::cell::RefCell;
use std::rc::Rc;

use foundation::time::Instant;

use crate::clock::Clock;
use crate::frame::Frame;
use crate::scheduler::{Cadence, Scheduler, TimerCallback, TimerHandle};

struct ManualClockState {
    frame: Frame,
    scheduler: Scheduler,
}

/// Deterministic clock advanced explicitly by its owner.
///
/// Cloning yields another handle onto the same clock. Each `advance` is one
/// frame: every-frame timers run once, repeating timers run once per
/// interval that elapsed.
#[derive(Clone)]
pub struct ManualClock {
    state: Rc<RefCell<ManualClockState>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Instant::ZERO)
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            state: Rc::new(RefCell::new(ManualClockState {
                frame: Frame::new(0, now),
                scheduler: Scheduler::new(),
            })),
        }
    }

    pub fn frame(&self) -> Frame {
        self.state.borrow().frame
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().scheduler.len()
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.state.borrow().scheduler.is_active(handle)
    }

    /// Moves time forward by `dt_ms` and runs one frame.
    pub fn advance(&self, dt_ms: f64) -> Frame {
        let frame = {
            let mut state = self.state.borrow_mut();
            state.frame = state.frame.next(dt_ms.max(0.0));
            state.frame
        };

        let due = self.state.borrow().scheduler.due(frame.now);
        for handle in due {
            self.run(handle, frame);
        }
        loop {
            let again = self.state.borrow().scheduler.due_repeating(frame.now);
            if again.is_empty() {
                break;
            }
            for handle in again {
                self.run(handle, frame);
            }
        }
        frame
    }

    /// Runs frames of `step_ms` until at least `total_ms` has elapsed.
    pub fn run_for(&self, total_ms: f64, step_ms: f64) -> Frame {
        let step = step_ms.max(1.0);
        let end = self.frame().now.add_millis(total_ms.max(0.0));
        let mut frame = self.frame();
        while frame.now < end {
            frame = self.advance(step);
        }
        frame
    }

    fn run(&self, handle: TimerHandle, frame: Frame) {
        // The borrow must be released before the callback runs: callbacks
        // schedule and cancel timers on this same clock.
        let callback = self.state.borrow_mut().scheduler.begin(handle);
        if let Some(mut callback) = callback {
            callback(frame);
            self.state.borrow_mut().scheduler.finish(handle, callback);
        }
    }

    fn add(&self, cadence: Cadence, callback: TimerCallback) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let now = state.frame.now;
        state.scheduler.add(cadence, now, callback)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.borrow().frame.now
    }

    fn schedule_frame(&self, callback: TimerCallback) -> TimerHandle {
        self.add(Cadence::EveryFrame, callback)
    }

    fn schedule_repeating(&self, callback: TimerCallback, interval_ms: f64) -> TimerHandle {
        self.add(Cadence::Every { interval_ms }, callback)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        self.state.borrow_mut().scheduler.cancel(handle)
    }
}
