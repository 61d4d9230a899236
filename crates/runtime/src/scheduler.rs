use foundation::handles::Handle;
use foundation::time::Instant;

use crate::frame::Frame;

pub type TimerCallback = Box<dyn FnMut(Frame)>;

/// Smallest accepted repeating interval. Keeps catch-up loops finite.
pub const MIN_INTERVAL_MS: f64 = 1.0;

/// Cancellation token for a scheduled timer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(Handle);

impl TimerHandle {
    pub fn raw(self) -> Handle {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Cadence {
    EveryFrame,
    Every { interval_ms: f64 },
}

struct Timer {
    order: u64,
    cadence: Cadence,
    next_due: Instant,
    /// `None` while the callback is out running.
    callback: Option<TimerCallback>,
}

struct Slot {
    generation: u32,
    timer: Option<Timer>,
}

/// Deterministic timer table.
///
/// Timers run in registration order. Slots are reused with a bumped
/// generation, so a stale handle can never cancel a newer timer.
#[derive(Default)]
pub struct Scheduler {
    next_order: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cadence: Cadence, now: Instant, callback: TimerCallback) -> TimerHandle {
        let cadence = match cadence {
            Cadence::Every { interval_ms } => Cadence::Every {
                interval_ms: if interval_ms.is_finite() {
                    interval_ms.max(MIN_INTERVAL_MS)
                } else {
                    MIN_INTERVAL_MS
                },
            },
            c => c,
        };
        let next_due = match cadence {
            Cadence::EveryFrame => now,
            Cadence::Every { interval_ms } => now.add_millis(interval_ms),
        };
        let order = self.next_order;
        self.next_order = self.next_order.wrapping_add(1);
        let timer = Timer {
            order,
            cadence,
            next_due,
            callback: Some(callback),
        };

        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.timer = Some(timer);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    timer: Some(timer),
                });
                (self.slots.len() - 1) as u32
            }
        };
        TimerHandle(Handle::new(index, self.slots[index as usize].generation))
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(slot) = self.live_slot_mut(handle) else {
            return false;
        };
        slot.timer = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.0.index());
        true
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.slots
            .get(handle.0.index() as usize)
            .is_some_and(|s| s.generation == handle.0.generation() && s.timer.is_some())
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.timer.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every-frame timers plus repeating timers whose due time has passed,
    /// in registration order.
    pub fn due(&self, now: Instant) -> Vec<TimerHandle> {
        self.collect_due(now, true)
    }

    /// Repeating timers still due at `now` (used to catch up when a frame
    /// spans several intervals).
    pub fn due_repeating(&self, now: Instant) -> Vec<TimerHandle> {
        self.collect_due(now, false)
    }

    /// Takes the callback out so it can run without a borrow on the
    /// scheduler, and advances the timer's due time.
    pub fn begin(&mut self, handle: TimerHandle) -> Option<TimerCallback> {
        let timer = self.live_slot_mut(handle)?.timer.as_mut()?;
        if let Cadence::Every { interval_ms } = timer.cadence {
            timer.next_due = timer.next_due.add_millis(interval_ms);
        }
        timer.callback.take()
    }

    /// Returns a callback after it ran. Dropped if the timer was cancelled
    /// while the callback was out.
    pub fn finish(&mut self, handle: TimerHandle, callback: TimerCallback) {
        if let Some(timer) = self
            .live_slot_mut(handle)
            .and_then(|slot| slot.timer.as_mut())
        {
            timer.callback = Some(callback);
        }
    }

    fn live_slot_mut(&mut self, handle: TimerHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.0.index() as usize)
            .filter(|s| s.generation == handle.0.generation() && s.timer.is_some())
    }

    fn collect_due(&self, now: Instant, include_frames: bool) -> Vec<TimerHandle> {
        let mut due: Vec<(u64, TimerHandle)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let timer = slot.timer.as_ref()?;
                // A callback that is out running is never re-entered.
                timer.callback.as_ref()?;
                let is_due = match timer.cadence {
                    Cadence::EveryFrame => include_frames,
                    Cadence::Every { .. } => timer.next_due <= now,
                };
                is_due.then(|| {
                    (
                        timer.order,
                        TimerHandle(Handle::new(index as u32, slot.generation)),
                    )
                })
            })
            .collect();
        due.sort_by_key(|(order, _)| *order);
        due.into_iter().map(|(_, h)| h).collect()
    }
}
