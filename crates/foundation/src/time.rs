/// Time primitives
///
/// All engine time is expressed in milliseconds, matching the resolution of
/// the host clocks (animation frames and interval timers) that drive it.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Instant(pub f64); // milliseconds

impl Instant {
    pub const ZERO: Instant = Instant(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Instant(ms)
    }

    pub fn as_millis(self) -> f64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`. Clamped at zero so a clock that
    /// steps backwards never produces negative motion.
    pub fn since(self, earlier: Instant) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    pub fn add_millis(self, ms: f64) -> Self {
        Instant(self.0 + ms)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeSpan {
    pub start: Instant,
    pub end: Instant,
}

impl TimeSpan {
    pub fn new(start: Instant, end: Instant) -> Self {
        Self { start, end }
    }

    pub fn starting_at(start: Instant, duration_ms: f64) -> Self {
        Self {
            start,
            end: start.add_millis(duration_ms.max(0.0)),
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end.0 - self.start.0).max(0.0)
    }

    /// Linear progress through the span at `now`, in `[0, 1]`.
    ///
    /// A zero-length span jumps straight from 0 to 1 at its start.
    pub fn progress(&self, now: Instant) -> f64 {
        if now < self.start {
            return 0.0;
        }
        let duration = self.duration();
        if duration <= 0.0 {
            return 1.0;
        }
        (now.since(self.start) / duration).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{Instant, TimeSpan};

    #[test]
    fn since_never_goes_negative() {
        let a = Instant::from_millis(100.0);
        let b = Instant::from_millis(250.0);
        assert_eq!(b.since(a), 150.0);
        assert_eq!(a.since(b), 0.0);
    }

    #[test]
    fn span_progress_is_linear_and_clamped() {
        let span = TimeSpan::starting_at(Instant::from_millis(1000.0), 500.0);
        assert_eq!(span.progress(Instant::from_millis(900.0)), 0.0);
        assert_eq!(span.progress(Instant::from_millis(1000.0)), 0.0);
        assert_eq!(span.progress(Instant::from_millis(1250.0)), 0.5);
        assert_eq!(span.progress(Instant::from_millis(1500.0)), 1.0);
        assert_eq!(span.progress(Instant::from_millis(9000.0)), 1.0);
    }

    #[test]
    fn zero_length_span_completes_at_start() {
        let span = TimeSpan::starting_at(Instant::from_millis(10.0), 0.0);
        assert_eq!(span.progress(Instant::from_millis(9.0)), 0.0);
        assert_eq!(span.progress(Instant::from_millis(10.0)), 1.0);
    }
}
