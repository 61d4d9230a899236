use std::fmt;
use std::str::FromStr;

use runtime::BusEvent;

/// The closed set of events a globe publishes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Accelerated,
    Paused,
    Rendered,
    Resumed,
    Slowed,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Accelerated,
        EventKind::Paused,
        EventKind::Rendered,
        EventKind::Resumed,
        EventKind::Slowed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Accelerated => "accelerated",
            EventKind::Paused => "paused",
            EventKind::Rendered => "rendered",
            EventKind::Resumed => "resumed",
            EventKind::Slowed => "slowed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent(pub String);

impl fmt::Display for UnknownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown globe event: {:?}", self.0)
    }
}

impl std::error::Error for UnknownEvent {}

impl FromStr for EventKind {
    type Err = UnknownEvent;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        EventKind::ALL
            .into_iter()
            .find(|k| k.name() == name)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobeEvent {
    Accelerated { velocity: f64 },
    Paused,
    /// Carries the display name of the style that was rendered.
    Rendered { style: String },
    Resumed,
    Slowed { velocity: f64 },
}

impl BusEvent for GlobeEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            GlobeEvent::Accelerated { .. } => EventKind::Accelerated,
            GlobeEvent::Paused => EventKind::Paused,
            GlobeEvent::Rendered { .. } => EventKind::Rendered,
            GlobeEvent::Resumed => EventKind::Resumed,
            GlobeEvent::Slowed { .. } => EventKind::Slowed,
        }
    }
}
