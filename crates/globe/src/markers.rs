//! Marker animation sequencing.
//!
//! Every cycle each marker's stroke width is animated through a short chain
//! of phases. Phase lengths scale with the marker's size relative to the
//! largest marker, so differently sized markers breathe out of step.

use std::fmt;
use std::str::FromStr;

use foundation::ids::MarkerId;
use serde::{Deserialize, Serialize};

use crate::render::MarkerRenderer;

pub const DEFAULT_MARKER_ANIMATION_DURATION_MS: f64 = 1500.0;
/// Durations at or below this are refused.
pub const MIN_MARKER_ANIMATION_DURATION_MS: f64 = 100.0;
pub const DEFAULT_MARKER_SIZE: f64 = 3.0;
/// Share of each cycle spent animating; the rest is slack before the next
/// cycle starts.
pub const ACTIVE_SHARE: f64 = 0.9;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerAnimation {
    #[default]
    Pulse,
    Ping,
    None,
}

impl MarkerAnimation {
    pub fn name(self) -> &'static str {
        match self {
            MarkerAnimation::Pulse => "pulse",
            MarkerAnimation::Ping => "ping",
            MarkerAnimation::None => "none",
        }
    }
}

impl fmt::Display for MarkerAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MarkerAnimation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pulse" => Ok(MarkerAnimation::Pulse),
            "ping" => Ok(MarkerAnimation::Ping),
            "none" => Ok(MarkerAnimation::None),
            _ => Err(format!("unknown marker animation: {s:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: MarkerId,
    pub longitude: f64,
    pub latitude: f64,
    /// Missing, zero, negative or non-finite sizes fall back to the
    /// configured default marker size, so such a marker is still drawn.
    pub size: Option<f64>,
}

impl Marker {
    pub fn new(id: MarkerId, longitude: f64, latitude: f64) -> Self {
        Self {
            id,
            longitude,
            latitude,
            size: None,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }
}

/// One link of a chained stroke-width animation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerPhase {
    pub target_width: f64,
    pub duration_ms: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerAnimState {
    pub marker_id: MarkerId,
    /// Size over the largest size in the dataset, in `(0, 1]`.
    pub relative_size: f64,
    /// Stroke width the marker grows to.
    pub full_width: f64,
}

/// Phase durations for one marker. Pulse yields grow/hold/shrink; ping
/// yields grow then an instant reset; `None` yields nothing.
pub fn phase_durations(mode: MarkerAnimation, relative_size: f64, duration_ms: f64) -> Vec<f64> {
    let scaled = |max_ms: f64| (relative_size * max_ms).floor().min(max_ms);
    match mode {
        MarkerAnimation::Pulse => {
            let third = (duration_ms * ACTIVE_SHARE / 3.0).floor();
            let grow = scaled(third);
            let rest = scaled(third * 2.0);
            vec![grow, rest, rest]
        }
        MarkerAnimation::Ping => {
            let grow = scaled((duration_ms * ACTIVE_SHARE).floor());
            vec![grow, 0.0]
        }
        MarkerAnimation::None => Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct MarkerAnimationScheduler {
    mode: MarkerAnimation,
    duration_ms: f64,
    default_size: f64,
    states: Vec<MarkerAnimState>,
}

impl MarkerAnimationScheduler {
    pub fn new(mode: MarkerAnimation, duration_ms: f64, default_size: f64) -> Self {
        let mut scheduler = Self {
            mode,
            duration_ms: DEFAULT_MARKER_ANIMATION_DURATION_MS,
            default_size: if default_size.is_finite() && default_size > 0.0 {
                default_size
            } else {
                DEFAULT_MARKER_SIZE
            },
            states: Vec::new(),
        };
        scheduler.set_duration(duration_ms);
        scheduler
    }

    pub fn mode(&self) -> MarkerAnimation {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MarkerAnimation) {
        self.mode = mode;
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Accepts durations above 100ms (floored); others are ignored. Returns
    /// the duration in effect.
    pub fn set_duration(&mut self, duration_ms: f64) -> f64 {
        if duration_ms.is_finite() && duration_ms > MIN_MARKER_ANIMATION_DURATION_MS {
            self.duration_ms = duration_ms.floor();
        }
        self.duration_ms
    }

    /// Replaces the dataset and recomputes relative sizes.
    pub fn load(&mut self, markers: &[Marker]) {
        let size_of = |m: &Marker| match m.size {
            Some(s) if s.is_finite() && s > 0.0 => s,
            _ => self.default_size,
        };
        let largest = markers
            .iter()
            .map(size_of)
            .fold(0.0_f64, f64::max);
        let largest = if largest > 0.0 { largest } else { 1.0 };

        self.states = markers
            .iter()
            .map(|m| {
                let size = size_of(m);
                MarkerAnimState {
                    marker_id: m.id,
                    relative_size: size / largest,
                    full_width: if size < 1.0 {
                        size * self.default_size
                    } else {
                        size
                    },
                }
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn states(&self) -> &[MarkerAnimState] {
        &self.states
    }

    /// Cycle period for the repeating timer, or `None` for static markers.
    pub fn interval_ms(&self) -> Option<f64> {
        match self.mode {
            MarkerAnimation::None => None,
            _ => Some(self.duration_ms),
        }
    }

    pub fn phases_for(&self, state: &MarkerAnimState) -> Vec<MarkerPhase> {
        let durations = phase_durations(self.mode, state.relative_size, self.duration_ms);
        let widths: &[f64] = match self.mode {
            MarkerAnimation::Pulse => &[state.full_width, state.full_width, 0.0],
            MarkerAnimation::Ping => &[state.full_width, 0.0],
            MarkerAnimation::None => &[],
        };
        widths
            .iter()
            .zip(durations)
            .map(|(&target_width, duration_ms)| MarkerPhase {
                target_width,
                duration_ms,
            })
            .collect()
    }

    pub fn plan(&self) -> Vec<(MarkerId, Vec<MarkerPhase>)> {
        self.states
            .iter()
            .map(|s| (s.marker_id, self.phases_for(s)))
            .collect()
    }

    /// Starts one animation cycle on every marker.
    pub fn play_cycle(&self, renderer: &mut dyn MarkerRenderer) {
        for (id, phases) in self.plan() {
            renderer.animate(id, &phases);
        }
    }

    /// Static markers: straight to full width, no timer.
    pub fn apply_static(&self, renderer: &mut dyn MarkerRenderer) {
        for state in &self.states {
            renderer.set_stroke_width(state.marker_id, state.full_width);
        }
    }
}

impl Default for MarkerAnimationScheduler {
    fn default() -> Self {
        Self::new(
            MarkerAnimation::default(),
            DEFAULT_MARKER_ANIMATION_DURATION_MS,
            DEFAULT_MARKER_SIZE,
        )
    }
}
