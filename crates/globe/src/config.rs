use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::markers::{
    DEFAULT_MARKER_ANIMATION_DURATION_MS, DEFAULT_MARKER_SIZE, MIN_MARKER_ANIMATION_DURATION_MS,
    MarkerAnimation,
};
use crate::spinner::{DEFAULT_VELOCITY, DEFAULT_VELOCITY_STEP, VELOCITY_FLOOR};

pub const ENV_STYLE: &str = "GLOBE_STYLE";
pub const ENV_VELOCITY: &str = "GLOBE_VELOCITY";
pub const ENV_MARKER_ANIMATION: &str = "GLOBE_MARKER_ANIMATION";

/// Construction-time settings for a [`GlobeEngine`](crate::GlobeEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    pub style: String,
    pub width: f64,
    pub height: f64,
    /// Degrees of longitude per millisecond.
    pub velocity: f64,
    pub velocity_step: f64,
    pub velocity_floor: f64,
    pub marker_animation: MarkerAnimation,
    pub marker_animation_duration_ms: f64,
    pub marker_size: f64,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            style: "globe".to_string(),
            width: 960.0,
            height: 960.0,
            velocity: DEFAULT_VELOCITY,
            velocity_step: DEFAULT_VELOCITY_STEP,
            velocity_floor: VELOCITY_FLOOR,
            marker_animation: MarkerAnimation::default(),
            marker_animation_duration_ms: DEFAULT_MARKER_ANIMATION_DURATION_MS,
            marker_size: DEFAULT_MARKER_SIZE,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config io error: {e}"),
            ConfigError::Json(e) => write!(f, "config json error: {e}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl GlobeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GlobeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.style.trim().is_empty() {
            return Err(invalid("style", "must not be empty"));
        }
        for (field, value) in [("width", self.width), ("height", self.height)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("{value} is not a positive size")));
            }
        }
        if !self.velocity.is_finite() {
            return Err(invalid("velocity", "must be finite"));
        }
        if !(self.velocity_step.is_finite() && self.velocity_step > 0.0) {
            return Err(invalid("velocity_step", "must be positive"));
        }
        if !(self.velocity_floor.is_finite() && self.velocity_floor >= 0.0) {
            return Err(invalid("velocity_floor", "must not be negative"));
        }
        if !(self.marker_animation_duration_ms.is_finite()
            && self.marker_animation_duration_ms > MIN_MARKER_ANIMATION_DURATION_MS)
        {
            return Err(invalid(
                "marker_animation_duration_ms",
                format!("must exceed {MIN_MARKER_ANIMATION_DURATION_MS}ms"),
            ));
        }
        if !(self.marker_size.is_finite() && self.marker_size > 0.0) {
            return Err(invalid("marker_size", "must be positive"));
        }
        Ok(())
    }

    /// Applies `GLOBE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. Values that do not parse are
    /// skipped and the configured value is kept.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(style) = lookup(ENV_STYLE).filter(|s| !s.trim().is_empty()) {
            self.style = style;
        }
        match lookup(ENV_VELOCITY).map(|v| v.trim().parse::<f64>()) {
            Some(Ok(v)) if v.is_finite() => self.velocity = v,
            Some(_) => tracing::debug!(key = ENV_VELOCITY, "ignoring unparsable override"),
            None => {}
        }
        match lookup(ENV_MARKER_ANIMATION).map(|v| v.parse::<MarkerAnimation>()) {
            Some(Ok(mode)) => self.marker_animation = mode,
            Some(Err(e)) => tracing::debug!(key = ENV_MARKER_ANIMATION, "ignoring override: {e}"),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{ConfigError, GlobeConfig};
    use crate::markers::MarkerAnimation;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let config = GlobeConfig::from_json_str(r#"{ "style": "Mollweide", "width": 500 }"#)
            .expect("valid config");
        assert_eq!(
            config,
            GlobeConfig {
                style: "Mollweide".to_string(),
                width: 500.0,
                ..GlobeConfig::default()
            }
        );
    }

    #[test]
    fn marker_animation_parses_lowercase() {
        let config = GlobeConfig::from_json_str(r#"{ "marker_animation": "ping" }"#)
            .expect("valid config");
        assert_eq!(config.marker_animation, MarkerAnimation::Ping);
    }

    #[test]
    fn rejects_bad_values() {
        let err = GlobeConfig::from_json_str(r#"{ "marker_animation_duration_ms": 100 }"#)
            .expect_err("too short");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "marker_animation_duration_ms",
                ..
            }
        ));
        let err = GlobeConfig::from_json_str(r#"{ "width": 0 }"#).expect_err("zero width");
        assert!(matches!(err, ConfigError::Invalid { field: "width", .. }));
        let err = GlobeConfig::from_json_str("{ not json").expect_err("malformed");
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn overrides_replace_parsable_values_only() {
        let env: HashMap<&str, &str> = [
            ("GLOBE_STYLE", "robinson"),
            ("GLOBE_VELOCITY", "fast"),
            ("GLOBE_MARKER_ANIMATION", "NONE"),
        ]
        .into_iter()
        .collect();
        let mut config = GlobeConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.style, "robinson");
        assert_eq!(config.velocity, 0.05);
        assert_eq!(config.marker_animation, MarkerAnimation::None);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = GlobeConfig::from_path("/nonexistent/globe.json").expect_err("missing");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
