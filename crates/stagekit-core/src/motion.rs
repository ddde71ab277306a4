//! Motion requests
//!
//! A [`MotionRequest`] is what a caller asks for in logical terms: a target
//! per logical axis and an optional feed rate. It knows nothing about wire
//! letters; the command formatter translates it through the rig's axis map.

use crate::axis::LogicalAxis;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Motion word used for a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionMode {
    /// `G0` positioning move
    #[default]
    Rapid,
    /// `G1` feed move
    Linear,
}

impl MotionMode {
    /// G-word for this mode
    pub fn word(self) -> &'static str {
        match self {
            Self::Rapid => "G0",
            Self::Linear => "G1",
        }
    }
}

/// Timeout class of a command
///
/// Homing and program control wait on long mechanical cycles and get longer
/// bounds than ordinary moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandClass {
    /// Jogs, pickups, raw commands
    #[default]
    Motion,
    /// Homing cycles
    Homing,
    /// Stored program selection and start
    Program,
    /// Profile commands sent at connect time
    Configuration,
}

impl fmt::Display for CommandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Motion => write!(f, "motion"),
            Self::Homing => write!(f, "homing"),
            Self::Program => write!(f, "program"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// A move expressed in logical axes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionRequest {
    /// Target position per logical axis; absent axes do not move
    #[serde(default)]
    pub targets: BTreeMap<LogicalAxis, f64>,
    /// Feed rate override (units per minute)
    #[serde(default)]
    pub feedrate: Option<f64>,
    /// Rapid or feed move
    #[serde(default)]
    pub mode: MotionMode,
}

impl MotionRequest {
    /// Create an empty rapid request
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a request from a set of targets
    pub fn from_targets(targets: impl IntoIterator<Item = (LogicalAxis, f64)>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Set the target for one axis
    pub fn with_target(mut self, axis: LogicalAxis, value: f64) -> Self {
        self.targets.insert(axis, value);
        self
    }

    /// Set the X target
    pub fn x(self, value: f64) -> Self {
        self.with_target(LogicalAxis::X, value)
    }

    /// Set the Y target
    pub fn y(self, value: f64) -> Self {
        self.with_target(LogicalAxis::Y, value)
    }

    /// Set the Z target
    pub fn z(self, value: f64) -> Self {
        self.with_target(LogicalAxis::Z, value)
    }

    /// Set the feed rate override
    pub fn feedrate(mut self, feedrate: f64) -> Self {
        self.feedrate = Some(feedrate);
        self
    }

    /// Set the motion mode
    pub fn mode(mut self, mode: MotionMode) -> Self {
        self.mode = mode;
        self
    }

    /// True when no axis has a target
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Reject requests that must never reach the wire
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.targets.is_empty() {
            return Err(ConfigurationError::EmptyMotion);
        }

        if let Some((axis, value)) = self.targets.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigurationError::InvalidTarget {
                axis: *axis,
                value: *value,
            });
        }

        if let Some(feedrate) = self.feedrate {
            validate_feedrate(feedrate)?;
        }

        Ok(())
    }
}

/// Feed rates must be positive and finite
pub fn validate_feedrate(value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidFeedrate { value })
    }
}

/// Render a number for a G-code word: up to four decimals, no trailing zeros
pub fn format_number(value: f64) -> String {
    let text = format!("{:.4}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3000.0), "3000");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(-0.25), "-0.25");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.00001), "0");
        assert_eq!(format_number(1.23456), "1.2346");
    }

    #[test]
    fn test_builder() {
        let req = MotionRequest::new().x(1.0).z(2.0).feedrate(1500.0);
        assert_eq!(req.targets.len(), 2);
        assert_eq!(req.feedrate, Some(1500.0));
        assert_eq!(req.mode, MotionMode::Rapid);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_requests() {
        assert_eq!(
            MotionRequest::new().validate(),
            Err(ConfigurationError::EmptyMotion)
        );
        assert!(matches!(
            MotionRequest::new().y(f64::NAN).validate(),
            Err(ConfigurationError::InvalidTarget {
                axis: LogicalAxis::Y,
                ..
            })
        ));
        assert!(matches!(
            MotionRequest::new().x(1.0).feedrate(0.0).validate(),
            Err(ConfigurationError::InvalidFeedrate { .. })
        ));
    }

    #[test]
    fn test_deserialize_from_json() {
        let req: MotionRequest =
            serde_json::from_str(r#"{"targets":{"Z":100.0},"feedrate":2000.0}"#).unwrap();
        assert_eq!(req, MotionRequest::new().z(100.0).feedrate(2000.0));
    }
}
