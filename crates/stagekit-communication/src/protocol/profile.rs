//! Controller configuration profiles
//!
//! A profile is the ordered list of configuration commands replayed on every
//! connect. It can be given verbatim or derived from [`ProfileSettings`].

use super::command::{codes, CommandLine};
use serde::{Deserialize, Serialize};
use stagekit_core::{format_number, CommandClass, ConfigurationError, PhysicalAxis};
use std::collections::BTreeMap;

/// Typed controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    /// Select millimetre units
    pub units_mm: bool,
    /// Steps per unit, per physical axis
    pub steps_per_unit: BTreeMap<PhysicalAxis, f64>,
    /// Maximum feed rate, per physical axis
    pub max_feedrate: BTreeMap<PhysicalAxis, f64>,
    /// Maximum acceleration, per physical axis
    pub max_acceleration: BTreeMap<PhysicalAxis, f64>,
    /// Driver current in milliamps, per physical axis
    pub motor_current_ma: BTreeMap<PhysicalAxis, u32>,
    /// Fan speed 0-255; zero turns the fan off
    pub fan_speed: Option<u8>,
    /// Commands sent after the typed settings, verbatim
    pub extra_commands: Vec<String>,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            units_mm: true,
            steps_per_unit: BTreeMap::new(),
            max_feedrate: BTreeMap::new(),
            max_acceleration: BTreeMap::new(),
            motor_current_ma: BTreeMap::new(),
            fan_speed: None,
            extra_commands: Vec::new(),
        }
    }
}

impl ProfileSettings {
    /// Command lines for these settings
    ///
    /// Order: units, steps per unit, max feed rate, max acceleration, motor
    /// current, fan, then extras.
    pub fn to_commands(&self) -> Vec<String> {
        let mut commands = Vec::new();

        if self.units_mm {
            commands.push(codes::UNITS_MM.to_string());
        }

        let per_axis = [
            (codes::STEPS_PER_UNIT, &self.steps_per_unit),
            (codes::MAX_FEEDRATE, &self.max_feedrate),
            (codes::MAX_ACCELERATION, &self.max_acceleration),
        ];
        for (word, values) in per_axis {
            if let Some(line) = axis_words(word, values.iter().map(|(a, v)| (*a, format_number(*v)))) {
                commands.push(line);
            }
        }

        if let Some(line) = axis_words(
            codes::MOTOR_CURRENT,
            self.motor_current_ma.iter().map(|(a, v)| (*a, v.to_string())),
        ) {
            commands.push(line);
        }

        match self.fan_speed {
            Some(0) => commands.push(codes::FAN_OFF.to_string()),
            Some(speed) => commands.push(format!("{} S{}", codes::FAN_ON, speed)),
            None => {}
        }

        commands.extend(self.extra_commands.iter().cloned());
        commands
    }
}

fn axis_words(word: &str, values: impl Iterator<Item = (PhysicalAxis, String)>) -> Option<String> {
    let words: Vec<String> = values.map(|(axis, value)| format!("{}{}", axis, value)).collect();
    if words.is_empty() {
        None
    } else {
        Some(format!("{} {}", word, words.join(" ")))
    }
}

/// Immutable, ordered configuration command list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerProfile {
    commands: Vec<CommandLine>,
}

impl ControllerProfile {
    /// Profile with no commands
    pub fn empty() -> Self {
        Self::default()
    }

    /// Profile from raw command strings
    ///
    /// Profile commands are silent, non-blocking and use the configuration
    /// timeout. A command that normalises to nothing is rejected.
    pub fn from_commands<I, S>(commands: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands = commands
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let line = CommandLine::raw(text)
                    .with_silent(true)
                    .with_class(CommandClass::Configuration);
                if line.is_empty() {
                    Err(ConfigurationError::InvalidProfile {
                        reason: format!("command {} is empty", index + 1),
                    })
                } else {
                    Ok(line)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { commands })
    }

    /// Profile derived from typed settings
    pub fn from_settings(settings: &ProfileSettings) -> Result<Self, ConfigurationError> {
        Self::from_commands(settings.to_commands())
    }

    /// Commands in send order
    pub fn commands(&self) -> &[CommandLine] {
        &self.commands
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
