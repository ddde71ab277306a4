//! Command lines and the motion command formatter
//!
//! [`CommandFormatter`] turns a logical [`MotionRequest`] into wire-level
//! [`CommandLine`]s through the rig's [`AxisMap`]. Raw commands (homing, drive
//! disable, fan, profile, program control) skip translation and are only
//! normalised.

use serde::{Deserialize, Serialize};
use stagekit_core::{
    format_number, validate_feedrate, AxisMap, CommandClass, ConfigurationError, LogicalAxis,
    MotionRequest, PhysicalAxis,
};
use std::collections::BTreeSet;
use std::fmt;

/// Terminator appended to every line written to the controller
pub const LINE_TERMINATOR: &str = "\r\n";

/// Command words used by the engine
pub mod codes {
    /// Home the listed axes
    pub const HOME: &str = "G28";
    /// Pause for `P` milliseconds
    pub const DWELL: &str = "G4";
    /// Millimetre units
    pub const UNITS_MM: &str = "G21";
    /// Wait until all queued motion has finished
    pub const WAIT_FOR_MOVES: &str = "M400";
    /// Release the stepper drivers
    pub const DISABLE_STEPPERS: &str = "M84";
    /// Select a file on the controller's storage card
    pub const SELECT_FILE: &str = "M23";
    /// Start or resume the selected file
    pub const START_FILE: &str = "M24";
    /// Feed rate multiplier in percent
    pub const FEED_MULTIPLIER: &str = "M220";
    /// Steps per unit
    pub const STEPS_PER_UNIT: &str = "M92";
    /// Maximum acceleration
    pub const MAX_ACCELERATION: &str = "M201";
    /// Maximum feed rate
    pub const MAX_FEEDRATE: &str = "M203";
    /// Stepper driver current in milliamps
    pub const MOTOR_CURRENT: &str = "M906";
    /// Fan on at `S` speed
    pub const FAN_ON: &str = "M106";
    /// Fan off
    pub const FAN_OFF: &str = "M107";
}

/// A single, immutable line ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    text: String,
    blocking: bool,
    silent: bool,
    class: CommandClass,
}

impl CommandLine {
    /// Pass-through command; trims and strips embedded line breaks
    ///
    /// The result is non-blocking, not silent, and in the motion class.
    pub fn raw(text: impl AsRef<str>) -> Self {
        let text = text
            .as_ref()
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            text,
            blocking: false,
            silent: false,
            class: CommandClass::Motion,
        }
    }

    /// Wait for a full mechanical stop after this command
    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Keep diagnostics for this command out of the logs and the result
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Timeout class for this command
    pub fn with_class(mut self, class: CommandClass) -> Self {
        self.class = class;
        self
    }

    /// Command text without terminator
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether a completion barrier follows
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Whether diagnostics are suppressed
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Timeout class
    pub fn class(&self) -> CommandClass {
        self.class
    }

    /// True when normalisation left nothing to send
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Bytes as they go on the wire
    pub fn wire(&self) -> String {
        format!("{}{}", self.text, LINE_TERMINATOR)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// How a multi-axis move reaches the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStrategy {
    /// One command per axis; an error is attributable to exactly one axis
    #[default]
    PerAxis,
    /// One command carrying every axis, for rigs that move atomically
    Combined,
}

/// Builds motion commands for one rig
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    axis_map: AxisMap,
    strategy: IssueStrategy,
}

impl CommandFormatter {
    /// Create a formatter for a rig's axis map and issuance strategy
    pub fn new(axis_map: AxisMap, strategy: IssueStrategy) -> Self {
        Self { axis_map, strategy }
    }

    /// Axis map in use
    pub fn axis_map(&self) -> &AxisMap {
        &self.axis_map
    }

    /// Issuance strategy in use
    pub fn strategy(&self) -> IssueStrategy {
        self.strategy
    }

    /// Format a motion request
    ///
    /// Every command carries an explicit feed word: the request's override, or
    /// `default_feedrate` when there is none. Commands are blocking.
    pub fn format(
        &self,
        request: &MotionRequest,
        default_feedrate: f64,
    ) -> Result<Vec<CommandLine>, ConfigurationError> {
        request.validate()?;
        let feedrate = match request.feedrate {
            Some(feedrate) => feedrate,
            None => {
                validate_feedrate(default_feedrate)?;
                default_feedrate
            }
        };

        let mut words: Vec<(PhysicalAxis, f64)> = request
            .targets
            .iter()
            .map(|(axis, value)| self.axis_map.translate(*axis, *value))
            .collect::<Result<_, _>>()?;

        let groups: Vec<Vec<(PhysicalAxis, f64)>> = match self.strategy {
            IssueStrategy::PerAxis => words.into_iter().map(|w| vec![w]).collect(),
            IssueStrategy::Combined => {
                words.sort_by_key(|(physical, _)| *physical);
                vec![words]
            }
        };

        Ok(groups
            .into_iter()
            .map(|group| {
                let axes: Vec<String> = group
                    .iter()
                    .map(|(physical, value)| format!("{}{}", physical, format_number(*value)))
                    .collect();
                CommandLine::raw(format!(
                    "{} {} F{}",
                    request.mode.word(),
                    axes.join(" "),
                    format_number(feedrate)
                ))
                .with_blocking(true)
                .with_class(CommandClass::Motion)
            })
            .collect())
    }

    /// Homing command for a set of logical axes
    ///
    /// Letters follow `home_order`; letters missing from it come last in
    /// alphabetical order. Returns `None` for an empty set.
    pub fn home(
        &self,
        axes: &BTreeSet<LogicalAxis>,
        home_order: &[PhysicalAxis],
    ) -> Result<Option<CommandLine>, ConfigurationError> {
        if axes.is_empty() {
            return Ok(None);
        }

        let mut letters: Vec<PhysicalAxis> = axes
            .iter()
            .map(|axis| self.axis_map.physical(*axis))
            .collect::<Result<_, _>>()?;
        let rank = |physical: &PhysicalAxis| {
            home_order
                .iter()
                .position(|p| p == physical)
                .unwrap_or(home_order.len())
        };
        letters.sort_by_key(|physical| (rank(physical), *physical));

        let words: Vec<String> = letters.iter().map(|p| p.to_string()).collect();
        Ok(Some(
            CommandLine::raw(format!("{} {}", codes::HOME, words.join(" ")))
                .with_blocking(true)
                .with_class(CommandClass::Homing),
        ))
    }
}
