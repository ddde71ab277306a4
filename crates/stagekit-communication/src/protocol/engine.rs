//! Protocol engine
//!
//! Owns the transport and drives the synchronous send/await-completion
//! contract: one command in flight, each followed by its terminal response
//! and, for blocking commands, by an `M400` completion barrier.

use super::command::{codes, CommandFormatter, CommandLine, IssueStrategy};
use super::profile::ControllerProfile;
use super::response::{CommandResult, Outcome, ResponseReader};
use crate::communication::{CancelHandle, Transport};
use serde::{Deserialize, Serialize};
use stagekit_core::{
    validate_feedrate, AxisMap, CommandClass, ConfigurationError, LogicalAxis, MotionMode,
    MotionRequest, PhysicalAxis, ProtocolError, ProtocolResult,
};
use std::collections::BTreeSet;
use std::time::Duration;

/// Response bounds per command class, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    pub motion_ms: u64,
    pub homing_ms: u64,
    pub program_ms: u64,
    pub configuration_ms: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            motion_ms: 30_000,
            homing_ms: 120_000,
            program_ms: 120_000,
            configuration_ms: 10_000,
        }
    }
}

impl TimeoutPolicy {
    /// Bound for one command of the given class
    pub fn for_class(&self, class: CommandClass) -> Duration {
        let ms = match class {
            CommandClass::Motion => self.motion_ms,
            CommandClass::Homing => self.homing_ms,
            CommandClass::Program => self.program_ms,
            CommandClass::Configuration => self.configuration_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Which half of a pickup runs first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupOrder {
    /// Retract to the safe height, then descend to the target
    #[default]
    RetractFirst,
    /// Descend to the target, then retract
    DescendFirst,
}

/// Pickup sequence settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickupConfig {
    /// Logical Z height of the retracted position
    pub retract_height: f64,
    pub order: PickupOrder,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            retract_height: 100.0,
            order: PickupOrder::RetractFirst,
        }
    }
}

/// Per-rig engine behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: IssueStrategy,
    /// Feed rate used when a request carries no override
    pub default_feedrate: f64,
    pub timeouts: TimeoutPolicy,
    /// Physical letters in the order the rig homes them
    pub home_order: Vec<PhysicalAxis>,
    pub pickup: PickupConfig,
    /// Moves run by [`ProtocolEngine::park`], in order
    pub park: Vec<MotionRequest>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: IssueStrategy::PerAxis,
            default_feedrate: 3000.0,
            timeouts: TimeoutPolicy::default(),
            home_order: vec![PhysicalAxis::Z, PhysicalAxis::X, PhysicalAxis::Y],
            pickup: PickupConfig::default(),
            park: vec![
                MotionRequest::new().z(100.0).feedrate(2000.0),
                MotionRequest::new().x(10.0).y(300.0).feedrate(3000.0),
            ],
        }
    }
}

impl EngineConfig {
    /// Check values that would otherwise only fail at the first move
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_feedrate(self.default_feedrate)?;
        if !self.pickup.retract_height.is_finite() {
            return Err(ConfigurationError::InvalidTarget {
                axis: LogicalAxis::Z,
                value: self.pickup.retract_height,
            });
        }
        for request in &self.park {
            request.validate()?;
        }
        Ok(())
    }
}

/// Link state as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Never connected, or disconnected on request
    Disconnected,
    /// Profile applied; commands may be sent
    Ready,
    /// Lost to a timeout, transport failure or rejected profile; reconnect required
    Faulted,
}

/// Command/acknowledgment engine for one rig
pub struct ProtocolEngine {
    transport: Box<dyn Transport>,
    formatter: CommandFormatter,
    config: EngineConfig,
    default_feedrate: f64,
    link: LinkState,
}

impl ProtocolEngine {
    /// Create an engine that exclusively owns `transport`
    pub fn new(
        transport: impl Transport + 'static,
        axis_map: AxisMap,
        config: EngineConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        for request in &config.park {
            for axis in request.targets.keys() {
                axis_map.physical(*axis)?;
            }
        }

        Ok(Self {
            transport: Box::new(transport),
            formatter: CommandFormatter::new(axis_map, config.strategy),
            default_feedrate: config.default_feedrate,
            config,
            link: LinkState::Disconnected,
        })
    }

    /// Current link state
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// Whether commands may be sent
    pub fn is_ready(&self) -> bool {
        self.link == LinkState::Ready
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Axis map in use
    pub fn axis_map(&self) -> &AxisMap {
        self.formatter.axis_map()
    }

    /// Handle that aborts the transport from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.transport.cancel_handle()
    }

    /// Feed rate used by requests without an override
    pub fn default_feedrate(&self) -> f64 {
        self.default_feedrate
    }

    /// Replace the default feed rate; nothing is sent
    pub fn set_default_feedrate(&mut self, value: f64) -> Result<(), ConfigurationError> {
        validate_feedrate(value)?;
        self.default_feedrate = value;
        tracing::debug!("Default feed rate set to {}", value);
        Ok(())
    }

    /// Open the transport and apply `profile`
    ///
    /// The first rejected profile command aborts the connect: the transport
    /// is closed and the link is left `Faulted`.
    pub fn connect(&mut self, profile: &ControllerProfile) -> ProtocolResult<()> {
        if self.transport.is_open() {
            self.transport.close()?;
        }
        self.link = LinkState::Disconnected;

        self.transport.open()?;
        tracing::info!(
            "Connected to {}, applying {} profile commands",
            self.transport.name(),
            profile.len()
        );

        for command in profile.commands() {
            if let Err(err) = self.execute(command) {
                tracing::error!("Profile command '{}' failed: {}", command, err);
                self.fault(&err);
                return Err(err);
            }
        }

        self.link = LinkState::Ready;
        tracing::info!("Controller on {} ready", self.transport.name());
        Ok(())
    }

    /// Close the transport
    pub fn disconnect(&mut self) -> ProtocolResult<()> {
        self.link = LinkState::Disconnected;
        self.transport.close()?;
        tracing::info!("Disconnected from {}", self.transport.name());
        Ok(())
    }

    /// Move to the given logical targets
    ///
    /// Sub-commands are sent in order and the first failure stops the rest.
    pub fn move_axes(&mut self, request: &MotionRequest) -> ProtocolResult<CommandResult> {
        let commands = self.formatter.format(request, self.default_feedrate)?;
        self.guarded(|engine| engine.execute_all(&commands))
    }

    /// Rapid move of the given axes
    pub fn jog(
        &mut self,
        targets: impl IntoIterator<Item = (LogicalAxis, f64)>,
        feedrate: Option<f64>,
    ) -> ProtocolResult<CommandResult> {
        let mut request = MotionRequest::from_targets(targets).mode(MotionMode::Rapid);
        request.feedrate = feedrate;
        self.move_axes(&request)
    }

    /// Retract and descend on logical Z, in the configured order
    ///
    /// The second move is only sent once the first is acknowledged.
    pub fn pickup(&mut self, height: f64, feedrate: Option<f64>) -> ProtocolResult<CommandResult> {
        let retract = self.config.pickup.retract_height;
        let heights = match self.config.pickup.order {
            PickupOrder::RetractFirst => [retract, height],
            PickupOrder::DescendFirst => [height, retract],
        };

        let mut total = CommandResult::acknowledged(Vec::new());
        for z in heights {
            let mut request = MotionRequest::new().z(z).mode(MotionMode::Linear);
            request.feedrate = feedrate;
            let step = self
                .move_axes(&request)
                .map_err(|err| err.with_earlier_diagnostics(&total.diagnostics))?;
            total.absorb(step);
        }
        Ok(total)
    }

    /// Linear Z move at the default feed rate scaled by `speed_factor`
    pub fn move_z(&mut self, height: f64, speed_factor: f64) -> ProtocolResult<CommandResult> {
        let feedrate = self.default_feedrate * speed_factor;
        validate_feedrate(feedrate)?;
        let request = MotionRequest::new()
            .z(height)
            .feedrate(feedrate)
            .mode(MotionMode::Linear);
        self.move_axes(&request)
    }

    /// Home the given logical axes; an empty set sends nothing
    pub fn home(&mut self, axes: &BTreeSet<LogicalAxis>) -> ProtocolResult<CommandResult> {
        let Some(command) = self.formatter.home(axes, &self.config.home_order)? else {
            return Ok(CommandResult::acknowledged(Vec::new()));
        };
        self.guarded(|engine| engine.execute(&command))
    }

    /// Home every axis the map binds
    pub fn home_all(&mut self) -> ProtocolResult<CommandResult> {
        let axes: BTreeSet<LogicalAxis> = self.formatter.axis_map().logical_axes().collect();
        self.home(&axes)
    }

    /// Run the configured park moves in order
    pub fn park(&mut self) -> ProtocolResult<CommandResult> {
        let moves = self.config.park.clone();
        let mut total = CommandResult::acknowledged(Vec::new());
        for request in &moves {
            let step = self
                .move_axes(request)
                .map_err(|err| err.with_earlier_diagnostics(&total.diagnostics))?;
            total.absorb(step);
        }
        Ok(total)
    }

    /// Home, then park
    pub fn home_and_park(&mut self, axes: &BTreeSet<LogicalAxis>) -> ProtocolResult<CommandResult> {
        let mut total = self.home(axes)?;
        let parked = self
            .park()
            .map_err(|err| err.with_earlier_diagnostics(&total.diagnostics))?;
        total.absorb(parked);
        Ok(total)
    }

    /// Release the stepper drivers
    pub fn disable_drive(&mut self) -> ProtocolResult<CommandResult> {
        let command = CommandLine::raw(codes::DISABLE_STEPPERS).with_blocking(true);
        self.guarded(|engine| engine.execute(&command))
    }

    /// Start a program from the controller's storage card
    ///
    /// Select and feed multiplier wait for the barrier; the start command
    /// returns as soon as the controller acknowledges it.
    pub fn run_program(&mut self, path: &str, feed_multiplier: u32) -> ProtocolResult<CommandResult> {
        let path = path.trim();
        if path.is_empty() || path.contains(['\r', '\n']) {
            return Err(ConfigurationError::InvalidProgram {
                reason: format!("invalid program path '{}'", path.escape_debug()),
            }
            .into());
        }

        let commands = [
            CommandLine::raw(format!("{} {}", codes::SELECT_FILE, path)).with_blocking(true),
            CommandLine::raw(format!("{} S{}", codes::FEED_MULTIPLIER, feed_multiplier))
                .with_blocking(true),
            CommandLine::raw(codes::START_FILE),
        ]
        .map(|command| command.with_class(CommandClass::Program));

        tracing::info!("Starting program {} at {}% feed", path, feed_multiplier);
        self.guarded(|engine| engine.execute_all(&commands))
    }

    /// Pause the controller for `ms` milliseconds
    pub fn dwell(&mut self, ms: u64) -> ProtocolResult<CommandResult> {
        let command = CommandLine::raw(format!("{} P{}", codes::DWELL, ms));
        self.guarded(|engine| engine.execute(&command))
    }

    /// Set the fan speed; `None` or zero turns it off
    pub fn set_fan(&mut self, speed: Option<u8>) -> ProtocolResult<CommandResult> {
        let text = match speed {
            None | Some(0) => codes::FAN_OFF.to_string(),
            Some(speed) => format!("{} S{}", codes::FAN_ON, speed),
        };
        let command = CommandLine::raw(text).with_class(CommandClass::Configuration);
        self.guarded(|engine| engine.execute(&command))
    }

    /// Send a command verbatim
    pub fn send_raw(&mut self, text: &str, blocking: bool) -> ProtocolResult<CommandResult> {
        let command = CommandLine::raw(text).with_blocking(blocking);
        if command.is_empty() {
            return Err(ConfigurationError::EmptyCommand.into());
        }
        self.guarded(|engine| engine.execute(&command))
    }

    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> ProtocolResult<T>,
    ) -> ProtocolResult<T> {
        if self.link != LinkState::Ready {
            return Err(ProtocolError::NotConnected);
        }
        let result = op(self);
        if let Err(err) = &result {
            if err.is_link_fatal() {
                self.fault(err);
            }
        }
        result
    }

    fn fault(&mut self, err: &ProtocolError) {
        tracing::warn!("Link to {} faulted: {}", self.transport.name(), err);
        if let Err(close_err) = self.transport.close() {
            tracing::warn!("Failed to close {}: {}", self.transport.name(), close_err);
        }
        self.link = LinkState::Faulted;
    }

    fn execute_all(&mut self, commands: &[CommandLine]) -> ProtocolResult<CommandResult> {
        let mut total = CommandResult::acknowledged(Vec::new());
        for command in commands {
            let step = self
                .execute(command)
                .map_err(|err| err.with_earlier_diagnostics(&total.diagnostics))?;
            total.absorb(step);
        }
        Ok(total)
    }

    /// One command plus, when blocking, its completion barrier
    fn execute(&mut self, command: &CommandLine) -> ProtocolResult<CommandResult> {
        let primary = self.round_trip(command)?;
        if !command.is_blocking() {
            return primary.into_protocol_result();
        }

        let barrier = CommandLine::raw(codes::WAIT_FOR_MOVES)
            .with_silent(command.is_silent())
            .with_class(command.class());
        let settled = self.round_trip(&barrier);

        match primary.outcome {
            // The device error wins over anything the barrier reports
            Outcome::Failed => {
                match &settled {
                    Ok(result) if !result.is_acknowledged() => tracing::warn!(
                        "Barrier after failed '{}' also failed: {}",
                        command,
                        result.error_line().unwrap_or_default()
                    ),
                    Ok(_) => tracing::debug!("Stage settled after failed '{}'", command),
                    Err(err) => {
                        tracing::warn!("Barrier after failed '{}' did not settle: {}", command, err);
                        if err.is_link_fatal() {
                            self.fault(err);
                        }
                    }
                }
                primary.into_protocol_result()
            }
            Outcome::Acknowledged => {
                let settled =
                    settled.map_err(|err| err.with_earlier_diagnostics(&primary.diagnostics))?;
                let mut merged = primary;
                merged.absorb(settled);
                merged.into_protocol_result()
            }
        }
    }

    fn round_trip(&mut self, command: &CommandLine) -> ProtocolResult<CommandResult> {
        for stale in self.transport.discard_input()? {
            tracing::debug!("Discarded stale input: {}", stale);
        }

        tracing::debug!(">> {}", command);
        self.transport.write(command.wire().as_bytes())?;

        let timeout = self.config.timeouts.for_class(command.class());
        ResponseReader::new(command.class(), timeout)
            .silent(command.is_silent())
            .read_until_terminal(self.transport.as_mut())
    }
}
