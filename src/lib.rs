//! # StageKit
//!
//! Drives serial-attached multi-axis motion stages (pen plotters,
//! pick-and-place and imaging rigs) through a synchronous
//! command/acknowledgment protocol.
//!
//! ## Architecture
//!
//! StageKit is organized as a workspace with multiple crates:
//!
//! 1. **stagekit-core** - Axis wiring, motion requests, error taxonomy
//! 2. **stagekit-communication** - Serial transport, response handling, protocol engine
//! 3. **stagekit-settings** - Rig configuration files and presets
//! 4. **stagekit** - Command line binary that integrates all crates

pub use stagekit_communication::{
    codes, list_ports, CancelHandle, CommandFormatter, CommandLine, CommandResult,
    ConnectionParams, ControllerProfile, EngineConfig, IssueStrategy, LinkState, Outcome,
    PickupConfig, PickupOrder, ProfileSettings, ProtocolEngine, SerialPortInfo, SerialTransport,
    SimulatedTransport, TimeoutPolicy, Transport,
};

pub use stagekit_core::{
    AxisBinding, AxisMap, CommandClass, ConfigurationError, Error, FailureKind, LogicalAxis,
    MotionMode, MotionRequest, PhysicalAxis, ProtocolError, Result,
};

pub use stagekit_settings::{presets, RigConfig, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Environment variable selecting the log output format
pub const LOG_FORMAT_ENV: &str = "STAGEKIT_LOG_FORMAT";

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support, `info` when unset
/// - Human readable output on stderr, or JSON lines when
///   `STAGEKIT_LOG_FORMAT=json`
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
