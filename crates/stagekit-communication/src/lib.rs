//! # StageKit Communication
//!
//! Transport and protocol layers for driving a motorized stage:
//! - [`communication`]: the byte/line transport boundary (serial port and a
//!   scripted simulator), with cancellable reads
//! - [`protocol`]: command formatting, response classification, controller
//!   profiles and the [`ProtocolEngine`] that ties them together

pub mod communication;
pub mod protocol;

pub use communication::{
    serial::{list_ports, SerialPortInfo, SerialTransport},
    simulated::{SentLog, SimulatedTransport},
    CancelHandle, ConnectionParams, LineBuffer, SerialParity, Transport,
};

pub use protocol::{
    codes, CommandFormatter, CommandLine, CommandResult, ControllerProfile, EngineConfig,
    IssueStrategy, LinkState, Outcome, PickupConfig, PickupOrder, ProfileSettings,
    ProtocolEngine, ResponseLine, ResponseReader, TimeoutPolicy,
};
