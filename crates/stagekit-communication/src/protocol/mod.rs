//! Command/acknowledgment protocol
//!
//! - [`command`]: command lines and motion formatting
//! - [`response`]: line classification and the bounded read loop
//! - [`profile`]: configuration replayed at connect
//! - [`engine`]: the send/await-completion engine

pub mod command;
pub mod engine;
pub mod profile;
pub mod response;

pub use command::{codes, CommandFormatter, CommandLine, IssueStrategy, LINE_TERMINATOR};
pub use engine::{EngineConfig, LinkState, PickupConfig, PickupOrder, ProtocolEngine, TimeoutPolicy};
pub use profile::{ControllerProfile, ProfileSettings};
pub use response::{
    CommandResult, Outcome, ResponseLine, ResponseReader, COMPLETION_TOKEN, ECHO_PREFIX,
    ERROR_PREFIX,
};
