//! Error handling for StageKit
//!
//! Provides the error types that cross the protocol boundary:
//! - Configuration errors (malformed axis maps, empty or invalid motion requests)
//! - Protocol errors (device error reports, timeouts, transport loss)
//!
//! All error types use `thiserror`. Device text is always carried verbatim so
//! an operator can read the controller's own fault message.

use crate::axis::{LogicalAxis, PhysicalAxis};
use crate::motion::CommandClass;
use thiserror::Error;

/// Configuration error type
///
/// Programmer or configuration mistakes. Fatal at the call site and never
/// retried; nothing is transmitted when one of these is raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Axis name is not one of X, Y, Z
    #[error("Unknown axis: {name}")]
    UnknownAxis {
        /// The name that failed to parse.
        name: String,
    },

    /// Logical axis has no binding in the rig's axis map
    #[error("Logical axis {axis} is not mapped on this rig")]
    UnmappedAxis {
        /// The unbound logical axis.
        axis: LogicalAxis,
    },

    /// Two logical axes bound to the same wire letter
    #[error("Physical axis {physical} bound to both {first} and {second}")]
    DuplicatePhysicalAxis {
        /// The shared wire letter.
        physical: PhysicalAxis,
        /// The logical axis bound first.
        first: LogicalAxis,
        /// The logical axis that collided.
        second: LogicalAxis,
    },

    /// Motion request without any axis target
    #[error("Motion request has no axis targets")]
    EmptyMotion,

    /// Axis target is NaN or infinite
    #[error("Invalid target {value} for axis {axis}")]
    InvalidTarget {
        /// The axis carrying the bad value.
        axis: LogicalAxis,
        /// The rejected value.
        value: f64,
    },

    /// Feed rate is not a positive finite number
    #[error("Invalid feed rate: {value}")]
    InvalidFeedrate {
        /// The rejected value.
        value: f64,
    },

    /// Raw command with no text
    #[error("Command text is empty")]
    EmptyCommand,

    /// Stored program reference or multiplier rejected
    #[error("Invalid program request: {reason}")]
    InvalidProgram {
        /// Why the request was rejected.
        reason: String,
    },

    /// Controller profile is malformed
    #[error("Invalid controller profile: {reason}")]
    InvalidProfile {
        /// Why the profile was rejected.
        reason: String,
    },
}

/// Coarse tag for a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad request or rig configuration
    Configuration,
    /// Controller reported an error line
    Device,
    /// Controller did not finish within the bound
    Timeout,
    /// Serial link failed or is not open
    Transport,
}

/// Protocol error type
///
/// Every way a command round trip can fail. Returned as a value, never
/// panicked across the engine boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Request rejected before transmission
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Controller answered with an error line
    #[error("Device error: {message}")]
    Device {
        /// The error line exactly as received.
        message: String,
        /// Diagnostic lines received for the command, error line last.
        diagnostics: Vec<String>,
    },

    /// No terminal response within the bound for this command class
    #[error("{class} command timed out after {timeout_ms}ms")]
    Timeout {
        /// Command class whose bound was exceeded.
        class: CommandClass,
        /// The bound in milliseconds.
        timeout_ms: u64,
        /// Diagnostic lines received before giving up.
        diagnostics: Vec<String>,
    },

    /// Transport failed or was closed
    #[error("Transport error: {reason}")]
    Transport {
        /// What went wrong on the link.
        reason: String,
    },

    /// Operation attempted without a successful connect
    #[error("Not connected")]
    NotConnected,
}

impl ProtocolError {
    /// Create a transport error from a message
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Tag describing the failure class
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Configuration(_) => FailureKind::Configuration,
            Self::Device { .. } => FailureKind::Device,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Transport { .. } | Self::NotConnected => FailureKind::Transport,
        }
    }

    /// Device text gathered before the failure
    pub fn diagnostics(&self) -> &[String] {
        match self {
            Self::Device { diagnostics, .. } | Self::Timeout { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    /// Put device text from earlier sub-commands ahead of this error's own
    pub fn with_earlier_diagnostics(self, earlier: &[String]) -> Self {
        if earlier.is_empty() {
            return self;
        }
        let joined =
            |own: Vec<String>| -> Vec<String> { earlier.iter().cloned().chain(own).collect() };
        match self {
            Self::Device {
                message,
                diagnostics,
            } => Self::Device {
                message,
                diagnostics: joined(diagnostics),
            },
            Self::Timeout {
                class,
                timeout_ms,
                diagnostics,
            } => Self::Timeout {
                class,
                timeout_ms,
                diagnostics: joined(diagnostics),
            },
            other => other,
        }
    }

    /// Only timeouts may be retried; a device error leaves the stage in an
    /// unknown physical state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Errors after which the link must be re-established
    pub fn is_link_fatal(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport { .. } | Self::NotConnected
        )
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Main error type for StageKit
///
/// Umbrella over every layer, used by the binary and the settings loader.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Protocol(ProtocolError::Timeout { .. }))
    }

    /// Check if this is a device error report
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::Protocol(ProtocolError::Device { .. }))
    }

    /// Check if this is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::Protocol(ProtocolError::Configuration(_))
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
