//! Response classification and the per-command read loop
//!
//! The controller answers every command with zero or more informational lines
//! followed by exactly one terminal line: `ok` on completion, or a line
//! starting with `Error:` on failure. Lines starting with `echo:` are status
//! chatter and never reach the caller.

use crate::communication::Transport;
use stagekit_core::{CommandClass, ProtocolError, ProtocolResult};
use std::fmt;
use std::time::{Duration, Instant};

/// Completion token
pub const COMPLETION_TOKEN: &str = "ok";
/// Prefix of an error report
pub const ERROR_PREFIX: &str = "Error:";
/// Prefix of an echo line
pub const ECHO_PREFIX: &str = "echo:";

/// One classified line from the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    /// Status chatter, dropped
    Echo(String),
    /// Informational output collected for the caller
    Diagnostic(String),
    /// Error report, terminal
    ErrorReport(String),
    /// Completion token, terminal
    Completion,
}

impl ResponseLine {
    /// Classify a raw line
    ///
    /// Blank lines yield `None` rather than an empty diagnostic; controllers
    /// emit them as padding and they carry nothing for the caller.
    pub fn classify(line: &str) -> Option<Self> {
        let line = line.trim_end();

        if line.trim_start().is_empty() {
            return None;
        }

        if line == COMPLETION_TOKEN {
            return Some(Self::Completion);
        }

        if line.starts_with(ERROR_PREFIX) {
            return Some(Self::ErrorReport(line.to_string()));
        }

        if line.starts_with(ECHO_PREFIX) {
            return Some(Self::Echo(line.to_string()));
        }

        Some(Self::Diagnostic(line.to_string()))
    }

    /// Whether this line ends the command
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ErrorReport(_) | Self::Completion)
    }
}

impl fmt::Display for ResponseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Echo(text) | Self::Diagnostic(text) | Self::ErrorReport(text) => {
                write!(f, "{}", text)
            }
            Self::Completion => write!(f, "{}", COMPLETION_TOKEN),
        }
    }
}

/// Terminal outcome of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Controller answered `ok`
    Acknowledged,
    /// Controller answered with an error report
    Failed,
}

/// Everything the controller said about one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Diagnostic lines in arrival order; for a failure the error line is last
    pub diagnostics: Vec<String>,
    /// Terminal outcome
    pub outcome: Outcome,
}

impl CommandResult {
    /// Acknowledged result with the given diagnostics
    pub fn acknowledged(diagnostics: Vec<String>) -> Self {
        Self {
            diagnostics,
            outcome: Outcome::Acknowledged,
        }
    }

    /// Failed result; the error line must be the last diagnostic
    pub fn failed(diagnostics: Vec<String>) -> Self {
        Self {
            diagnostics,
            outcome: Outcome::Failed,
        }
    }

    /// Whether the controller acknowledged
    pub fn is_acknowledged(&self) -> bool {
        self.outcome == Outcome::Acknowledged
    }

    /// The error line of a failed result
    pub fn error_line(&self) -> Option<&str> {
        match self.outcome {
            Outcome::Failed => self.diagnostics.last().map(String::as_str),
            Outcome::Acknowledged => None,
        }
    }

    /// Append another result's diagnostics; a failure anywhere fails the whole
    pub fn absorb(&mut self, other: CommandResult) {
        self.diagnostics.extend(other.diagnostics);
        if other.outcome == Outcome::Failed {
            self.outcome = Outcome::Failed;
        }
    }

    /// Turn a device failure into a [`ProtocolError::Device`]
    pub fn into_protocol_result(self) -> ProtocolResult<CommandResult> {
        match self.outcome {
            Outcome::Acknowledged => Ok(self),
            Outcome::Failed => Err(ProtocolError::Device {
                message: self.error_line().unwrap_or_default().to_string(),
                diagnostics: self.diagnostics,
            }),
        }
    }
}

/// Reads a command's responses until its terminal line
#[derive(Debug, Clone)]
pub struct ResponseReader {
    class: CommandClass,
    timeout: Duration,
    silent: bool,
}

impl ResponseReader {
    /// Create a reader bounded by `timeout` for a command of `class`
    pub fn new(class: CommandClass, timeout: Duration) -> Self {
        Self {
            class,
            timeout,
            silent: false,
        }
    }

    /// Suppress diagnostic collection and logging
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Read until `ok` or `Error:`
    ///
    /// The whole read shares one deadline. When it passes, the diagnostics
    /// gathered so far are returned inside [`ProtocolError::Timeout`].
    pub fn read_until_terminal(&self, transport: &mut dyn Transport) -> ProtocolResult<CommandResult> {
        let deadline = Instant::now() + self.timeout;
        let mut diagnostics = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(diagnostics));
            }

            let Some(raw) = transport.read_line(remaining)? else {
                return Err(self.timed_out(diagnostics));
            };
            tracing::debug!("<< {}", raw);

            match ResponseLine::classify(&raw) {
                None => {}
                Some(ResponseLine::Echo(text)) => {
                    tracing::trace!("Dropped echo: {}", text);
                }
                Some(ResponseLine::Diagnostic(text)) => {
                    if self.silent {
                        tracing::trace!("Suppressed diagnostic: {}", text);
                    } else {
                        tracing::info!("Controller: {}", text);
                        diagnostics.push(text);
                    }
                }
                Some(ResponseLine::ErrorReport(text)) => {
                    tracing::warn!("Controller reported: {}", text);
                    diagnostics.push(text);
                    return Ok(CommandResult::failed(diagnostics));
                }
                Some(ResponseLine::Completion) => {
                    return Ok(CommandResult::acknowledged(diagnostics));
                }
            }
        }
    }

    fn timed_out(&self, diagnostics: Vec<String>) -> ProtocolError {
        tracing::error!(
            "No terminal response for {} command within {:?}",
            self.class,
            self.timeout
        );
        ProtocolError::Timeout {
            class: self.class,
            timeout_ms: self.timeout.as_millis() as u64,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::simulated::SimulatedTransport;

    fn read(reply: &str, silent: bool) -> ProtocolResult<CommandResult> {
        let mut transport = SimulatedTransport::replying(reply);
        transport.open().unwrap();
        transport.write(b"G0 X1 F3000\r\n").unwrap();
        ResponseReader::new(CommandClass::Motion, Duration::from_secs(1))
            .silent(silent)
            .read_until_terminal(&mut transport)
    }

    #[test]
    fn test_classify() {
        assert_eq!(ResponseLine::classify("ok"), Some(ResponseLine::Completion));
        assert_eq!(ResponseLine::classify("ok \r"), Some(ResponseLine::Completion));
        assert_eq!(
            ResponseLine::classify("Error:Printer halted"),
            Some(ResponseLine::ErrorReport("Error:Printer halted".to_string()))
        );
        assert_eq!(
            ResponseLine::classify("echo:busy: processing"),
            Some(ResponseLine::Echo("echo:busy: processing".to_string()))
        );
        assert_eq!(
            ResponseLine::classify("X:10.00 Y:0.00 Z:5.00"),
            Some(ResponseLine::Diagnostic("X:10.00 Y:0.00 Z:5.00".to_string()))
        );
        assert_eq!(
            ResponseLine::classify("okay"),
            Some(ResponseLine::Diagnostic("okay".to_string()))
        );
        assert_eq!(
            ResponseLine::classify("error:1"),
            Some(ResponseLine::Diagnostic("error:1".to_string()))
        );
        assert_eq!(ResponseLine::classify("   "), None);
    }

    #[test]
    fn test_echo_dropped_diagnostics_kept() {
        let result = read("echo:busy\nstart\nX:1.00\nok\n", false).unwrap();
        assert_eq!(result.outcome, Outcome::Acknowledged);
        assert_eq!(result.diagnostics, vec!["start", "X:1.00"]);
    }

    #[test]
    fn test_error_terminates_and_is_last() {
        let result = read("note\nError:cold extrusion\nok\n", false).unwrap();
        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.diagnostics, vec!["note", "Error:cold extrusion"]);
        assert_eq!(result.error_line(), Some("Error:cold extrusion"));
    }

    #[test]
    fn test_silent_still_detects_errors() {
        let result = read("chatter\nok\n", true).unwrap();
        assert!(result.diagnostics.is_empty());

        let result = read("chatter\nError:bad\n", true).unwrap();
        assert_eq!(result.diagnostics, vec!["Error:bad"]);
        assert_eq!(result.outcome, Outcome::Failed);
    }

    #[test]
    fn test_missing_terminal_times_out() {
        let err = read("X:1.00\n", false).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Timeout {
                class: CommandClass::Motion,
                timeout_ms: 1000,
                diagnostics: vec!["X:1.00".to_string()],
            }
        );
    }

    #[test]
    fn test_into_protocol_result() {
        let err = CommandResult::failed(vec!["Error:cold extrusion".to_string()])
            .into_protocol_result()
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Device {
                message: "Error:cold extrusion".to_string(),
                diagnostics: vec!["Error:cold extrusion".to_string()],
            }
        );
    }

    #[test]
    fn test_absorb() {
        let mut total = CommandResult::acknowledged(vec!["a".to_string()]);
        total.absorb(CommandResult::acknowledged(vec!["b".to_string()]));
        assert!(total.is_acknowledged());
        total.absorb(CommandResult::failed(vec!["Error:c".to_string()]));
        assert_eq!(total.diagnostics, vec!["a", "b", "Error:c"]);
        assert_eq!(total.error_line(), Some("Error:c"));
    }
}
