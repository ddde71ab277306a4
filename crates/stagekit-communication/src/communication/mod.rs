//! Transport boundary
//!
//! A [`Transport`] is a byte-oriented, line-delimited channel to the motion
//! controller. Writes carry complete command lines; reads hand back one
//! newline-delimited line at a time with trailing whitespace stripped.
//!
//! Every read is bounded by a caller-supplied window and observes a
//! [`CancelHandle`], so a hung controller or an operator abort can always
//! unblock the calling thread.

pub mod serial;
pub mod simulated;

use serde::{Deserialize, Serialize};
use stagekit_core::ProtocolResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// Port name (e.g. "/dev/ttyACM0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1-2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Hardware flow control
    pub flow_control: bool,
}

impl ConnectionParams {
    /// Parameters for a port at the default 115200 8N1
    pub fn serial(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Override the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: false,
        }
    }
}

/// Shared abort flag for a transport
///
/// Clones refer to the same flag. Cancelling makes the pending read (and any
/// later read) on the owning transport fail with a transport error until the
/// transport is opened again.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a fresh, uncancelled handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the transport stop blocking and close
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether a cancel has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag; used when the transport is reopened
    pub(crate) fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Line-oriented channel to a motion controller
///
/// A transport is owned by exactly one protocol engine at a time and is not
/// safe to share between threads without external exclusion; only its
/// [`CancelHandle`] is meant to cross threads.
pub trait Transport: Send {
    /// Open the underlying channel; clears any previous cancel
    fn open(&mut self) -> ProtocolResult<()>;

    /// Close the channel; pending reads on other threads observe the cancel
    fn close(&mut self) -> ProtocolResult<()>;

    /// Whether the channel is open
    fn is_open(&self) -> bool;

    /// Write a complete, already terminated command line
    fn write(&mut self, data: &[u8]) -> ProtocolResult<()>;

    /// Read one line, waiting at most `timeout`
    ///
    /// Returns `Ok(None)` when the window elapses without a complete line.
    fn read_line(&mut self, timeout: Duration) -> ProtocolResult<Option<String>>;

    /// Drop any input received but not yet consumed, returning the dropped lines
    fn discard_input(&mut self) -> ProtocolResult<Vec<String>>;

    /// Handle that can abort this transport from another thread
    fn cancel_handle(&self) -> CancelHandle;

    /// Human readable name for logging
    fn name(&self) -> String;
}

/// Accumulates raw bytes and yields complete lines
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Take the next complete line, trailing whitespace (including `\r`) stripped
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw[..pos]);
        Some(text.trim_end().to_string())
    }

    /// Drain every complete line plus any partial tail
    pub fn drain_all(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).trim_end().to_string();
            self.pending.clear();
            if !tail.is_empty() {
                lines.push(tail);
            }
        }
        lines
    }

    /// Bytes waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_splits_and_strips() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"echo:busy\r\nok");
        assert_eq!(buffer.next_line().as_deref(), Some("echo:busy"));
        assert_eq!(buffer.next_line(), None);
        assert_eq!(buffer.pending_len(), 2);

        buffer.push(b"  \n");
        assert_eq!(buffer.next_line().as_deref(), Some("ok"));
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_line_buffer_drain_all_keeps_partial_tail() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"one\ntwo\nthr");
        assert_eq!(buffer.drain_all(), vec!["one", "two", "thr"]);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn test_default_connection_params() {
        let params = ConnectionParams::serial("/dev/ttyACM0");
        assert_eq!(params.baud_rate, 115_200);
        assert_eq!(params.data_bits, 8);
        assert_eq!(params.stop_bits, 1);
        assert_eq!(params.parity, SerialParity::None);
    }
}
