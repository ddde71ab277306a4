//! Simulated controller transport
//!
//! Stands in for a serial-attached controller: every line written is recorded
//! and handed to a responder, whose reply bytes become the readable input.
//! A silent responder models a hung controller; reads then report the window
//! as elapsed immediately instead of sleeping.

use super::{CancelHandle, LineBuffer, Transport};
use parking_lot::Mutex;
use stagekit_core::{ProtocolError, ProtocolResult};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

type Responder = Box<dyn FnMut(&str) -> String + Send>;

/// Shared record of every command line written to a simulated transport
#[derive(Debug, Clone, Default)]
pub struct SentLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl SentLog {
    /// Snapshot of the lines written so far, without terminators
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of lines written
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// True when nothing has been written
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Lines starting with the given command word
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    fn push(&self, line: String) {
        self.lines.lock().push(line);
    }
}

/// Scripted in-memory transport
pub struct SimulatedTransport {
    responder: Responder,
    input: LineBuffer,
    sent: SentLog,
    open: bool,
    cancel: CancelHandle,
}

impl SimulatedTransport {
    /// Create a transport whose replies are computed from each written line
    pub fn new(responder: impl FnMut(&str) -> String + Send + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            input: LineBuffer::new(),
            sent: SentLog::default(),
            open: false,
            cancel: CancelHandle::new(),
        }
    }

    /// Reply with the same bytes to every command
    pub fn replying(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| reply.clone())
    }

    /// Acknowledge every command with a bare `ok`
    pub fn acknowledging() -> Self {
        Self::replying("ok\n")
    }

    /// Reply to the n-th command with the n-th script entry, then go silent
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue: VecDeque<String> = replies.into_iter().map(Into::into).collect();
        Self::new(move |_| queue.pop_front().unwrap_or_default())
    }

    /// Handle onto the record of written lines
    pub fn sent_log(&self) -> SentLog {
        self.sent.clone()
    }
}

impl Transport for SimulatedTransport {
    fn open(&mut self) -> ProtocolResult<()> {
        self.open = true;
        self.input = LineBuffer::new();
        self.cancel.reset();
        Ok(())
    }

    fn close(&mut self) -> ProtocolResult<()> {
        self.open = false;
        self.input = LineBuffer::new();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open && !self.cancel.is_cancelled()
    }

    fn write(&mut self, data: &[u8]) -> ProtocolResult<()> {
        if self.cancel.is_cancelled() {
            self.open = false;
            return Err(ProtocolError::transport("connection closed"));
        }
        if !self.open {
            return Err(ProtocolError::NotConnected);
        }

        let text = String::from_utf8_lossy(data);
        let line = text.trim_end_matches(['\r', '\n']).to_string();
        let reply = (self.responder)(&line);
        self.sent.push(line);
        self.input.push(reply.as_bytes());
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> ProtocolResult<Option<String>> {
        if self.cancel.is_cancelled() {
            self.open = false;
            return Err(ProtocolError::transport("connection closed"));
        }
        if !self.open {
            return Err(ProtocolError::NotConnected);
        }
        Ok(self.input.next_line())
    }

    fn discard_input(&mut self) -> ProtocolResult<Vec<String>> {
        Ok(self.input.drain_all())
    }

    fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn name(&self) -> String {
        "simulated".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replies_in_order() {
        let mut transport = SimulatedTransport::scripted(["echo:busy\nok\n", "Error:bad\n"]);
        transport.open().unwrap();

        transport.write(b"G28\r\n").unwrap();
        assert_eq!(
            transport.read_line(Duration::ZERO).unwrap().as_deref(),
            Some("echo:busy")
        );
        assert_eq!(
            transport.read_line(Duration::ZERO).unwrap().as_deref(),
            Some("ok")
        );
        assert_eq!(transport.read_line(Duration::ZERO).unwrap(), None);

        transport.write(b"M84\r\n").unwrap();
        transport.write(b"M400\r\n").unwrap();
        assert_eq!(transport.sent_log().lines(), vec!["G28", "M84", "M400"]);
        assert_eq!(
            transport.discard_input().unwrap(),
            vec!["Error:bad".to_string()]
        );
    }

    #[test]
    fn test_requires_open() {
        let mut transport = SimulatedTransport::acknowledging();
        assert_eq!(transport.write(b"M84\r\n"), Err(ProtocolError::NotConnected));
        assert!(transport.sent_log().is_empty());
    }

    #[test]
    fn test_cancel_closes() {
        let mut transport = SimulatedTransport::acknowledging();
        transport.open().unwrap();
        transport.cancel_handle().cancel();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.read_line(Duration::from_secs(1)),
            Err(ProtocolError::Transport { .. })
        ));

        transport.open().unwrap();
        assert!(transport.is_open());
    }
}
