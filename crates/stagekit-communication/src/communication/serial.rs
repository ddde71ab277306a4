//! Serial port transport
//!
//! Talks to the motion controller over USB-serial using the `serialport`
//! crate. Reads are done in short slices so a deadline or a cancel request is
//! noticed within one slice even when the controller is silent.
//!
//! Supports:
//! - Port enumeration filtered to likely controller devices
//! - Baud rate, data bits, stop bits, parity and flow control
//! - Bounded, cancellable line reads

use super::{CancelHandle, ConnectionParams, LineBuffer, SerialParity, Transport};
use stagekit_core::{ProtocolError, ProtocolResult};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Granularity of a single blocking read on the port
const READ_SLICE: Duration = Duration::from_millis(10);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports that look like a motion controller
///
/// Keeps Windows `COM*`, Linux `/dev/ttyUSB*` and `/dev/ttyACM*`, and macOS
/// `/dev/cu.usbserial-*` and `/dev/cu.usbmodem*` devices.
pub fn list_ports() -> ProtocolResult<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ProtocolError::transport(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_controller_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let info = info.with_usb_ids(usb.vid, usb.pid);
                    let info = match &usb.manufacturer {
                        Some(mfg) => info.with_manufacturer(mfg),
                        None => info,
                    };
                    SerialPortInfo {
                        serial_number: usb.serial_number.clone(),
                        ..info
                    }
                }
                _ => info,
            }
        })
        .collect())
}

fn is_controller_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

fn to_serialport_parity(parity: SerialParity) -> serialport::Parity {
    match parity {
        SerialParity::None => serialport::Parity::None,
        SerialParity::Even => serialport::Parity::Even,
        SerialParity::Odd => serialport::Parity::Odd,
    }
}

/// Transport over a real serial port
pub struct SerialTransport {
    params: ConnectionParams,
    port: Option<Box<dyn serialport::SerialPort>>,
    buffer: LineBuffer,
    cancel: CancelHandle,
}

impl SerialTransport {
    /// Create a closed transport for the given parameters
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            port: None,
            buffer: LineBuffer::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Connection parameters in use
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    fn builder(&self) -> ProtocolResult<serialport::SerialPortBuilder> {
        let data_bits = match self.params.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(ProtocolError::transport(format!(
                    "Invalid data bits: {}",
                    other
                )))
            }
        };
        let stop_bits = match self.params.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(ProtocolError::transport(format!(
                    "Invalid stop bits: {}",
                    other
                )))
            }
        };

        Ok(serialport::new(&self.params.port, self.params.baud_rate)
            .timeout(READ_SLICE)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(to_serialport_parity(self.params.parity))
            .flow_control(if self.params.flow_control {
                serialport::FlowControl::Hardware
            } else {
                serialport::FlowControl::None
            }))
    }

    fn closed_by_cancel(&mut self) -> ProtocolError {
        self.port = None;
        self.buffer = LineBuffer::new();
        tracing::warn!("Serial port {} closed by cancel request", self.params.port);
        ProtocolError::transport("connection closed")
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> ProtocolResult<()> {
        let port = self.builder()?.open().map_err(|e| {
            tracing::warn!("Failed to open serial port {}: {}", self.params.port, e);
            ProtocolError::transport(format!("Failed to open port {}: {}", self.params.port, e))
        })?;

        tracing::info!(
            "Opened serial port {} at {} baud",
            self.params.port,
            self.params.baud_rate
        );
        self.port = Some(port);
        self.buffer = LineBuffer::new();
        self.cancel.reset();
        Ok(())
    }

    fn close(&mut self) -> ProtocolResult<()> {
        if self.port.take().is_some() {
            tracing::info!("Closed serial port {}", self.params.port);
        }
        self.buffer = LineBuffer::new();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some() && !self.cancel.is_cancelled()
    }

    fn write(&mut self, data: &[u8]) -> ProtocolResult<()> {
        if self.cancel.is_cancelled() {
            return Err(self.closed_by_cancel());
        }
        let port = self.port.as_mut().ok_or(ProtocolError::NotConnected)?;
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(|e| ProtocolError::transport(format!("Write failed: {}", e)))
    }

    fn read_line(&mut self, timeout: Duration) -> ProtocolResult<Option<String>> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.closed_by_cancel());
            }
            if let Some(line) = self.buffer.next_line() {
                return Ok(Some(line));
            }
            let port = self.port.as_mut().ok_or(ProtocolError::NotConnected)?;
            if Instant::now() >= deadline {
                return Ok(None);
            }

            match port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => self.buffer.push(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    return Err(ProtocolError::transport(format!("Read failed: {}", e)));
                }
            }
        }
    }

    fn discard_input(&mut self) -> ProtocolResult<Vec<String>> {
        let mut dropped = self.buffer.drain_all();
        if let Some(port) = self.port.as_mut() {
            let waiting = match port.bytes_to_read() {
                Ok(n) => n as usize,
                Err(e) => {
                    tracing::debug!("Could not size stale input on {}: {}", self.params.port, e);
                    0
                }
            };
            if waiting > 0 {
                let mut stale = vec![0u8; waiting];
                match port.read(&mut stale) {
                    Ok(n) => {
                        let mut tail = LineBuffer::new();
                        tail.push(&stale[..n]);
                        dropped.extend(tail.drain_all());
                    }
                    Err(e) => {
                        tracing::debug!("Could not read stale input on {}: {}", self.params.port, e)
                    }
                }
            }
            port.clear(serialport::ClearBuffer::Input)
                .map_err(|e| ProtocolError::transport(format!("Clear failed: {}", e)))?;
        }
        Ok(dropped)
    }

    fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn name(&self) -> String {
        self.params.port.clone()
    }
}
