//! Serial port communication implementation
//!
//! Provides the serial [`Transport`] used to talk to the controller over
//! USB, plus port enumeration and the discovery heuristic.
//!
//! Supports:
//! - Port enumeration with USB details
//! - Discovery: configured port first, then the first USB/ACM device
//! - Line-oriented blocking reads with a timeout

use crate::communication::{ConnectionParams, Connector, Transport};
use cnclink_core::{TransportError, TransportResult};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Information about an available serial port
#[derive(Debug, Clone, Serialize)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
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

    /// Set USB details
    fn with_usb(mut self, usb: &serialport::UsbPortInfo) -> Self {
        self.vid = Some(usb.vid);
        self.pid = Some(usb.pid);
        self.manufacturer = usb.manufacturer.clone();
        self.serial_number = usb.serial_number.clone();
        self
    }

    /// Check if this looks like a USB or ACM serial device
    pub fn is_usb_candidate(&self) -> bool {
        is_usb_candidate(&self.port_name)
    }
}

/// List available serial ports on the system
pub fn list_ports() -> TransportResult<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        TransportError::FailedToOpen {
            port: "*".to_string(),
            reason: format!("Failed to enumerate ports: {}", e),
        }
    })?;

    Ok(ports
        .iter()
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, get_port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => info.with_usb(usb),
                _ => info,
            }
        })
        .collect())
}

/// Check if a port name carries a USB/ACM marker
///
/// Covers `/dev/ttyUSB*`, `/dev/ttyACM*`, `/dev/cu.usbmodem*` and
/// `/dev/cu.usbserial-*`.
pub fn is_usb_candidate(port_name: &str) -> bool {
    let lower = port_name.to_ascii_lowercase();
    lower.contains("usb") || lower.contains("acm")
}

/// Choose a port: `preferred` if it exists, else the first USB/ACM candidate
///
/// This is a heuristic. With several devices attached it may pick the
/// wrong one.
pub fn select_port(
    preferred: Option<&str>,
    exists: impl Fn(&str) -> bool,
    available: &[String],
) -> Option<String> {
    if let Some(port) = preferred {
        if exists(port) {
            return Some(port.to_string());
        }
        tracing::debug!("Configured port {} not present, scanning", port);
    }

    available.iter().find(|p| is_usb_candidate(p)).cloned()
}

/// Discover the controller port on this system
pub fn discover_port(preferred: Option<&str>) -> Option<String> {
    let available: Vec<String> = match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    };

    select_port(preferred, |p| Path::new(p).exists(), &available)
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Map a `serialport` open failure onto the transport taxonomy
fn map_open_error(port: &str, error: serialport::Error) -> TransportError {
    let port = port.to_string();
    match error.kind() {
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(io::ErrorKind::NotFound) => {
            TransportError::PortNotFound { port }
        }
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied { port }
        }
        serialport::ErrorKind::Io(io::ErrorKind::ResourceBusy) => {
            TransportError::DeviceBusy { port }
        }
        _ if error.description.to_ascii_lowercase().contains("busy") => {
            TransportError::DeviceBusy { port }
        }
        _ => TransportError::FailedToOpen {
            port,
            reason: error.to_string(),
        },
    }
}

/// Longest unterminated line kept; anything longer is dropped up to the
/// next newline
pub(crate) const MAX_LINE_BYTES: usize = 4096;

/// Splits a byte stream into trimmed, non-empty text lines
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
    /// Bytes of `pending` already known to hold no newline
    scanned: usize,
    /// Skipping the rest of an oversized line
    discarding: bool,
}

impl LineBuffer {
    /// Append raw bytes
    pub(crate) fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Pop the next complete non-empty line
    pub(crate) fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(offset) = self.pending[self.scanned..].iter().position(|b| *b == b'\n')
            else {
                self.scanned = self.pending.len();
                if self.scanned > MAX_LINE_BYTES {
                    if !self.discarding {
                        tracing::warn!(
                            "Dropping unterminated device line over {} bytes",
                            MAX_LINE_BYTES
                        );
                    }
                    self.discarding = true;
                    self.pending.clear();
                    self.scanned = 0;
                }
                return None;
            };

            let end = self.scanned + offset;
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }

            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Drop buffered bytes
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.scanned = 0;
        self.discarding = false;
    }
}

/// Serial transport backed by the `serialport` crate
pub struct SerialTransport {
    name: String,
    port: Box<dyn serialport::SerialPort>,
    lines: LineBuffer,
    closed: bool,
}

impl SerialTransport {
    /// Open a serial port with the given parameters (8N1, no flow control)
    pub fn open(params: &ConnectionParams) -> TransportResult<Self> {
        let port = serialport::new(&params.port, params.baud_rate)
            .timeout(params.timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                map_open_error(&params.port, e)
            })?;

        Ok(Self {
            name: params.port.clone(),
            port,
            lines: LineBuffer::default(),
            closed: false,
        })
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        self.ensure_open()?;
        self.port
            .write_all(data)
            .and_then(|_| self.port.flush())
            .map_err(|e| TransportError::Write {
                reason: e.to_string(),
            })
    }

    fn read_line(&mut self, timeout: Duration) -> TransportResult<Option<String>> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];

        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(Some(line));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            self.port
                .set_timeout(remaining)
                .map_err(|e| TransportError::Read {
                    reason: e.to_string(),
                })?;

            match self.port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => self.lines.push(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    return Err(TransportError::Read {
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    fn clear_buffers(&mut self) -> TransportResult<()> {
        self.ensure_open()?;
        self.lines.clear();
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(|e| TransportError::Read {
                reason: e.to_string(),
            })
    }

    fn close(&mut self) -> TransportResult<()> {
        // The OS handle is released when the port is dropped.
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.lines.clear();
        let _ = self.port.flush();
        Ok(())
    }
}

/// Connector for real serial devices
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn discover(&self, preferred: Option<&str>) -> Option<String> {
        discover_port(preferred)
    }

    fn open(&self, params: &ConnectionParams) -> TransportResult<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(params)?))
    }
}
