//! Transport abstraction
//!
//! A [`Transport`] is an open, byte-oriented, line-based connection to the
//! controller. A [`Connector`] finds and opens one. The device link owns the
//! transport exclusively once it is open.

pub mod serial;

use cnclink_core::TransportResult;
use std::time::Duration;

/// Line terminator appended to every command
pub const LINE_TERMINATOR: &[u8] = b"\n";

/// Parameters used to open a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Default blocking read timeout
    pub timeout: Duration,
}

impl ConnectionParams {
    /// Create parameters for `port` at `baud_rate`
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            timeout: Duration::from_millis(100),
        }
    }

    /// Set the default read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::new("", 115_200)
    }
}

/// An open connection to the controller
///
/// Implementations are driven from a blocking thread. `read_line` must
/// return within roughly `timeout`, which is what lets a disconnect
/// interrupt the reader.
pub trait Transport: Send {
    /// Port name this transport is bound to
    fn name(&self) -> &str;

    /// Write all bytes
    fn write(&mut self, data: &[u8]) -> TransportResult<()>;

    /// Read one line, terminator and surrounding whitespace stripped.
    ///
    /// Returns `Ok(None)` if no complete non-empty line arrived in time.
    fn read_line(&mut self, timeout: Duration) -> TransportResult<Option<String>>;

    /// Discard anything pending in the input and output buffers
    fn clear_buffers(&mut self) -> TransportResult<()>;

    /// Close the transport
    fn close(&mut self) -> TransportResult<()>;
}

/// Discovers and opens transports
pub trait Connector: Send + Sync {
    /// Pick a port, preferring `preferred` when it currently exists
    fn discover(&self, preferred: Option<&str>) -> Option<String>;

    /// Open a transport
    fn open(&self, params: &ConnectionParams) -> TransportResult<Box<dyn Transport>>;
}
