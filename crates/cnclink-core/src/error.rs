//! Error handling for CncLink
//!
//! Errors are split by how far they are allowed to travel:
//! - Transport errors (port missing, open/read/write failure) end the current
//!   session and are surfaced to the caller
//! - `NotConnected` is surfaced immediately, without touching the transport
//! - Protocol parse errors never leave the status frame parser
//! - Subscriber delivery errors never leave the event bus
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::event_bus::SubscriptionId;

/// Transport error type
///
/// Represents failures of the physical connection to the controller.
/// Any of these is fatal to the current session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Configured port does not exist
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Discovery found no candidate device
    #[error("No serial port found")]
    NoPortDiscovered,

    /// The process may not open the port
    #[error("Permission denied opening {port}")]
    PermissionDenied {
        /// The port that was refused.
        port: String,
    },

    /// Another process holds the port
    #[error("Device busy: {port}")]
    DeviceBusy {
        /// The port that is in use.
        port: String,
    },

    /// Failed to open port for any other reason
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Writing to the device failed
    #[error("Write failed: {reason}")]
    Write {
        /// The underlying I/O failure.
        reason: String,
    },

    /// Reading from the device failed
    #[error("Read failed: {reason}")]
    Read {
        /// The underlying I/O failure.
        reason: String,
    },

    /// The transport was closed underneath the caller
    #[error("Transport closed")]
    Closed,
}

/// Status frame parse error type
///
/// Produced while extracting fields from a `<...>` status frame.
/// These are logged by the parser and never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolParseError {
    /// Line is not a `<...>` status frame
    #[error("Not a status frame: {line}")]
    NotAFrame {
        /// The offending line.
        line: String,
    },

    /// A marker was present but its segment was empty
    #[error("Empty {marker} segment")]
    MissingSegment {
        /// The marker, e.g. `MPos`.
        marker: &'static str,
    },

    /// Fewer non-empty fields than required
    #[error("{marker} needs {expected} fields, got '{segment}'")]
    IncompleteFields {
        /// The marker, e.g. `FS`.
        marker: &'static str,
        /// Number of required fields.
        expected: usize,
        /// The raw segment text.
        segment: String,
    },

    /// A field did not parse as a finite number
    #[error("Invalid number '{token}' in {marker}")]
    InvalidNumber {
        /// The marker, e.g. `MPos`.
        marker: &'static str,
        /// The token that failed.
        token: String,
    },
}

/// Subscriber delivery error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriberDeliveryError {
    /// The subscriber's receiving side has been dropped
    #[error("Subscriber {0} channel closed")]
    Closed(SubscriptionId),
}

/// Main error type for CncLink
///
/// Only transport failures and `NotConnected` are returned by link
/// operations. The remaining variants cover I/O outside the link.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Command attempted while disconnected
    #[error("Not connected to device")]
    NotConnected,

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

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a not-connected error
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Error::NotConnected)
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::PortNotFound {
            port: "/dev/ttyACM0".to_string(),
        };
        assert_eq!(err.to_string(), "Port not found: /dev/ttyACM0");
        assert_eq!(
            TransportError::NoPortDiscovered.to_string(),
            "No serial port found"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = TransportError::Closed.into();
        assert!(err.is_transport_error());
        assert!(!err.is_not_connected());
        assert_eq!(err.to_string(), "Transport closed");

        assert!(Error::NotConnected.is_not_connected());
    }

    #[test]
    fn test_parse_error_display() {
        let err = ProtocolParseError::IncompleteFields {
            marker: "MPos",
            expected: 3,
            segment: "1.0,2.0".to_string(),
        };
        assert_eq!(err.to_string(), "MPos needs 3 fields, got '1.0,2.0'");
    }
}
