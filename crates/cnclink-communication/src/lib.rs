//! # CncLink Communication
//!
//! The device link for CncLink: serial transport and discovery, status
//! frame parsing, command/response correlation over a timing window, and
//! the background reader, drain and status-poll services that feed
//! subscribers.

pub mod communication;
pub mod device;
pub mod firmware;

pub use communication::{
    serial::{discover_port, list_ports, SerialConnector, SerialPortInfo, SerialTransport},
    ConnectionParams, Connector, Transport, LINE_TERMINATOR,
};

pub use device::{DeviceLink, LinkConfig, LinkServices};

pub use firmware::{
    grbl::{RealtimeCommand, StatusParser, STATUS_QUERY},
    maslow::{Axis, CommandError, MaslowCommand},
};
