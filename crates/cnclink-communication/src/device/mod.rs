//! Device link
//!
//! Owns the open transport and everything that touches it: the connect and
//! disconnect lifecycle, the reader thread, the command correlator and the
//! periodic status poll. Only one context reads the transport at a time; the
//! transport mutex is that single-reader lock.

mod correlator;
mod link;
mod reader;
mod services;

pub use link::DeviceLink;
pub use services::LinkServices;

use std::time::Duration;

/// Runtime configuration of a [`DeviceLink`]
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// Preferred port; discovery falls back to the first USB/ACM device
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Wait after opening while the controller reinitialises its serial stack
    pub settle_delay: Duration,
    /// Blocking read timeout; bounds how long a disconnect waits for the reader
    pub read_timeout: Duration,
    /// Default correlation window for `send_command`
    pub command_window: Duration,
    /// Correlation window of the status query issued right after connecting
    pub initial_query_window: Duration,
    /// Status poll period
    pub poll_interval: Duration,
    /// Correlation window of each poll query
    pub poll_window: Duration,
    /// Event bus drain period
    pub drain_interval: Duration,
    /// Queue a snapshot after every poll, connected or not
    pub publish_snapshot_on_poll: bool,
}

impl LinkConfig {
    /// Default configuration bound to a specific port
    pub fn with_port(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            ..Self::default()
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            settle_delay: Duration::from_secs(2),
            read_timeout: Duration::from_millis(100),
            command_window: Duration::from_secs(2),
            initial_query_window: Duration::from_millis(500),
            poll_interval: Duration::from_secs(3),
            poll_window: Duration::from_millis(500),
            drain_interval: Duration::from_millis(100),
            publish_snapshot_on_poll: true,
        }
    }
}
