//! # CncLink
//!
//! Serial device link for Maslow/GRBL-style CNC controllers with real-time
//! event fan-out.
//!
//! ## Architecture
//!
//! CncLink is organized as a workspace with multiple crates:
//!
//! 1. **cnclink-core** - Machine status model, link events, event queue and bus, errors
//! 2. **cnclink-communication** - Serial transport, status frame parser, device link
//! 3. **cnclink-settings** - Persisted link configuration
//! 4. **cnclink** - This crate: logging setup, settings wiring and the console binary
//!
//! A [`DeviceLink`] owns the serial port. A dedicated reader thread turns
//! device output into [`LinkEvent`]s on a shared queue; commands are sent
//! through a correlator that captures whatever the device prints during a
//! fixed window. The [`EventBus`] drains the queue on its own schedule and
//! fans each event out to every subscriber.

pub mod console;

pub use cnclink_core::{
    ConnectionState, ConnectionStatus, Error, EventBus, LinkEvent, MachineStatus, Position,
    Result, Subscription, SubscriptionId, TransportError,
};

pub use cnclink_communication::{
    list_ports, Axis, DeviceLink, LinkConfig, LinkServices, MaslowCommand, RealtimeCommand,
    SerialPortInfo,
};

pub use cnclink_settings::{Config, LinkSettings, SettingsError};

use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr, keeping stdout for event lines
/// - RUST_LOG environment variable support, INFO by default
/// - Pretty or JSON formatting
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);
        registry.with(fmt_layer).try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_line_number(true)
            .pretty();
        registry.with(fmt_layer).try_init()?;
    }

    Ok(())
}

/// Build the runtime link configuration from persisted settings
pub fn link_config_from(settings: &LinkSettings) -> LinkConfig {
    LinkConfig {
        port: settings.port_override().map(str::to_string),
        baud_rate: settings.baud_rate,
        settle_delay: Duration::from_millis(settings.settle_delay_ms),
        read_timeout: Duration::from_millis(settings.read_timeout_ms),
        command_window: Duration::from_millis(settings.command_window_ms),
        initial_query_window: Duration::from_millis(settings.initial_query_window_ms),
        poll_interval: Duration::from_millis(settings.poll_interval_ms),
        poll_window: Duration::from_millis(settings.poll_window_ms),
        drain_interval: Duration::from_millis(settings.drain_interval_ms),
        publish_snapshot_on_poll: settings.publish_snapshot_on_poll,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_match_default_link_config() {
        assert_eq!(link_config_from(&LinkSettings::default()), LinkConfig::default());
    }

    #[test]
    fn test_explicit_port_carried_over() {
        let settings = LinkSettings {
            port: "/dev/ttyUSB0".to_string(),
            poll_interval_ms: 1500,
            ..LinkSettings::default()
        };
        let config = link_config_from(&settings);
        assert_eq!(config.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.poll_interval, Duration::from_millis(1500));
    }
}
