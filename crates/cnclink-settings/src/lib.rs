//! CncLink Settings Crate
//!
//! Persisted link configuration: serial port, timing windows and service
//! cadences, stored as JSON or TOML in the platform config directory.

pub mod config;
pub mod error;

pub use config::{default_config_path, Config, LinkSettings, AUTO_PORT, PORT_ENV};
pub use error::{SettingsError, SettingsResult};
