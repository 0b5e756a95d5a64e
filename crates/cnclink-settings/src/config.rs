//! Configuration management for CncLink
//!
//! Provides configuration file handling and validation for the device link.
//! Supports JSON and TOML file formats stored in the platform-specific config
//! directory. Every field has a default, so a file only needs the values it
//! changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SettingsError, SettingsResult};

/// Port value meaning "discover the device"
pub const AUTO_PORT: &str = "Auto";

/// Environment variable overriding the configured port
pub const PORT_ENV: &str = "MASLOW_SERIAL_PORT";

/// Link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Serial port path, or "Auto" to discover a USB/ACM device
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Wait after opening the port before talking to the device
    pub settle_delay_ms: u64,
    /// Blocking read timeout of the reader
    pub read_timeout_ms: u64,
    /// Default response window of a command
    pub command_window_ms: u64,
    /// Response window of the status query sent on connect
    pub initial_query_window_ms: u64,
    /// Status poll period
    pub poll_interval_ms: u64,
    /// Response window of each status poll
    pub poll_window_ms: u64,
    /// Event delivery period
    pub drain_interval_ms: u64,
    /// Publish the machine status after every poll
    pub publish_snapshot_on_poll: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rate: 115200,
            settle_delay_ms: 2000,
            read_timeout_ms: 100,
            command_window_ms: 2000,
            initial_query_window_ms: 500,
            poll_interval_ms: 3000,
            poll_window_ms: 500,
            drain_interval_ms: 100,
            publish_snapshot_on_poll: true,
        }
    }
}

impl LinkSettings {
    /// Explicit port, or `None` when the port is to be discovered
    pub fn port_override(&self) -> Option<&str> {
        let port = self.port.trim();
        if port.is_empty() || port.eq_ignore_ascii_case(AUTO_PORT) {
            None
        } else {
            Some(port)
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Device link settings
    pub link: LinkSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load config from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating the parent directory
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let link = &self.link;

        if link.baud_rate == 0 {
            return Err(SettingsError::invalid("baud_rate", "must be > 0"));
        }

        let durations = [
            ("read_timeout_ms", link.read_timeout_ms),
            ("command_window_ms", link.command_window_ms),
            ("initial_query_window_ms", link.initial_query_window_ms),
            ("poll_interval_ms", link.poll_interval_ms),
            ("poll_window_ms", link.poll_window_ms),
            ("drain_interval_ms", link.drain_interval_ms),
        ];
        for (key, value) in durations {
            if value == 0 {
                return Err(SettingsError::invalid(key, "must be > 0"));
            }
        }

        if link.poll_window_ms >= link.poll_interval_ms {
            return Err(SettingsError::invalid(
                "poll_window_ms",
                "must be shorter than poll_interval_ms",
            ));
        }

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_port_override(std::env::var(PORT_ENV).ok());
    }

    /// Replace the port with `port` when it is set and non-blank
    pub fn apply_port_override(&mut self, port: Option<String>) {
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            tracing::debug!("Port overridden to {}", port);
            self.link.port = port.trim().to_string();
        }
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("cnclink").join("config.toml"))
        .ok_or_else(|| SettingsError::ConfigDirectory("no platform config directory".to_string()))
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            _ => Err(SettingsError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.link.port, "Auto");
        assert_eq!(config.link.baud_rate, 115200);
        assert_eq!(config.link.command_window_ms, 2000);
        assert_eq!(config.link.poll_interval_ms, 3000);
        assert!(config.link.publish_snapshot_on_poll);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_override() {
        let mut link = LinkSettings::default();
        assert_eq!(link.port_override(), None);

        link.port = "auto".to_string();
        assert_eq!(link.port_override(), None);

        link.port = " /dev/ttyACM0 ".to_string();
        assert_eq!(link.port_override(), Some("/dev/ttyACM0"));
    }

    #[test]
    fn test_apply_port_override() {
        let mut config = Config::new();
        config.apply_port_override(None);
        assert_eq!(config.link.port, "Auto");

        config.apply_port_override(Some("  ".to_string()));
        assert_eq!(config.link.port, "Auto");

        config.apply_port_override(Some("/dev/cu.usbmodem12201".to_string()));
        assert_eq!(config.link.port, "/dev/cu.usbmodem12201");
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::new();
        config.link.baud_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { ref key, .. }) if key == "baud_rate"
        ));

        let mut config = Config::new();
        config.link.drain_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.link.poll_window_ms = config.link.poll_interval_ms;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[link]\nport = \"/dev/ttyUSB1\"\n").unwrap();
        assert_eq!(config.link.port, "/dev/ttyUSB1");
        assert_eq!(config.link.baud_rate, 115200);
        assert_eq!(config.link.poll_window_ms, 500);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            Config::new().save_to_file(Path::new("config.yaml")),
            Err(SettingsError::UnsupportedFormat(_))
        ));
    }
}
