//! Data models for CncLink
//!
//! Provides the machine status snapshot, the partial update extracted from a
//! status frame, and the link's connection state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device state string used before any status frame has been seen
pub const UNKNOWN_STATE: &str = "Unknown";

/// Machine position in machine coordinates (MPos)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{:.3} Y:{:.3} Z:{:.3}", self.x, self.y, self.z)
    }
}

/// Feed rate and spindle speed pair from an `FS:` segment
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedSpindle {
    /// Current feed rate (units/min)
    pub feed_rate: f64,
    /// Current spindle speed (RPM)
    pub spindle_speed: f64,
}

/// Partial status update extracted from one status frame
///
/// Each field group is independent: `None` means the frame did not yield a
/// usable value and the previously known value must be kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusUpdate {
    /// Device-reported motion state (Idle, Run, Hold, Alarm, ...)
    pub state: Option<String>,
    /// Machine position
    pub position: Option<Position>,
    /// Feed rate and spindle speed
    pub feed_spindle: Option<FeedSpindle>,
}

impl StatusUpdate {
    /// True when the frame yielded nothing
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.position.is_none() && self.feed_spindle.is_none()
    }
}

/// Snapshot of the machine as last reported by the device
///
/// Last-write-wins per field group. Serialized with the field names the web
/// clients expect (`status` carries the device state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    /// Whether the link is connected
    pub connected: bool,
    /// Device-reported motion state
    #[serde(rename = "status")]
    pub state: String,
    /// Machine position
    pub position: Position,
    /// Current feed rate (units/min)
    pub feed_rate: f64,
    /// Current spindle speed (RPM)
    pub spindle_speed: f64,
}

impl MachineStatus {
    /// Create a disconnected snapshot with no device data yet
    pub fn new() -> Self {
        Self {
            connected: false,
            state: UNKNOWN_STATE.to_string(),
            position: Position::default(),
            feed_rate: 0.0,
            spindle_speed: 0.0,
        }
    }

    /// Apply a partial update, leaving absent field groups untouched.
    ///
    /// Returns `true` if the device state string changed.
    pub fn apply(&mut self, update: &StatusUpdate) -> bool {
        let mut changed = false;

        if let Some(state) = &update.state {
            if *state != self.state {
                self.state = state.clone();
                changed = true;
            }
        }

        if let Some(position) = update.position {
            self.position = position;
        }

        if let Some(fs) = update.feed_spindle {
            self.feed_rate = fs.feed_rate;
            self.spindle_speed = fs.spindle_speed;
        }

        changed
    }
}

impl Default for MachineStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] F:{} S:{}",
            self.state, self.position, self.feed_rate, self.spindle_speed
        )
    }
}

/// Connection state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No open transport
    Disconnected,
    /// Transport open and reader running
    Connected,
}

impl ConnectionState {
    /// Check if connected
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Connection state plus a human readable detail (e.g. the last error)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Current state
    pub state: ConnectionState,
    /// Human readable detail
    pub detail: String,
}

impl ConnectionStatus {
    /// Disconnected with the default detail
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            detail: "Disconnected".to_string(),
        }
    }

    /// Connected to `port`
    pub fn connected(port: &str) -> Self {
        Self {
            state: ConnectionState::Connected,
            detail: format!("Connected to {}", port),
        }
    }

    /// Disconnected because of `reason`
    pub fn failed(reason: impl fmt::Display) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            detail: format!("Connection Error: {}", reason),
        }
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_absent_fields() {
        let mut status = MachineStatus::new();
        status.apply(&StatusUpdate {
            state: Some("Idle".to_string()),
            position: Some(Position::new(1.0, 2.0, 3.0)),
            feed_spindle: Some(FeedSpindle {
                feed_rate: 500.0,
                spindle_speed: 1000.0,
            }),
        });

        let changed = status.apply(&StatusUpdate {
            state: None,
            position: None,
            feed_spindle: Some(FeedSpindle {
                feed_rate: 250.0,
                spindle_speed: 0.0,
            }),
        });

        assert!(!changed);
        assert_eq!(status.state, "Idle");
        assert_eq!(status.position, Position::new(1.0, 2.0, 3.0));
        assert_eq!(status.feed_rate, 250.0);
        assert_eq!(status.spindle_speed, 0.0);
    }

    #[test]
    fn test_apply_reports_state_change_only() {
        let mut status = MachineStatus::new();
        assert!(status.apply(&StatusUpdate {
            state: Some("Idle".to_string()),
            ..Default::default()
        }));
        assert!(!status.apply(&StatusUpdate {
            state: Some("Idle".to_string()),
            position: Some(Position::new(5.0, 0.0, 0.0)),
            ..Default::default()
        }));
        assert!(status.apply(&StatusUpdate {
            state: Some("Alarm".to_string()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_machine_status_wire_format() {
        let status = MachineStatus::new();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "Unknown");
        assert_eq!(json["connected"], false);
        assert_eq!(json["position"]["x"], 0.0);
        assert!(json.get("feed_rate").is_some());
        assert!(json.get("spindle_speed").is_some());
    }

    #[test]
    fn test_connection_status_detail() {
        assert!(!ConnectionStatus::default().is_connected());
        assert!(ConnectionStatus::connected("/dev/ttyACM0").is_connected());
        let failed = ConnectionStatus::failed("Port not found: COM9");
        assert_eq!(failed.detail, "Connection Error: Port not found: COM9");
        assert_eq!(failed.state, ConnectionState::Disconnected);
    }
}
