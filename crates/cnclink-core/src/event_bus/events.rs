//! Event type definitions for the event bus.
//!
//! Events are immutable once built and serialize to the JSON messages the
//! browser clients consume (`type` tag plus payload).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::MachineStatus;

/// An event observed or produced by the device link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkEvent {
    /// A command was written to the device.
    CommandSent {
        /// The command text without line terminator.
        command: String,
        /// When it was written.
        timestamp: DateTime<Utc>,
    },
    /// A line was read from the device.
    #[serde(rename = "serial_response")]
    DeviceLine {
        /// The line as read, terminator stripped.
        #[serde(rename = "data")]
        raw: String,
        /// When it was read.
        timestamp: DateTime<Utc>,
    },
    /// The device state changed; carries the full snapshot.
    #[serde(rename = "status_update")]
    StatusChanged {
        /// Machine status after the change.
        #[serde(rename = "status")]
        snapshot: MachineStatus,
    },
    /// The link connected or disconnected.
    #[serde(rename = "connection_status")]
    ConnectionChanged {
        /// Whether the link is now connected.
        connected: bool,
    },
}

impl LinkEvent {
    /// Command written now
    pub fn command_sent(command: impl Into<String>) -> Self {
        LinkEvent::CommandSent {
            command: command.into(),
            timestamp: Utc::now(),
        }
    }

    /// Line read now
    pub fn device_line(raw: impl Into<String>) -> Self {
        LinkEvent::DeviceLine {
            raw: raw.into(),
            timestamp: Utc::now(),
        }
    }

    /// Status snapshot
    pub fn status_changed(snapshot: MachineStatus) -> Self {
        LinkEvent::StatusChanged { snapshot }
    }

    /// Connection change
    pub fn connection_changed(connected: bool) -> Self {
        LinkEvent::ConnectionChanged { connected }
    }

    /// Wire name of this event's type tag
    pub fn kind(&self) -> &'static str {
        match self {
            LinkEvent::CommandSent { .. } => "command_sent",
            LinkEvent::DeviceLine { .. } => "serial_response",
            LinkEvent::StatusChanged { .. } => "status_update",
            LinkEvent::ConnectionChanged { .. } => "connection_status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags() {
        let line = serde_json::to_value(LinkEvent::device_line("ok")).unwrap();
        assert_eq!(line["type"], "serial_response");
        assert_eq!(line["data"], "ok");
        assert!(line.get("timestamp").is_some());

        let sent = serde_json::to_value(LinkEvent::command_sent("$H")).unwrap();
        assert_eq!(sent["type"], "command_sent");
        assert_eq!(sent["command"], "$H");

        let conn = serde_json::to_value(LinkEvent::connection_changed(true)).unwrap();
        assert_eq!(conn["type"], "connection_status");
        assert_eq!(conn["connected"], true);

        let status =
            serde_json::to_value(LinkEvent::status_changed(MachineStatus::new())).unwrap();
        assert_eq!(status["type"], "status_update");
        assert_eq!(status["status"]["status"], "Unknown");
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let events = [
            LinkEvent::command_sent("?"),
            LinkEvent::device_line("<Idle>"),
            LinkEvent::status_changed(MachineStatus::new()),
            LinkEvent::connection_changed(false),
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.kind());
        }
    }

    #[test]
    fn test_deserialize_from_wire() {
        let event: LinkEvent =
            serde_json::from_str(r#"{"type":"connection_status","connected":false}"#).unwrap();
        assert_eq!(event, LinkEvent::connection_changed(false));
    }
}
