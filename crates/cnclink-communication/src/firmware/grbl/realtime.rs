//! GRBL realtime control characters
//!
//! These are single bytes the controller acts on as soon as they arrive,
//! outside the normal line buffer. They go out as raw bytes.

/// Realtime control command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeCommand {
    /// Feed hold (`!`)
    FeedHold,
    /// Cycle start / resume (`~`)
    CycleStart,
    /// Soft reset (Ctrl-X, 0x18)
    SoftReset,
}

impl RealtimeCommand {
    /// The control byte
    pub fn byte(self) -> u8 {
        match self {
            RealtimeCommand::FeedHold => b'!',
            RealtimeCommand::CycleStart => b'~',
            RealtimeCommand::SoftReset => 0x18,
        }
    }

    /// The command as a one-character string, ready for the correlator
    pub fn as_command(self) -> String {
        char::from(self.byte()).to_string()
    }

    /// Recognise a command string that is exactly one control byte
    pub fn from_command(command: &str) -> Option<Self> {
        match command.as_bytes() {
            [b'!'] => Some(RealtimeCommand::FeedHold),
            [b'~'] => Some(RealtimeCommand::CycleStart),
            [0x18] => Some(RealtimeCommand::SoftReset),
            _ => None,
        }
    }

    /// Emergency stop: hold, resume, then reset
    pub fn emergency_stop_sequence() -> [RealtimeCommand; 3] {
        [
            RealtimeCommand::FeedHold,
            RealtimeCommand::CycleStart,
            RealtimeCommand::SoftReset,
        ]
    }
}

impl std::fmt::Display for RealtimeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeedHold => write!(f, "Feed Hold"),
            Self::CycleStart => write!(f, "Cycle Start"),
            Self::SoftReset => write!(f, "Soft Reset"),
        }
    }
}
