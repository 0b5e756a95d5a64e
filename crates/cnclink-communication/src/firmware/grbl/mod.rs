//! GRBL-family protocol support
//!
//! Maslow firmware speaks the GRBL status report dialect.

pub mod realtime;
pub mod status_parser;

pub use realtime::RealtimeCommand;
pub use status_parser::{is_status_frame, StatusParser};

/// Status query command
pub const STATUS_QUERY: &str = "?";
