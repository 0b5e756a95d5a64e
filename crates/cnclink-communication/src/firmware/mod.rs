//! Firmware protocol support
//!
//! - `grbl`: status frame parsing and realtime control bytes
//! - `maslow`: the fixed command strings used to drive a Maslow

pub mod grbl;
pub mod maslow;
