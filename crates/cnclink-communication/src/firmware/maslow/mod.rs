//! Maslow command set

pub mod commands;

pub use commands::{Axis, CommandError, MaslowCommand};
