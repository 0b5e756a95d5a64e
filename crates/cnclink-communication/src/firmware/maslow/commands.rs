//! Fixed Maslow command strings
//!
//! Named machine actions rendered to the text the firmware expects. The
//! link sends them like any other command; nothing here talks to the device.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors building a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Axis letter not X, Y or Z
    #[error("Invalid axis '{0}', expected X, Y or Z")]
    InvalidAxis(String),

    /// Non-finite or non-positive jog parameter
    #[error("Invalid jog parameter: {0}")]
    InvalidJog(String),
}

/// A machine axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl FromStr for Axis {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Ok(Axis::X),
            "Y" => Ok(Axis::Y),
            "Z" => Ok(Axis::Z),
            _ => Err(CommandError::InvalidAxis(s.to_string())),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// Named Maslow action
#[derive(Debug, Clone, PartialEq)]
pub enum MaslowCommand {
    /// Home all axes
    HomeAll,
    /// Home X and Y
    HomeXy,
    /// Home Z
    HomeZ,
    /// Clear an alarm (`$X`)
    Unlock,
    /// Reboot the controller so it reloads its configuration
    Restart,
    /// Current XY becomes work zero
    SetXyOrigin,
    /// Current Z becomes work zero
    SetZOrigin,
    /// Relative rapid move
    Jog {
        /// Axis to move
        axis: Axis,
        /// Signed distance
        distance: f64,
        /// Feed rate
        feed_rate: u32,
    },
    /// Retract all anchor belts
    RetractAll,
    /// Extend all anchor belts
    ExtendAll,
    /// Apply belt tension
    ApplyTension,
    /// Release belt tension
    ReleaseTension,
    /// Run anchor calibration
    FindAnchors,
    /// Run the firmware self test
    Test,
    /// Record the Z stop position
    SetZStop,
}

impl MaslowCommand {
    /// Build a jog command, validating its parameters
    pub fn jog(axis: &str, distance: f64, feed_rate: u32) -> Result<Self, CommandError> {
        let axis = axis.parse()?;
        if !distance.is_finite() {
            return Err(CommandError::InvalidJog(format!("distance {}", distance)));
        }
        if feed_rate == 0 {
            return Err(CommandError::InvalidJog("feed rate 0".to_string()));
        }
        Ok(MaslowCommand::Jog {
            axis,
            distance,
            feed_rate,
        })
    }

    /// The command text sent to the device
    pub fn to_command(&self) -> String {
        match self {
            MaslowCommand::HomeAll => "$H".to_string(),
            MaslowCommand::HomeXy => "$HX$HY".to_string(),
            MaslowCommand::HomeZ => "$HZ".to_string(),
            MaslowCommand::Unlock => "$X".to_string(),
            MaslowCommand::Restart => "$ESP444=RESTART".to_string(),
            MaslowCommand::SetXyOrigin => "G10 L20 P1 X0 Y0".to_string(),
            MaslowCommand::SetZOrigin => "G10 L20 P1 Z0".to_string(),
            MaslowCommand::Jog {
                axis,
                distance,
                feed_rate,
            } => format!("G91 G0 {}{} F{}", axis, distance, feed_rate),
            MaslowCommand::RetractAll => "G91 G0 Z-10".to_string(),
            MaslowCommand::ExtendAll => "G91 G0 Z10".to_string(),
            MaslowCommand::ApplyTension => "$Maslow/ApplyTension".to_string(),
            MaslowCommand::ReleaseTension => "$Maslow/ReleaseTension".to_string(),
            MaslowCommand::FindAnchors => "$Maslow/FindAnchors".to_string(),
            MaslowCommand::Test => "$Maslow/Test".to_string(),
            MaslowCommand::SetZStop => "$Maslow/SetZStop".to_string(),
        }
    }
}

impl fmt::Display for MaslowCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_command())
    }
}
