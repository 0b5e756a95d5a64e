//! Console input
//!
//! Lines typed at the console are sent to the device verbatim, except for
//! `:`-prefixed shortcuts that name a machine action.

use anyhow::{anyhow, bail};
use cnclink_communication::{MaslowCommand, RealtimeCommand};

/// Feed rate used by `:jog` when none is given
pub const DEFAULT_JOG_FEED: u32 = 1000;

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// Send the text as a command
    Raw(String),
    /// Send a named machine command
    Maslow(MaslowCommand),
    /// Send a realtime control byte
    Realtime(RealtimeCommand),
    /// Hold, resume, reset
    EmergencyStop,
    /// Print the current machine status
    Status,
    /// Open the link
    Connect,
    /// Close the link
    Disconnect,
    /// Leave the console
    Quit,
}

impl ConsoleInput {
    /// Parse a console line; `None` for blank lines.
    ///
    /// A line that is exactly one realtime control character (`!`, `~`)
    /// is sent as that control byte.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        if let Some(command) = RealtimeCommand::from_command(line) {
            return Ok(Some(ConsoleInput::Realtime(command)));
        }

        let Some(shortcut) = line.strip_prefix(':') else {
            return Ok(Some(ConsoleInput::Raw(line.to_string())));
        };

        let mut words = shortcut.split_whitespace();
        let name = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let input = match name.as_str() {
            "home" => ConsoleInput::Maslow(MaslowCommand::HomeAll),
            "home-xy" => ConsoleInput::Maslow(MaslowCommand::HomeXy),
            "home-z" => ConsoleInput::Maslow(MaslowCommand::HomeZ),
            "unlock" => ConsoleInput::Maslow(MaslowCommand::Unlock),
            "restart" => ConsoleInput::Maslow(MaslowCommand::Restart),
            "origin-xy" => ConsoleInput::Maslow(MaslowCommand::SetXyOrigin),
            "origin-z" => ConsoleInput::Maslow(MaslowCommand::SetZOrigin),
            "retract" => ConsoleInput::Maslow(MaslowCommand::RetractAll),
            "extend" => ConsoleInput::Maslow(MaslowCommand::ExtendAll),
            "tension" => ConsoleInput::Maslow(MaslowCommand::ApplyTension),
            "release" => ConsoleInput::Maslow(MaslowCommand::ReleaseTension),
            "anchors" => ConsoleInput::Maslow(MaslowCommand::FindAnchors),
            "test" => ConsoleInput::Maslow(MaslowCommand::Test),
            "zstop" => ConsoleInput::Maslow(MaslowCommand::SetZStop),
            "jog" => ConsoleInput::Maslow(parse_jog(&args)?),
            "hold" => ConsoleInput::Realtime(RealtimeCommand::FeedHold),
            "resume" => ConsoleInput::Realtime(RealtimeCommand::CycleStart),
            "reset" => ConsoleInput::Realtime(RealtimeCommand::SoftReset),
            "estop" | "stop" => ConsoleInput::EmergencyStop,
            "status" => ConsoleInput::Status,
            "connect" => ConsoleInput::Connect,
            "disconnect" => ConsoleInput::Disconnect,
            "quit" | "exit" => ConsoleInput::Quit,
            other => bail!("Unknown shortcut ':{}'", other),
        };

        Ok(Some(input))
    }
}

fn parse_jog(args: &[&str]) -> anyhow::Result<MaslowCommand> {
    let (axis, distance, feed) = match args {
        [axis, distance] => (axis, distance, None),
        [axis, distance, feed] => (axis, distance, Some(feed)),
        _ => bail!("Usage: :jog <axis> <distance> [feed]"),
    };

    let distance: f64 = distance
        .parse()
        .map_err(|_| anyhow!("Invalid jog distance '{}'", distance))?;
    let feed = match feed {
        Some(feed) => feed
            .parse()
            .map_err(|_| anyhow!("Invalid jog feed rate '{}'", feed))?,
        None => DEFAULT_JOG_FEED,
    };

    Ok(MaslowCommand::jog(axis, distance, feed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnclink_communication::Axis;

    #[test]
    fn test_raw_lines_pass_through() {
        assert_eq!(ConsoleInput::parse("   ").unwrap(), None);
        assert_eq!(
            ConsoleInput::parse(" G0 X10 ").unwrap(),
            Some(ConsoleInput::Raw("G0 X10".to_string()))
        );
        assert_eq!(
            ConsoleInput::parse("$$").unwrap(),
            Some(ConsoleInput::Raw("$$".to_string()))
        );
    }

    #[test]
    fn test_bare_control_characters_are_realtime() {
        assert_eq!(
            ConsoleInput::parse("!").unwrap(),
            Some(ConsoleInput::Realtime(RealtimeCommand::FeedHold))
        );
        assert_eq!(
            ConsoleInput::parse(" ~ ").unwrap(),
            Some(ConsoleInput::Realtime(RealtimeCommand::CycleStart))
        );
        assert_eq!(
            ConsoleInput::parse("!!").unwrap(),
            Some(ConsoleInput::Raw("!!".to_string()))
        );
    }

    #[test]
    fn test_shortcuts() {
        assert_eq!(
            ConsoleInput::parse(":home").unwrap(),
            Some(ConsoleInput::Maslow(MaslowCommand::HomeAll))
        );
        assert_eq!(
            ConsoleInput::parse(":RESET").unwrap(),
            Some(ConsoleInput::Realtime(RealtimeCommand::SoftReset))
        );
        assert_eq!(
            ConsoleInput::parse(":estop").unwrap(),
            Some(ConsoleInput::EmergencyStop)
        );
        assert!(ConsoleInput::parse(":dance").is_err());
    }

    #[test]
    fn test_jog_shortcut() {
        assert_eq!(
            ConsoleInput::parse(":jog y -5").unwrap(),
            Some(ConsoleInput::Maslow(MaslowCommand::Jog {
                axis: Axis::Y,
                distance: -5.0,
                feed_rate: DEFAULT_JOG_FEED,
            }))
        );
        assert_eq!(
            ConsoleInput::parse(":jog z 2.5 300")
                .unwrap()
                .map(|input| match input {
                    ConsoleInput::Maslow(cmd) => cmd.to_command(),
                    _ => String::new(),
                }),
            Some("G91 G0 Z2.5 F300".to_string())
        );
        assert!(ConsoleInput::parse(":jog q 1").is_err());
        assert!(ConsoleInput::parse(":jog x far").is_err());
        assert!(ConsoleInput::parse(":jog").is_err());
    }
}
