//! GRBL Status Report Parsing
//!
//! Turns one `<State|MPos:x,y,z|FS:feed,spindle|...>` line into a partial
//! [`StatusUpdate`]. Each field group is extracted independently: a broken
//! `MPos` segment does not stop the state or `FS` from being applied, and
//! nothing that fails to parse is ever reported as zero.
//!
//! Malformed field groups are logged and reduced to "nothing extracted".
//! The only error callers see is [`ProtocolParseError::NotAFrame`] from
//! [`StatusParser::parse_frame`].

use cnclink_core::{FeedSpindle, Position, ProtocolParseError, StatusUpdate};

/// Marker introducing the machine position segment
const MPOS_MARKER: &str = "|MPos:";

/// Marker introducing the feed/spindle segment
const FS_MARKER: &str = "|FS:";

/// Token the firmware emits for an unknown coordinate
const NAN_TOKEN: &str = "nan";

/// Check if a line is a candidate status frame (`<` first, `>` later)
pub fn is_status_frame(line: &str) -> bool {
    line.starts_with('<') && line[1..].contains('>')
}

/// Status frame parser
pub struct StatusParser;

impl StatusParser {
    /// Parse a status frame into a partial update.
    ///
    /// Returns `None` for lines that are not status frames at all. A frame
    /// from which nothing could be extracted yields an empty update.
    pub fn parse(line: &str) -> Option<StatusUpdate> {
        Self::parse_frame(line).ok()
    }

    /// Like [`StatusParser::parse`], but names the line that was rejected
    pub fn parse_frame(line: &str) -> Result<StatusUpdate, ProtocolParseError> {
        if !is_status_frame(line) {
            return Err(ProtocolParseError::NotAFrame {
                line: line.to_string(),
            });
        }

        let update = StatusUpdate {
            state: Self::parse_state(line),
            position: Self::recover(line, Self::parse_position(line)),
            feed_spindle: Self::recover(line, Self::parse_feed_spindle(line)),
        };

        if update.is_empty() {
            tracing::debug!("No fields extracted from status frame: {}", line);
        }

        Ok(update)
    }

    /// Parse machine state from the frame header.
    ///
    /// The state is the text between the leading `<` and the first `|`.
    /// Blank headers, or frames with no `|`, yield `None`.
    pub fn parse_state(frame: &str) -> Option<String> {
        let body = frame.strip_prefix('<')?;
        let end = body.find('|')?;
        let state = body[..end].trim();

        if state.is_empty() || state.contains('>') {
            return None;
        }

        Some(state.to_string())
    }

    /// Parse machine position from the `MPos:` segment.
    ///
    /// `Ok(None)` when the frame has no `MPos:` marker.
    pub fn parse_position(frame: &str) -> Result<Option<Position>, ProtocolParseError> {
        let Some(segment) = Self::segment(frame, MPOS_MARKER) else {
            return Ok(None);
        };

        let fields = Self::fields(segment, "MPos", 3)?;
        let x = Self::number(fields[0], "MPos", true)?;
        let y = Self::number(fields[1], "MPos", true)?;
        let z = Self::number(fields[2], "MPos", true)?;

        Ok(Some(Position::new(x, y, z)))
    }

    /// Parse feed rate and spindle speed from the `FS:` segment.
    ///
    /// `Ok(None)` when the frame has no `FS:` marker.
    pub fn parse_feed_spindle(frame: &str) -> Result<Option<FeedSpindle>, ProtocolParseError> {
        let Some(segment) = Self::segment(frame, FS_MARKER) else {
            return Ok(None);
        };

        let fields = Self::fields(segment, "FS", 2)?;
        Ok(Some(FeedSpindle {
            feed_rate: Self::number(fields[0], "FS", false)?,
            spindle_speed: Self::number(fields[1], "FS", false)?,
        }))
    }

    /// Log a field-group failure and drop it
    fn recover<T>(line: &str, result: Result<Option<T>, ProtocolParseError>) -> Option<T> {
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Skipping status field ({}): {}", e, line);
                None
            }
        }
    }

    /// Extract the segment after `marker`, bounded by the next `|` or,
    /// failing that, the closing `>`.
    ///
    /// `None` if the marker is absent. An unbounded segment is returned as
    /// empty so it is reported rather than silently ignored.
    fn segment<'a>(frame: &'a str, marker: &str) -> Option<&'a str> {
        let start = frame.find(marker)? + marker.len();
        let rest = &frame[start..];
        let end = rest.find('|').or_else(|| rest.find('>')).unwrap_or(0);
        Some(&rest[..end])
    }

    /// Split a segment and require `count` leading non-empty fields
    fn fields<'a>(
        segment: &'a str,
        marker: &'static str,
        count: usize,
    ) -> Result<Vec<&'a str>, ProtocolParseError> {
        if segment.is_empty() {
            return Err(ProtocolParseError::MissingSegment { marker });
        }

        let fields: Vec<&str> = segment.split(',').map(str::trim).collect();
        if fields.len() < count || fields[..count].iter().any(|f| f.is_empty()) {
            return Err(ProtocolParseError::IncompleteFields {
                marker,
                expected: count,
                segment: segment.to_string(),
            });
        }

        Ok(fields)
    }

    /// Parse a finite number; the literal `nan` maps to zero when allowed
    fn number(
        token: &str,
        marker: &'static str,
        nan_as_zero: bool,
    ) -> Result<f64, ProtocolParseError> {
        if nan_as_zero && token == NAN_TOKEN {
            return Ok(0.0);
        }

        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ProtocolParseError::InvalidNumber {
                marker,
                token: token.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame() {
        let update = StatusParser::parse("<Idle|MPos:1.000,2.000,3.000|FS:500,1000>").unwrap();
        assert_eq!(update.state.as_deref(), Some("Idle"));
        assert_eq!(update.position, Some(Position::new(1.0, 2.0, 3.0)));
        assert_eq!(
            update.feed_spindle,
            Some(FeedSpindle {
                feed_rate: 500.0,
                spindle_speed: 1000.0
            })
        );
    }

    #[test]
    fn test_nan_coordinate_is_zero() {
        let update = StatusParser::parse("<Run|MPos:nan,0.000,0.000|FS:0,0>").unwrap();
        assert_eq!(update.position, Some(Position::new(0.0, 0.0, 0.0)));
        assert_eq!(update.state.as_deref(), Some("Run"));
    }

    #[test]
    fn test_nan_is_case_sensitive() {
        assert!(StatusParser::parse_position("<Run|MPos:NaN,0,0>").is_err());
        assert!(StatusParser::parse_position("<Run|MPos:inf,0,0>").is_err());
    }

    #[test]
    fn test_nan_not_accepted_in_feed_spindle() {
        assert!(StatusParser::parse_feed_spindle("<Run|FS:nan,0>").is_err());
    }

    #[test]
    fn test_not_a_frame() {
        assert_eq!(StatusParser::parse("ok"), None);
        assert_eq!(StatusParser::parse("<Idle|MPos:0,0,0"), None);
        assert_eq!(StatusParser::parse(">Idle<"), None);
        assert_eq!(StatusParser::parse(""), None);
        assert_eq!(StatusParser::parse("<"), None);
    }

    #[test]
    fn test_parse_frame_names_rejected_line() {
        assert_eq!(
            StatusParser::parse_frame("error:9"),
            Err(ProtocolParseError::NotAFrame {
                line: "error:9".to_string()
            })
        );
        assert!(StatusParser::parse_frame("<Idle>").unwrap().is_empty());
    }

    #[test]
    fn test_empty_header_keeps_state() {
        let update = StatusParser::parse("< |MPos:1,2,3>").unwrap();
        assert_eq!(update.state, None);
        assert_eq!(update.position, Some(Position::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_header_without_pipe() {
        let update = StatusParser::parse("<Idle>").unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_segment_bounded_by_pipe_or_close() {
        let update = StatusParser::parse("<Jog|FS:100,0|MPos:4,5,6>").unwrap();
        assert_eq!(update.position, Some(Position::new(4.0, 5.0, 6.0)));
        assert_eq!(update.feed_spindle.map(|fs| fs.feed_rate), Some(100.0));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let update = StatusParser::parse("<Idle|MPos:1,2,3,4,5|FS:10,20,30>").unwrap();
        assert_eq!(update.position, Some(Position::new(1.0, 2.0, 3.0)));
        assert_eq!(update.feed_spindle.map(|fs| fs.spindle_speed), Some(20.0));
    }

    #[test]
    fn test_incomplete_position_is_rejected() {
        assert!(matches!(
            StatusParser::parse_position("<Idle|MPos:1.0,2.0>"),
            Err(ProtocolParseError::IncompleteFields { .. })
        ));
        assert!(matches!(
            StatusParser::parse_position("<Idle|MPos:1.0,,3.0>"),
            Err(ProtocolParseError::IncompleteFields { .. })
        ));
        assert!(matches!(
            StatusParser::parse_position("<Idle|MPos:|FS:0,0>"),
            Err(ProtocolParseError::MissingSegment { .. })
        ));
    }

    #[test]
    fn test_bad_number_aborts_only_that_group() {
        let update = StatusParser::parse("<Hold|MPos:1.0,abc,3.0|FS:250,0>").unwrap();
        assert_eq!(update.state.as_deref(), Some("Hold"));
        assert_eq!(update.position, None);
        assert_eq!(update.feed_spindle.map(|fs| fs.feed_rate), Some(250.0));
    }

    #[test]
    fn test_missing_markers() {
        assert_eq!(StatusParser::parse_position("<Idle|WPos:1,2,3>"), Ok(None));
        assert_eq!(StatusParser::parse_feed_spindle("<Idle|F:100>"), Ok(None));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let update = StatusParser::parse("< Alarm |MPos: 1.5 , -2 ,3 |FS: 7 , 8 >").unwrap();
        assert_eq!(update.state.as_deref(), Some("Alarm"));
        assert_eq!(update.position, Some(Position::new(1.5, -2.0, 3.0)));
        assert_eq!(
            update.feed_spindle,
            Some(FeedSpindle {
                feed_rate: 7.0,
                spindle_speed: 8.0
            })
        );
    }
}
