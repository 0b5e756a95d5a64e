//! Status frame parsing properties

use cnclink_communication::StatusParser;
use cnclink_core::{MachineStatus, Position, StatusUpdate};
use proptest::prelude::*;

fn known_status() -> MachineStatus {
    let mut status = MachineStatus::new();
    status.apply(&StatusUpdate {
        state: Some("Idle".to_string()),
        position: Some(Position::new(12.5, -3.0, 7.25)),
        feed_spindle: None,
    });
    status.feed_rate = 800.0;
    status.spindle_speed = 10_000.0;
    status
}

fn apply(status: &mut MachineStatus, line: &str) -> bool {
    match StatusParser::parse(line) {
        Some(update) => status.apply(&update),
        None => false,
    }
}

#[test]
fn test_reference_frames() {
    let mut status = MachineStatus::new();
    assert!(apply(&mut status, "<Idle|MPos:1.000,2.000,3.000|FS:500,1000>"));
    assert_eq!(status.state, "Idle");
    assert_eq!(status.position, Position::new(1.0, 2.0, 3.0));
    assert_eq!(status.feed_rate, 500.0);
    assert_eq!(status.spindle_speed, 1000.0);

    assert!(apply(&mut status, "<Run|MPos:nan,0.000,0.000|FS:0,0>"));
    assert_eq!(status.position.x, 0.0);
}

#[test]
fn test_repeated_state_is_not_a_change() {
    let mut status = MachineStatus::new();
    assert!(apply(&mut status, "<Idle|MPos:0,0,0>"));
    assert!(!apply(&mut status, "<Idle|MPos:1,0,0>"));
    assert!(apply(&mut status, "<Alarm|MPos:1,0,0>"));
    assert!(!apply(&mut status, "<Alarm|MPos:1,0,0>"));
}

#[test]
fn test_malformed_frames_never_zero_fields() {
    let malformed = [
        "<Idle|MPos:1.0,2.0,3.0",
        "<|MPos:|FS:>",
        "<   |MPos:1,2|FS:3>",
        "<Idle|MPos:0,0|FS:0>",
        "<Idle|MPos:,,|FS:,>",
        "<Idle|MPos:x,y,z|FS:a,b>",
        "<Idle|MPos:inf,0,0|FS:NaN,0>",
    ];

    for line in malformed {
        let mut status = known_status();
        apply(&mut status, line);
        assert_eq!(status.state, "Idle", "{}", line);
        assert_eq!(status.position, Position::new(12.5, -3.0, 7.25), "{}", line);
        assert_eq!(status.feed_rate, 800.0, "{}", line);
        assert_eq!(status.spindle_speed, 10_000.0, "{}", line);
    }
}

proptest! {
    #[test]
    fn parse_never_panics(line in "\\PC*") {
        let _ = StatusParser::parse(&line);
    }

    #[test]
    fn parse_never_panics_on_frame_like_input(line in "<[A-Za-z ]{0,6}(\\|[A-Za-z]{1,4}:[-0-9.,na]{0,12}){0,4}>?") {
        let _ = StatusParser::parse(&line);
    }

    #[test]
    fn non_frames_change_nothing(line in "[^<].*") {
        let mut status = known_status();
        prop_assert!(!apply(&mut status, &line));
        prop_assert_eq!(status, known_status());
    }

    #[test]
    fn extracted_numbers_are_finite(line in "<[A-Za-z]{1,5}\\|MPos:[-0-9.a-z]{1,6},[-0-9.]{1,6},[-0-9.]{1,6}\\|FS:[0-9.e]{1,5},[0-9.]{1,5}>") {
        if let Some(update) = StatusParser::parse(&line) {
            if let Some(p) = update.position {
                prop_assert!(p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
            }
            if let Some(fs) = update.feed_spindle {
                prop_assert!(fs.feed_rate.is_finite() && fs.spindle_speed.is_finite());
            }
        }
    }

    #[test]
    fn well_formed_frames_round_trip(
        state in "[A-Z][a-z]{2,5}",
        x in -1000.0f64..1000.0,
        y in -1000.0f64..1000.0,
        z in -100.0f64..100.0,
        feed in 0u32..20_000,
        speed in 0u32..30_000,
    ) {
        let line = format!("<{}|MPos:{:.3},{:.3},{:.3}|FS:{},{}>", state, x, y, z, feed, speed);
        let update = StatusParser::parse(&line).unwrap();
        prop_assert_eq!(update.state.as_deref(), Some(state.as_str()));
        let p = update.position.unwrap();
        prop_assert!((p.x - x).abs() < 1e-3 && (p.y - y).abs() < 1e-3 && (p.z - z).abs() < 1e-3);
        let fs = update.feed_spindle.unwrap();
        prop_assert_eq!(fs.feed_rate, feed as f64);
        prop_assert_eq!(fs.spindle_speed, speed as f64);
    }
}
