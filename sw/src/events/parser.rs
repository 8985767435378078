//! Parses one event stream record into an [`Event`]
//!
//! Records look like `20190113141131 100525 CAM0 MOTION extra text`:
//! a 14-digit local timestamp, the server's sequence number, a camera token
//! and a message whose first word is the event kind. Parsing never fails;
//! fields that do not parse get sentinel values and a [`ParseError`] marker.
//!
//! Timestamps carry no zone. They are interpreted in this process's local
//! zone, which is only correct when the watcher runs in the server's zone.

use chrono::{Local, NaiveDateTime, TimeZone};
use tracing::debug;

use super::kind::EventKind;
use super::types::{Event, NO_SEQUENCE_ID, ParseError};
use crate::server::CameraLookup;

/// Wire format of the record timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Prefix of the camera token
pub const CAMERA_PREFIX: &str = "CAM";

const MAX_FIELDS: usize = 4;

/// Parse a raw record, resolving its camera through `cameras`
pub fn parse_event(raw: &str, cameras: &dyn CameraLookup) -> Event {
    let fields = split_fields(raw, MAX_FIELDS);
    debug!(%raw, field_count = fields.len(), "parse_event: called");

    let mut event = Event {
        timestamp: Local::now(),
        sequence_id: NO_SEQUENCE_ID,
        camera: None,
        kind: EventKind::Unknown,
        message: String::new(),
        parse_errors: Vec::new(),
    };

    match fields.first().and_then(|f| parse_timestamp(f)) {
        Some(ts) => event.timestamp = ts,
        None => event.push_error(ParseError::TimestampParseFailed),
    }

    match fields.get(1).and_then(|f| f.parse::<i64>().ok()) {
        Some(id) => event.sequence_id = id,
        None => event.push_error(ParseError::SequenceIdParseFailed),
    }

    // The camera token is optional; when it is missing the third field
    // already belongs to the message.
    let camera_token = fields.get(2).copied().unwrap_or("");
    let message_start = match camera_number(camera_token) {
        CameraToken::Missing => {
            event.push_error(ParseError::CameraMissing);
            2
        }
        CameraToken::Malformed => {
            event.push_error(ParseError::CameraParseFailed);
            3
        }
        CameraToken::Number(number) => {
            event.camera = cameras.camera(number);
            if event.camera.is_none() {
                debug!(number, "parse_event: camera not in registry");
                event.push_error(ParseError::CameraParseFailed);
            }
            3
        }
    };
    event.message = fields.get(message_start..).map(|rest| rest.join(" ")).unwrap_or_default();

    let kind_token = event.message.split_whitespace().next().unwrap_or("");
    match EventKind::from_wire(kind_token) {
        Some(kind) => event.kind = kind,
        None => {
            debug!(%kind_token, "parse_event: unknown event kind");
            event.push_error(ParseError::UnknownEvent);
        }
    }

    event
}

/// Parse a zone-less `YYYYMMDDHHMMSS` timestamp in the local zone
///
/// Returns `None` for malformed input and for wall-clock times that do not
/// exist locally (a DST gap). Ambiguous times take the earlier instant.
pub fn parse_timestamp(field: &str) -> Option<chrono::DateTime<Local>> {
    if field.len() != 14 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(field, TIMESTAMP_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

enum CameraToken {
    /// Not a `CAM<digits>` token at all
    Missing,
    /// `CAM` followed by digits that do not form a valid number
    Malformed,
    Number(u32),
}

fn camera_number(token: &str) -> CameraToken {
    let Some(rest) = token.strip_prefix(CAMERA_PREFIX) else {
        return CameraToken::Missing;
    };
    if !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return CameraToken::Missing;
    }
    match rest.parse::<u32>() {
        Ok(number) => CameraToken::Number(number),
        Err(_) => CameraToken::Malformed,
    }
}

/// Split on whitespace runs into at most `max` fields; the last keeps its inner spacing
fn split_fields(raw: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = raw.trim();
    while !rest.is_empty() {
        if fields.len() == max - 1 {
            fields.push(rest);
            break;
        }
        match rest.split_once(char::is_whitespace) {
            Some((head, tail)) => {
                fields.push(head);
                rest = tail.trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Camera;
    use chrono::{NaiveDate, Timelike};
    use proptest::prelude::*;

    fn cameras(number: u32) -> Option<Camera> {
        match number {
            0 => Some(Camera::new(0, "Front Door")),
            1 => Some(Camera::new(1, "Garage")),
            _ => None,
        }
    }

    #[test]
    fn test_parse_well_formed_record() {
        let event = parse_event("20190113141131 100525 CAM0 MOTION extra text", &cameras);

        let expected = NaiveDate::from_ymd_opt(2019, 1, 13)
            .and_then(|d| d.and_hms_opt(14, 11, 31))
            .unwrap();
        assert_eq!(event.timestamp.naive_local(), expected);
        assert_eq!(event.sequence_id, 100525);
        assert_eq!(event.camera, Some(Camera::new(0, "Front Door")));
        assert_eq!(event.kind, EventKind::Motion);
        assert_eq!(event.message, "MOTION extra text");
        assert!(event.parse_errors.is_empty());
    }

    #[test]
    fn test_parse_bad_timestamp() {
        let before = Local::now();
        let event = parse_event("badtime 5 CAM1 ARM_C", &cameras);

        assert!(event.parse_errors.contains(&ParseError::TimestampParseFailed));
        assert!(event.timestamp >= before, "substitute timestamp should be now");
        assert_eq!(event.sequence_id, 5);
        assert_eq!(event.kind, EventKind::ArmContinuous);
        assert_eq!(event.camera, Some(Camera::new(1, "Garage")));
    }

    #[test]
    fn test_parse_without_camera_token() {
        let event = parse_event("20190113141131 5 ERROR something broke", &cameras);

        assert!(event.camera.is_none());
        assert_eq!(event.parse_errors, vec![ParseError::CameraMissing]);
        assert_eq!(event.kind, EventKind::Error);
        assert_eq!(event.message, "ERROR something broke");
    }

    #[test]
    fn test_parse_bad_sequence_id() {
        let event = parse_event("20190113141131 abc CAM0 ONLINE", &cameras);
        assert_eq!(event.sequence_id, NO_SEQUENCE_ID);
        assert_eq!(event.parse_errors, vec![ParseError::SequenceIdParseFailed]);
        assert_eq!(event.kind, EventKind::Online);
    }

    #[test]
    fn test_parse_camera_not_registered() {
        let event = parse_event("20190113141131 7 CAM9 OFFLINE", &cameras);
        assert!(event.camera.is_none());
        assert_eq!(event.parse_errors, vec![ParseError::CameraParseFailed]);
        assert_eq!(event.kind, EventKind::Offline);
        assert_eq!(event.message, "OFFLINE");
    }

    #[test]
    fn test_parse_camera_digits_malformed() {
        let event = parse_event("20190113141131 7 CAM1x MOTION", &cameras);
        assert!(event.camera.is_none());
        assert_eq!(event.parse_errors, vec![ParseError::CameraParseFailed]);
        assert_eq!(event.kind, EventKind::Motion);
    }

    #[test]
    fn test_parse_cam_prefix_without_digits_is_missing() {
        let event = parse_event("20190113141131 7 CAMERA MOTION", &cameras);
        assert_eq!(event.parse_errors, vec![ParseError::CameraMissing, ParseError::UnknownEvent]);
        assert_eq!(event.message, "CAMERA MOTION");
    }

    #[test]
    fn test_parse_unknown_kind_keeps_message() {
        let event = parse_event("20190113141131 8 CAM0 NEWTHING with detail", &cameras);
        assert_eq!(event.kind, EventKind::Unknown);
        assert_eq!(event.parse_errors, vec![ParseError::UnknownEvent]);
        assert_eq!(event.message, "NEWTHING with detail");
    }

    #[test]
    fn test_parse_empty_record() {
        let event = parse_event("", &cameras);
        assert_eq!(
            event.parse_errors,
            vec![
                ParseError::TimestampParseFailed,
                ParseError::SequenceIdParseFailed,
                ParseError::CameraMissing,
                ParseError::UnknownEvent,
            ]
        );
        assert_eq!(event.message, "");
    }

    #[test]
    fn test_parse_collapses_field_whitespace() {
        let event = parse_event("20190113141131   9\tCAM0  MOTION  spaced  out", &cameras);
        assert!(event.parse_errors.is_empty());
        assert_eq!(event.sequence_id, 9);
        assert_eq!(event.message, "MOTION  spaced  out");
    }

    #[test]
    fn test_parse_timestamp_rejects_invalid_dates() {
        assert!(parse_timestamp("20191313141131").is_none());
        assert!(parse_timestamp("2019011314113").is_none());
        assert!(parse_timestamp("+0190113141131").is_none());
        let ts = parse_timestamp("20190113000005").unwrap();
        assert_eq!(ts.second(), 5);
    }

    #[test]
    fn test_split_fields_limits_count() {
        assert_eq!(split_fields("a b c d e f", 4), vec!["a", "b", "c", "d e f"]);
        assert_eq!(split_fields("  a  b ", 4), vec!["a", "b"]);
        assert!(split_fields("   ", 4).is_empty());
    }

    proptest! {
        #[test]
        fn prop_well_formed_records_parse_cleanly(
            seq in 0i64..10_000_000,
            cam in 0u32..4,
            kind_idx in 0usize..5,
            tail in "[a-z ]{0,20}",
        ) {
            let kinds = ["MOTION", "ONLINE", "OFFLINE", "ARM_M", "DISARM_A"];
            let raw = format!("20200601120000 {} CAM{} {} {}", seq, cam, kinds[kind_idx], tail);
            let event = parse_event(&raw, &cameras);

            prop_assert_eq!(event.sequence_id, seq);
            prop_assert_eq!(event.kind.as_str(), kinds[kind_idx]);
            prop_assert_eq!(event.camera.is_some(), cam < 2);
            if cam < 2 {
                prop_assert!(event.parse_errors.is_empty());
            } else {
                prop_assert_eq!(event.parse_errors.clone(), vec![ParseError::CameraParseFailed]);
            }
        }

        #[test]
        fn prop_parse_never_panics(raw in ".{0,80}") {
            let event = parse_event(&raw, &cameras);
            let mut seen = event.parse_errors.clone();
            seen.dedup();
            prop_assert_eq!(seen.len(), event.parse_errors.len());
        }
    }
}
