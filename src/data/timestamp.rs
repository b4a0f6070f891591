//! Date-time parsing and derived time features

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};

/// Accepted layouts, tried in order after RFC 3339
const FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// A parsed timestamp.
///
/// `instant` is normalised to UTC when the input carries an offset and is the
/// input as written otherwise; `wall` is always the written wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub instant: NaiveDateTime,
    pub wall: NaiveDateTime,
}

impl Timestamp {
    fn naive(dt: NaiveDateTime) -> Self {
        Self {
            instant: dt,
            wall: dt,
        }
    }
}

/// Parse a timestamp in RFC 3339 or one of the common layouts
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Timestamp {
            instant: dt.naive_utc(),
            wall: dt.naive_local(),
        });
    }

    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Timestamp::naive(dt));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(Timestamp::naive)
}

/// Elapsed hours from `start` to `end` (negative when `end` precedes `start`)
pub fn duration_hours(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 3.6e9,
        None => delta.num_seconds() as f64 / 3600.0,
    }
}

/// Hour of day plus fractional minutes, in `[0, 24)`
pub fn fractional_hour(ts: NaiveDateTime) -> f64 {
    ts.hour() as f64 + ts.minute() as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        for raw in [
            "2024-01-01T08:00",
            "2024-01-01 08:00",
            "2024-01-01 08:00:00",
            "2024-01-01T08:00:00Z",
            "2024-01-01T08:00:00+02:00",
            "01/01/2024 08:00",
        ] {
            assert_eq!(parse_timestamp(raw).map(|t| t.wall), Some(expected), "layout {raw}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_duration_and_start_hour() {
        let start = parse_timestamp("2024-01-01T08:00").unwrap();
        let end = parse_timestamp("2024-01-01T09:30").unwrap();
        assert_eq!(duration_hours(start.instant, end.instant), 1.5);
        assert_eq!(fractional_hour(start.wall), 8.0);

        let late = parse_timestamp("2024-01-01T23:45").unwrap();
        assert_eq!(fractional_hour(late.wall), 23.75);
    }

    #[test]
    fn test_offsets_normalised_for_duration() {
        // Across the spring-forward change: 01:30 PST to 03:30 PDT is one hour
        let start = parse_timestamp("2024-03-10T01:30:00-08:00").unwrap();
        let end = parse_timestamp("2024-03-10T03:30:00-07:00").unwrap();
        assert_eq!(duration_hours(start.instant, end.instant), 1.0);
        assert_eq!(fractional_hour(start.wall), 1.5);

        let utc = parse_timestamp("2024-01-01T08:00:00+02:00").unwrap();
        assert_eq!(utc.instant.hour(), 6);
        assert_eq!(utc.wall.hour(), 8);
    }
}
