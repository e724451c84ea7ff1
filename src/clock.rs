//! Service-day clock values.
//!
//! GTFS times are measured from midnight of the service day and keep counting
//! past 24:00:00 for trips that run after midnight. They are parsed to elapsed
//! seconds and never wrapped.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::calendar::ServiceDate;
use crate::error::{PipelineError, Result};

/// Parses `H:MM:SS` / `HH:MM:SS` into seconds since midnight.
///
/// Hours are unbounded (`25:10:00` is 90600). Minutes and seconds must be two
/// digits in `00..=59`.
pub fn parse_elapsed_seconds(value: &str) -> Result<u32> {
    let invalid = || PipelineError::InvalidTime(value.to_string());

    let mut parts = value.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(h) || !digits(m) || !digits(s) || m.len() != 2 || s.len() != 2 {
        return Err(invalid());
    }

    let hours: u32 = h.parse().map_err(|_| invalid())?;
    let minutes: u32 = m.parse().map_err(|_| invalid())?;
    let seconds: u32 = s.parse().map_err(|_| invalid())?;
    if minutes > 59 || seconds > 59 {
        return Err(invalid());
    }

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .ok_or_else(invalid)
}

/// A departure as written in the feed, ordered by elapsed seconds.
#[derive(Clone, Debug)]
pub struct DepartureTime {
    raw: String,
    seconds: u32,
}

impl DepartureTime {
    pub fn parse(value: &str) -> Result<Self> {
        Ok(Self {
            seconds: parse_elapsed_seconds(value)?,
            raw: value.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// True once `now_seconds` (seconds since the service day's midnight) is
    /// strictly past this departure.
    pub fn has_passed(&self, now_seconds: u32) -> bool {
        self.seconds < now_seconds
    }

    /// `HH:MM`, as shown in timetable listings.
    pub fn short_label(&self) -> &str {
        match self.raw.rfind(':') {
            Some(i) => &self.raw[..i],
            None => &self.raw,
        }
    }
}

impl PartialEq for DepartureTime {
    fn eq(&self, other: &Self) -> bool {
        self.seconds == other.seconds
    }
}

impl Eq for DepartureTime {}

impl PartialOrd for DepartureTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DepartureTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds.cmp(&other.seconds)
    }
}

impl fmt::Display for DepartureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for DepartureTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for DepartureTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DepartureTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// First departure in `times` that has not passed yet.
pub fn next_departure(times: &[DepartureTime], now_seconds: u32) -> Option<&DepartureTime> {
    times.iter().find(|t| !t.has_passed(now_seconds))
}

/// Service date and seconds since midnight for `now` in zone `tz`.
pub fn service_clock<Z: TimeZone>(now: DateTime<Z>) -> (ServiceDate, u32) {
    (
        ServiceDate(now.date_naive()),
        now.time().num_seconds_from_midnight(),
    )
}

/// [`service_clock`] for the current instant.
pub fn service_day_now(tz: Tz) -> (ServiceDate, u32) {
    service_clock(Utc::now().with_timezone(&tz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kuala_Lumpur;

    fn times(values: &[&str]) -> Vec<DepartureTime> {
        values.iter().map(|v| DepartureTime::parse(v).unwrap()).collect()
    }

    #[test]
    fn test_parse_elapsed_seconds() {
        assert_eq!(parse_elapsed_seconds("00:00:00").unwrap(), 0);
        assert_eq!(parse_elapsed_seconds("08:15:00").unwrap(), 29_700);
        assert_eq!(parse_elapsed_seconds("8:15:30").unwrap(), 29_730);
        assert_eq!(parse_elapsed_seconds("23:59:59").unwrap(), 86_399);
    }

    #[test]
    fn test_parse_past_midnight_is_not_wrapped() {
        assert_eq!(parse_elapsed_seconds("24:10:00").unwrap(), 87_000);
        assert_eq!(parse_elapsed_seconds("25:00:00").unwrap(), 90_000);
        assert_eq!(parse_elapsed_seconds("48:00:00").unwrap(), 172_800);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "08:15", "08:60:00", "08:15:60", "08:5:00", "aa:bb:cc", "08:15:00:00", "-1:00:00"] {
            assert!(
                matches!(parse_elapsed_seconds(bad), Err(PipelineError::InvalidTime(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_sort_by_seconds_not_text() {
        let mut list = times(&["23:50:00", "24:10:00", "9:00:00", "08:00:00"]);
        list.sort();
        let sorted: Vec<&str> = list.iter().map(DepartureTime::as_str).collect();
        assert_eq!(sorted, vec!["08:00:00", "9:00:00", "23:50:00", "24:10:00"]);
    }

    #[test]
    fn test_has_passed_and_next_departure() {
        let list = times(&["06:00:00", "12:00:00", "24:30:00"]);
        let noon = 12 * 3600;
        assert!(list[0].has_passed(noon));
        assert!(!list[1].has_passed(noon));
        assert_eq!(next_departure(&list, noon).map(|t| t.as_str()), Some("12:00:00"));
        assert_eq!(
            next_departure(&list, noon + 1).map(|t| t.as_str()),
            Some("24:30:00")
        );
        assert!(next_departure(&list, 25 * 3600).is_none());
    }

    #[test]
    fn test_short_label() {
        assert_eq!(DepartureTime::parse("08:15:00").unwrap().short_label(), "08:15");
        assert_eq!(DepartureTime::parse("24:10:30").unwrap().short_label(), "24:10");
    }

    #[test]
    fn test_service_clock_uses_local_zone() {
        // 2025-01-01T20:30:00Z is 04:30 on Jan 2 in Malaysia (UTC+8)
        let utc = Utc.with_ymd_and_hms(2025, 1, 1, 20, 30, 0).unwrap();
        let (date, seconds) = service_clock(utc.with_timezone(&Kuala_Lumpur));
        assert_eq!(date.to_string(), "20250102");
        assert_eq!(seconds, 4 * 3600 + 30 * 60);
    }
}
