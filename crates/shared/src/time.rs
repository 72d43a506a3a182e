//! Device-reported timestamp parsing.
//!
//! Devices send timestamps as ISO 8601 strings that may or may not carry a
//! zone offset, or as Unix epoch numbers. [`ReportedTimestamp`] keeps the
//! wall-clock fields exactly as written together with the offset (if any).

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use thiserror::Error;

/// Epoch values above this are interpreted as milliseconds.
const EPOCH_MILLIS_THRESHOLD: u64 = 20_000_000_000;

/// Naive layouts accepted when no offset is present.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampParseError {
    #[error("Invalid timestamp '{0}': expected ISO 8601 date-time")]
    Format(String),

    #[error("Timestamp out of range: {0}")]
    OutOfRange(i64),
}

/// A timestamp as reported by a device or a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportedTimestamp {
    wall_clock: NaiveDateTime,
    offset: Option<FixedOffset>,
}

impl ReportedTimestamp {
    /// Parses an ISO 8601 / RFC 3339 string, with or without a zone offset.
    pub fn parse(input: &str) -> Result<Self, TimestampParseError> {
        let trimmed = input.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_fixed(dt));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
            if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
                return Ok(Self::from_fixed(dt));
            }
        }
        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Ok(Self::naive(naive));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self::naive(midnight));
            }
        }

        Err(TimestampParseError::Format(input.to_string()))
    }

    /// Builds a timestamp from Unix epoch seconds (or milliseconds for large values).
    pub fn from_epoch(value: i64) -> Result<Self, TimestampParseError> {
        let parsed = if value.unsigned_abs() > EPOCH_MILLIS_THRESHOLD {
            Utc.timestamp_millis_opt(value).single()
        } else {
            Utc.timestamp_opt(value, 0).single()
        };
        parsed
            .map(Self::from_utc)
            .ok_or(TimestampParseError::OutOfRange(value))
    }

    /// A timestamp with no zone annotation.
    pub fn naive(wall_clock: NaiveDateTime) -> Self {
        Self {
            wall_clock,
            offset: None,
        }
    }

    /// A timestamp carrying an explicit offset.
    pub fn from_fixed(dt: DateTime<FixedOffset>) -> Self {
        Self {
            wall_clock: dt.naive_local(),
            offset: Some(*dt.offset()),
        }
    }

    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::from_fixed(dt.fixed_offset())
    }

    /// The offset that was supplied, if any.
    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    /// Wall-clock fields as written, with the zone annotation dropped.
    ///
    /// No conversion happens here: `10:00+02:00` yields `10:00`.
    pub fn wall_clock(&self) -> NaiveDateTime {
        self.wall_clock
    }

    /// The instant this timestamp denotes. A missing offset means UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self.offset {
            Some(offset) => (self.wall_clock - offset).and_utc(),
            None => self.wall_clock.and_utc(),
        }
    }
}

impl fmt::Display for ReportedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{}{}", self.wall_clock.format("%Y-%m-%dT%H:%M:%S%.f"), offset),
            None => write!(f, "{}", self.wall_clock.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl std::str::FromStr for ReportedTimestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct ReportedTimestampVisitor;

impl<'de> Visitor<'de> for ReportedTimestampVisitor {
    type Value = ReportedTimestamp;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an ISO 8601 date-time string or a Unix epoch number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        ReportedTimestamp::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        ReportedTimestamp::from_epoch(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let v = i64::try_from(v).map_err(|_| E::custom("epoch value too large"))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom("epoch value must be finite"));
        }
        self.visit_i64(v.trunc() as i64)
    }
}

impl<'de> Deserialize<'de> for ReportedTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ReportedTimestampVisitor)
    }
}
