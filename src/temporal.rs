//! # ISO-8601 instants and intervals
//!
//! `phenomenonTime`, `resultTime` and `validTime` arrive as strings that are
//! either a single instant (`2024-05-01T12:00:00Z`) or an interval of two
//! instants joined by exactly one `/`. Every instant is normalized to UTC so
//! that two spellings of the same physical instant compare equal.
//!
//! ```rust
//! use sensorthings::{TimeValue, parse_interval_or_instant};
//!
//! let t = parse_interval_or_instant("2024-05-01T14:00:00+02:00").unwrap();
//! assert_eq!(t, parse_interval_or_instant("2024-05-01T12:00:00Z").unwrap());
//!
//! let i = parse_interval_or_instant("2024-05-01T00:00:00Z/2024-05-02T00:00:00Z").unwrap();
//! assert!(matches!(i, TimeValue::Interval(_)));
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TimeParseError;

const INTERVAL_SEPARATOR: char = '/';

/////////////////////////////////////////////// Parsing ////////////////////////////////////////////////

/// Parses a single ISO-8601 instant with an explicit offset and normalizes it to UTC.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| TimeParseError {
            input: s.to_string(),
            expected: "instant",
        })
}

/// Parses `begin/end`; zero or more than one separator is rejected.
pub fn parse_interval(s: &str) -> Result<TimeInterval, TimeParseError> {
    let err = || TimeParseError {
        input: s.to_string(),
        expected: "interval",
    };
    let mut parts = s.split(INTERVAL_SEPARATOR);
    let (Some(begin), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(err());
    };
    let begin = parse_instant(begin).map_err(|_| err())?;
    let end = parse_instant(end).map_err(|_| err())?;
    Ok(TimeInterval { begin, end })
}

/// Attempts an instant first and falls back to an interval.
pub fn parse_interval_or_instant(s: &str) -> Result<TimeValue, TimeParseError> {
    if let Ok(instant) = parse_instant(s) {
        return Ok(TimeValue::Instant(instant));
    }
    parse_interval(s)
        .map(TimeValue::Interval)
        .map_err(|_| TimeParseError {
            input: s.to_string(),
            expected: "instant or interval",
        })
}

fn format_instant(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

//////////////////////////////////////////// TimeInterval //////////////////////////////////////////////

/// A closed pair of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeInterval {
    /// Start of the interval.
    pub begin: DateTime<Utc>,
    /// End of the interval.
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeInterval { begin, end }
    }
}

impl Display for TimeInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}{}{}",
            format_instant(&self.begin),
            INTERVAL_SEPARATOR,
            format_instant(&self.end)
        )
    }
}

impl FromStr for TimeInterval {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_interval(s)
    }
}

////////////////////////////////////////////// TimeValue ///////////////////////////////////////////////

/// Either a single instant or an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeValue {
    /// A single point in time.
    Instant(DateTime<Utc>),
    /// A `begin/end` pair.
    Interval(TimeInterval),
}

impl TimeValue {
    /// The instant, or the start of the interval.
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            TimeValue::Instant(t) => *t,
            TimeValue::Interval(i) => i.begin,
        }
    }

    /// The instant, or the end of the interval.
    pub fn end(&self) -> DateTime<Utc> {
        match self {
            TimeValue::Instant(t) => *t,
            TimeValue::Interval(i) => i.end,
        }
    }
}

impl From<DateTime<Utc>> for TimeValue {
    fn from(t: DateTime<Utc>) -> Self {
        TimeValue::Instant(t)
    }
}

impl Display for TimeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TimeValue::Instant(t) => write!(f, "{}", format_instant(t)),
            TimeValue::Interval(i) => write!(f, "{}", i),
        }
    }
}

impl FromStr for TimeValue {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_interval_or_instant(s)
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(TimeValue);
string_serde!(TimeInterval);
