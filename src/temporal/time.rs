//! Dump timestamp parsing
//!
//! Timestamps look like `+yyyy-mm-ddThh:mm:ssZ`:
//! - the sign may be `-` and the year may have more than four digits
//! - month and day are `00` when the precision is coarser than a day
//! - the offset from UTC is carried separately, in minutes

use crate::entity::TimeValue;
use chrono::{DateTime, Utc};
use std::fmt;
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error("datetime has no date part")]
    NoDate,
    #[error("datetime has no time part")]
    NoTime,
    #[error("date part is missing a month or day field")]
    IncompleteDate,
    #[error("date field out of range: {0}")]
    DateOutOfRange(String),
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("int parse error: {0}")]
    ParseInt(#[from] ParseIntError),
}

/// Absolute instant in seconds since the Unix epoch (proleptic Gregorian).
///
/// Wide enough for geological years that `chrono` cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Sorts before every resolvable timestamp
    pub const MIN: Timestamp = Timestamp(i64::MIN);

    pub fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn unix_seconds(&self) -> i64 {
        self.0
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.timestamp())
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }
}

/// A parsed dump timestamp with variable precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WikiTime {
    pub year: i64,
    /// `None` when the dump gives `00`
    pub month: Option<u8>,
    /// `None` when the dump gives `00`
    pub day: Option<u8>,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Offset from UTC in minutes
    pub offset_minutes: i32,
}

impl WikiTime {
    /// Parse the calendar string of a time value.
    ///
    /// Invariant: the string is ASCII (non-ASCII input fails to parse).
    pub fn parse(datetime: &str, offset_minutes: i32) -> Result<Self, TimeParseError> {
        let (date, time) = datetime.split_once('T').ok_or(TimeParseError::NoTime)?;
        if date.is_empty() || !date.is_ascii() {
            return Err(TimeParseError::NoDate);
        }

        // the leading sign belongs to the year, not to the field separator
        let (negative, digits) = match date.as_bytes()[0] {
            b'-' => (true, &date[1..]),
            b'+' => (false, &date[1..]),
            _ => (false, date),
        };

        let mut fields = digits.splitn(3, '-');
        let year: i64 = fields.next().ok_or(TimeParseError::NoDate)?.parse()?;
        let month: u8 = fields
            .next()
            .ok_or(TimeParseError::IncompleteDate)?
            .parse()?;
        let day: u8 = fields
            .next()
            .ok_or(TimeParseError::IncompleteDate)?
            .parse()?;

        if month > 12 {
            return Err(TimeParseError::DateOutOfRange(format!("month {}", month)));
        }
        if day > 31 {
            return Err(TimeParseError::DateOutOfRange(format!("day {}", day)));
        }

        let time = time.strip_suffix('Z').unwrap_or(time);
        let mut time_fields = time.split(':');
        let mut next_field = |name: &str, max: u8| -> Result<u8, TimeParseError> {
            let value: u8 = time_fields
                .next()
                .ok_or_else(|| TimeParseError::InvalidTime(format!("missing {}", name)))?
                .parse()?;
            if value > max {
                return Err(TimeParseError::InvalidTime(format!("{} {}", name, value)));
            }
            Ok(value)
        };
        let hour = next_field("hour", 23)?;
        let minute = next_field("minute", 59)?;
        // leap seconds are written as :60
        let second = next_field("second", 60)?;

        Ok(WikiTime {
            year: if negative { -year } else { year },
            month: (month != 0).then_some(month),
            day: (day != 0).then_some(day),
            hour,
            minute,
            second,
            offset_minutes,
        })
    }

    pub fn from_value(value: &TimeValue) -> Result<Self, TimeParseError> {
        Self::parse(&value.time, value.timezone)
    }

    /// Resolve to an absolute instant.
    ///
    /// A missing month or day defaults to January / the 1st. The fields are
    /// local to the carried offset, so the offset is subtracted.
    pub fn to_timestamp(&self) -> Timestamp {
        let days = days_from_civil(
            self.year as i128,
            self.month.unwrap_or(1) as i128,
            self.day.unwrap_or(1) as i128,
        );
        let seconds = days * 86_400
            + self.hour as i128 * 3_600
            + self.minute as i128 * 60
            + self.second as i128
            - self.offset_minutes as i128 * 60;

        // clamp so no parsed time collides with Timestamp::MIN
        let clamped = seconds.clamp(i64::MIN as i128 + 1, i64::MAX as i128);
        Timestamp(clamped as i64)
    }

    /// Zone name for display, e.g. `UTC`, `UTC+2`, `UTC+5.5`
    pub fn zone_label(&self) -> String {
        if self.offset_minutes == 0 {
            return "UTC".to_string();
        }
        if self.offset_minutes % 60 == 0 {
            format!("UTC{:+}", self.offset_minutes / 60)
        } else {
            format!("UTC{:+.1}", self.offset_minutes as f64 / 60.0)
        }
    }
}

impl fmt::Display for WikiTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} {}",
            self.year,
            self.month.unwrap_or(1),
            self.day.unwrap_or(1),
            self.hour,
            self.minute,
            self.second,
            self.zone_label()
        )
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date
fn days_from_civil(year: i128, month: i128, day: i128) -> i128 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let year_of_era = year - era * 400;
    let month_index = if month > 2 { month - 3 } else { month + 9 };
    let day_of_year = (153 * month_index + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}
