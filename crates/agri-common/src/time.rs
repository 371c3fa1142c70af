//! Date handling for scene searches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive range of acquisition dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range; `start` must not be after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TimeParseError> {
        if start > end {
            return Err(TimeParseError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// STAC `datetime` interval, e.g. `"2024-07-01/2024-07-31"`.
    pub fn to_stac_interval(&self) -> String {
        format!("{}/{}", self.start, self.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}

/// Acquisition date of a STAC `datetime` property.
///
/// Accepts RFC 3339 timestamps ("2024-07-14T07:06:58.024000Z") and bare
/// dates; only the calendar date in UTC is kept.
pub fn acquisition_date(datetime: &str) -> Result<NaiveDate, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(datetime) {
        return Ok(dt.with_timezone(&Utc).date_naive());
    }

    datetime
        .get(..10)
        .ok_or_else(|| TimeParseError::InvalidFormat(datetime.to_string()))
        .and_then(parse_date)
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid date format: {0}. Expected YYYY-MM-DD")]
    InvalidFormat(String),

    #[error("Date range start {start} is after end {end}")]
    InvertedRange { start: String, end: String },
}
