//! UTC calendar dates.
//!
//! Every date that crosses the engine boundary is a [`CalendarDate`]: a day on
//! the UTC calendar, formatted as zero-padded `YYYY-MM-DD`. Parsing,
//! formatting and day arithmetic all live here so no caller ever derives a
//! date from local time or by string manipulation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const FORMAT: &str = "%Y-%m-%d";

/// Date parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("Invalid calendar date '{0}', expected YYYY-MM-DD")]
    Invalid(String),
}

/// A day on the UTC calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Build a date from year, month and day.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| DateError::Invalid(format!("{:04}-{:02}-{:02}", year, month, day)))
    }

    /// Parse a `YYYY-MM-DD` string.
    ///
    /// Only the canonical zero-padded form is accepted, so a parsed date always
    /// formats back to the same string.
    pub fn parse(s: &str) -> Result<Self, DateError> {
        let s = s.trim();
        if s.len() != 10 {
            return Err(DateError::Invalid(s.to_string()));
        }
        NaiveDate::parse_from_str(s, FORMAT)
            .map(Self)
            .map_err(|_| DateError::Invalid(s.to_string()))
    }

    /// The UTC calendar day of a timestamp.
    pub fn from_utc(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp.date_naive())
    }

    /// Today's date on the UTC calendar.
    pub fn today_utc() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Shift by a number of days (negative moves backward).
    pub fn add_days(self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// The previous calendar day.
    pub fn yesterday(self) -> Self {
        self.add_days(-1)
    }

    /// Underlying chrono date.
    pub fn naive(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl FromStr for CalendarDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

/// Supplies the current UTC calendar day.
pub trait DateSource {
    /// Today's date.
    fn today(&self) -> CalendarDate;

    /// The day before today.
    fn yesterday(&self) -> CalendarDate {
        self.today().yesterday()
    }
}

/// Wall-clock date source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl DateSource for SystemClock {
    fn today(&self) -> CalendarDate {
        CalendarDate::today_utc()
    }
}

/// Date source pinned to one day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub CalendarDate);

impl DateSource for FixedClock {
    fn today(&self) -> CalendarDate {
        self.0
    }
}
