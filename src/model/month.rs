//! Calendar month arithmetic used for month bucketing and installment scheduling.

use crate::error::Error;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The earliest year a month or a ledger date may fall in.
pub const MIN_YEAR: i32 = 1;
/// The latest year a month or a ledger date may fall in. Timestamps are stored as text and
/// bucketed by their `YYYY-MM` prefix, which needs a four-digit year.
pub const MAX_YEAR: i32 = 9999;

/// A validated calendar month, e.g. `2025-03`.
///
/// All month-scoped views bucket transactions by the month of their `created_at` timestamp, so
/// this type is the key for balances and rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Creates a month, failing with `InvalidArgument` if `month` is not in `1..=12` or the year is
    /// not a four-digit year.
    pub fn new(year: i32, month: u32) -> crate::Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::invalid(format!(
                "Month must be between 1 and 12, got {month}"
            )));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::invalid(format!(
                "Year must be between {MIN_YEAR} and {MAX_YEAR}, got {year}"
            )));
        }
        Ok(Self { year, month })
    }

    /// The month of `date`, failing with `InvalidArgument` when the year is outside the
    /// supported range.
    pub fn containing(date: NaiveDate) -> crate::Result<Self> {
        Self::new(date.year(), date.month())
    }

    /// The month that `date` falls in.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The preceding month. January rolls back to December of the previous year.
    pub fn prev(&self) -> Self {
        self.plus(-1)
    }

    /// The following month. December rolls over to January of the next year.
    pub fn next(&self) -> Self {
        self.plus(1)
    }

    /// Moves `months` calendar months forward (or backward when negative).
    pub fn plus(&self, months: i32) -> Self {
        let zero_based = self.year * 12 + (self.month as i32 - 1) + months;
        Self {
            year: zero_based.div_euclid(12),
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }

    /// The number of days in this month.
    pub fn days(&self) -> u32 {
        match self.month {
            2 if is_leap_year(self.year) => 29,
            2 => 28,
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        }
    }

    /// Whether the timestamp falls within this calendar month.
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp.year() == self.year && timestamp.month() == self.month
    }

    /// Returns `date` moved by `months` calendar months, keeping the day-of-month. When the target
    /// month is shorter than the day, the result is clamped to the target month's last day, so
    /// Jan 31 + 1 month is Feb 28 (or Feb 29 in a leap year), never a day in March.
    ///
    /// Returns `None` when the target month falls outside the supported years.
    pub fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
        let zero_based = date
            .year()
            .checked_mul(12)?
            .checked_add(date.month0() as i32)?
            .checked_add(months)?;
        let target =
            Self::new(zero_based.div_euclid(12), zero_based.rem_euclid(12) as u32 + 1).ok()?;
        let day = date.day().min(target.days());
        NaiveDate::from_ymd_opt(target.year, target.month, day)
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = Error;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| Error::invalid(format!("Expected a month like 2025-03, got '{s}'")))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| Error::invalid(format!("Invalid year in '{s}'")))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| Error::invalid(format!("Invalid month in '{s}'")))?;
        Month::new(year, month)
    }
}

impl Serialize for Month {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Month::from_str(&s).map_err(serde::de::Error::custom)
    }
}
