//! Attendance (daily check-in) types.
//!
//! Check-ins are stored as one bitmap per user per calendar month. Streaks are
//! scoped to the month: the bit for day 1 is the boundary, and nothing from the
//! previous month is consulted.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EngageError;

/// Longest month, and so the widest bitmap read.
pub const MAX_DAYS_IN_MONTH: u32 = 31;

/// A calendar month, the natural key of an attendance bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    /// Calendar year.
    pub year: i32,
    /// Month, `1..=12`.
    pub month: u32,
}

impl YearMonth {
    /// Create a new year-month.
    #[must_use]
    pub const fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The month containing `date`.
    #[must_use]
    pub fn of<D: Datelike>(date: &D) -> Self {
        Self::new(date.year(), date.month())
    }
}

impl fmt::Display for YearMonth {
    /// Renders as `yyyyMM`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

/// Outcome of a daily check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInOutcome {
    /// The bit for today was set by this call.
    Success,
    /// Today's bit was already set; nothing changed.
    AlreadyCheckedIn,
}

/// The first `day` bits of a month bitmap, read as an unsigned integer.
///
/// Day 1 is the most significant of those bits and `day` the least
/// significant, matching `BITFIELD GET u<day> 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBitmap {
    value: u64,
}

impl MonthBitmap {
    /// Wrap a value read for days `1..=day`.
    ///
    /// # Errors
    ///
    /// Returns `EngageError::InvalidDay` if `day` is not in `1..=31`.
    pub fn new(value: u64, day: u32) -> crate::Result<Self> {
        if !(1..=MAX_DAYS_IN_MONTH).contains(&day) {
            return Err(EngageError::InvalidDay(day));
        }
        let mask = (1u64 << day) - 1;
        Ok(Self {
            value: value & mask,
        })
    }

    /// Consecutive check-ins ending at `day`, stopping at the first gap or at day 1.
    #[must_use]
    pub const fn streak(&self) -> u32 {
        self.value.trailing_ones()
    }
}

/// Bit offset of `day` within a month bitmap.
///
/// # Errors
///
/// Returns `EngageError::InvalidDay` if `day` is not in `1..=31`.
pub fn day_offset(day: u32) -> crate::Result<u32> {
    if (1..=MAX_DAYS_IN_MONTH).contains(&day) {
        Ok(day - 1)
    } else {
        Err(EngageError::InvalidDay(day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn year_month_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(YearMonth::of(&date).to_string(), "202403");
    }

    fn from_days(days: &[u32], day: u32) -> MonthBitmap {
        let value = days.iter().fold(0u64, |acc, &d| acc | 1 << (day - d));
        MonthBitmap::new(value, day).unwrap()
    }

    #[test]
    fn streak_stops_at_gap() {
        assert_eq!(from_days(&[1, 2, 3, 5], 5).streak(), 1);
    }

    #[test]
    fn streak_runs_to_day_one() {
        assert_eq!(from_days(&[1, 2, 3, 4, 5], 5).streak(), 5);
    }

    #[test]
    fn no_check_in_today_means_no_streak() {
        assert_eq!(from_days(&[1, 2, 3], 4).streak(), 0);
    }

    #[test]
    fn day_one_is_the_most_significant_bit() {
        // u5 read of bits 1,0,0,0,1 -> 0b10001
        assert_eq!(MonthBitmap::new(0b10001, 5).unwrap().streak(), 1);
        assert_eq!(MonthBitmap::new(0b10011, 5).unwrap().streak(), 2);
    }

    #[test]
    fn full_month() {
        let days: Vec<u32> = (1..=31).collect();
        assert_eq!(from_days(&days, 31).streak(), 31);
    }

    #[test]
    fn out_of_range_days() {
        assert_eq!(MonthBitmap::new(0, 0), Err(EngageError::InvalidDay(0)));
        assert_eq!(MonthBitmap::new(0, 32), Err(EngageError::InvalidDay(32)));
        // Bits above the requested width are ignored.
        assert_eq!(MonthBitmap::new(0b10_1111, 5).unwrap().streak(), 4);
        assert_eq!(day_offset(1), Ok(0));
        assert!(day_offset(0).is_err());
    }
}
