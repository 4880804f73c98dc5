//! Daily check-ins.
//!
//! One bitmap per user per month, one bit per day. Checking in is a single
//! atomic test-and-set of today's bit; totals are a population count. Streaks
//! read days `1..=today` in one `BITFIELD` call and count the trailing run of
//! set bits, so the streak never reaches into the previous month.
//!
//! The computed streak is cached per user and month as `day:streak`. An entry
//! written on another day is treated as a miss. Reads cache only non-zero
//! streaks: once today's bit is set the streak for today is fixed, while a
//! zero read may race with today's check-in.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};

use engage_core::{day_offset, CheckInOutcome, MonthBitmap, UserId, YearMonth};
use engage_store::FastStore;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::keys::KeySpace;

/// Records check-ins and answers total and streak queries.
#[derive(Clone)]
pub struct AttendanceTracker {
    fast: Arc<dyn FastStore>,
    keys: KeySpace,
    streak_ttl: Duration,
}

impl AttendanceTracker {
    /// Create a tracker over `fast`.
    #[must_use]
    pub fn new(fast: Arc<dyn FastStore>, config: &EngineConfig) -> Self {
        Self {
            fast,
            keys: KeySpace::new(config.key_prefix.clone()),
            streak_ttl: config.streak_cache_ttl,
        }
    }

    /// Check `user_id` in for `today`.
    ///
    /// Idempotent per day: the second call on the same date returns
    /// `AlreadyCheckedIn` and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the bitmap cannot be updated.
    pub async fn check_in(&self, user_id: UserId, today: NaiveDate) -> Result<CheckInOutcome> {
        let month = YearMonth::of(&today);
        let day = today.day();
        let key = self.keys.attendance(user_id, month);

        let was_set = self
            .fast
            .bit_set(&key, day_offset(day)?, true)
            .await
            .map_err(EngineError::unavailable)?;
        if was_set {
            tracing::debug!(user_id = %user_id, %today, "Already checked in");
            return Ok(CheckInOutcome::AlreadyCheckedIn);
        }

        // The check-in itself has happened; a failed cache refresh only costs
        // a recomputation later.
        match self.compute_streak(&key, day).await {
            Ok(streak) => {
                self.cache_streak(user_id, month, day, streak).await;
                tracing::info!(user_id = %user_id, %today, streak, "Checked in");
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, %today, error = %e, "Checked in, streak not refreshed");
            }
        }

        Ok(CheckInOutcome::Success)
    }

    /// Whether `user_id` has checked in on `today`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the bitmap cannot be read.
    pub async fn has_checked_in(&self, user_id: UserId, today: NaiveDate) -> Result<bool> {
        let key = self.keys.attendance(user_id, YearMonth::of(&today));
        self.fast
            .bit_get(&key, day_offset(today.day())?)
            .await
            .map_err(EngineError::unavailable)
    }

    /// Number of days checked in during `month`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the bitmap cannot be read.
    pub async fn total_check_ins(&self, user_id: UserId, month: YearMonth) -> Result<u64> {
        self.fast
            .bit_count(&self.keys.attendance(user_id, month))
            .await
            .map_err(EngineError::unavailable)
    }

    /// Consecutive check-ins ending on `today`, within `today`'s month.
    ///
    /// Served from the streak cache when it holds a value for `today`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store cannot be read.
    pub async fn consecutive_check_ins(&self, user_id: UserId, today: NaiveDate) -> Result<u32> {
        let month = YearMonth::of(&today);
        let day = today.day();
        let cache_key = self.keys.streak(user_id, month);

        let cached = self
            .fast
            .get(&cache_key)
            .await
            .map_err(EngineError::unavailable)?;
        if let Some(streak) = cached.as_deref().and_then(|v| parse_cached(v, day)) {
            return Ok(streak);
        }

        let streak = self
            .compute_streak(&self.keys.attendance(user_id, month), day)
            .await?;
        // Zero can still change today; a concurrent check-in caches its own value.
        if streak > 0 {
            self.cache_streak(user_id, month, day, streak).await;
        }
        Ok(streak)
    }

    async fn compute_streak(&self, key: &str, day: u32) -> Result<u32> {
        let value = self
            .fast
            .bitfield_get_unsigned(key, day)
            .await
            .map_err(EngineError::unavailable)?;
        Ok(MonthBitmap::new(value, day)?.streak())
    }

    async fn cache_streak(&self, user_id: UserId, month: YearMonth, day: u32, streak: u32) {
        let key = self.keys.streak(user_id, month);
        if let Err(e) = self
            .fast
            .set_with_ttl(&key, &format!("{day}:{streak}"), self.streak_ttl)
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to cache streak");
        }
    }
}

/// Cached `day:streak`, valid only for `day`.
fn parse_cached(value: &str, day: u32) -> Option<u32> {
    let (cached_day, streak) = value.split_once(':')?;
    if cached_day.parse::<u32>().ok()? != day {
        return None;
    }
    streak.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_value_is_scoped_to_its_day() {
        assert_eq!(parse_cached("5:3", 5), Some(3));
        assert_eq!(parse_cached("4:3", 5), None);
        assert_eq!(parse_cached("3", 5), None);
        assert_eq!(parse_cached("5:x", 5), None);
    }
}
