//! Online presence.
//!
//! A single sorted set maps each user to the epoch milliseconds of their last
//! heartbeat. Clients heartbeat periodically; the tracker never polls and never
//! schedules its own sweeps.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use engage_core::UserId;
use engage_store::FastStore;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::keys::KeySpace;

/// Tracks last-seen timestamps.
#[derive(Clone)]
pub struct PresenceTracker {
    fast: Arc<dyn FastStore>,
    keys: KeySpace,
}

impl PresenceTracker {
    /// Create a tracker over `fast`.
    #[must_use]
    pub fn new(fast: Arc<dyn FastStore>, config: &EngineConfig) -> Self {
        Self {
            fast,
            keys: KeySpace::new(config.key_prefix.clone()),
        }
    }

    /// Record that `user_id` is online at `now`. Returns `true` if the user was
    /// not already present.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store write fails.
    pub async fn heartbeat(&self, user_id: UserId, now: DateTime<Utc>) -> Result<bool> {
        let added = self
            .fast
            .zset_add(
                &self.keys.presence(),
                &user_id.to_string(),
                millis_to_score(now.timestamp_millis()),
            )
            .await
            .map_err(EngineError::unavailable)?;

        tracing::debug!(user_id = %user_id, added, "Heartbeat");
        Ok(added)
    }

    /// Number of users present.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store cannot be read.
    pub async fn online_count(&self) -> Result<u64> {
        self.fast
            .zset_card(&self.keys.presence())
            .await
            .map_err(EngineError::unavailable)
    }

    /// Remove users whose last heartbeat is more than `older_than` before
    /// `now`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store write fails.
    pub async fn sweep(&self, older_than: Duration, now: DateTime<Utc>) -> Result<u64> {
        let window = i64::try_from(older_than.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.timestamp_millis().saturating_sub(window);

        let removed = self
            .fast
            .zset_remove_below(&self.keys.presence(), millis_to_score(cutoff))
            .await
            .map_err(EngineError::unavailable)?;

        tracing::info!(removed, older_than_secs = older_than.as_secs(), "Swept presence");
        Ok(removed)
    }

    /// Time since `user_id`'s last heartbeat, or `None` if the user is not
    /// present (never seen, or swept). Timestamps in the future count as zero.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store cannot be read.
    pub async fn last_seen_age(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Duration>> {
        let score = self
            .fast
            .zset_score(&self.keys.presence(), &user_id.to_string())
            .await
            .map_err(EngineError::unavailable)?;

        Ok(score.map(|score| {
            let age = now.timestamp_millis().saturating_sub(score_to_millis(score));
            Duration::from_millis(u64::try_from(age).unwrap_or(0))
        }))
    }
}

// Millisecond timestamps stay below 2^53 until the year 287396, so the f64
// score is exact.
#[allow(clippy::cast_precision_loss)]
fn millis_to_score(millis: i64) -> f64 {
    millis as f64
}

#[allow(clippy::cast_possible_truncation)]
fn score_to_millis(score: f64) -> i64 {
    score as i64
}
