//! Fast-store key layout.

use engage_core::{InteractionKind, UserId, YearMonth};

/// Builds every fast-store key under one prefix.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Create a key space rooted at `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Pending-toggle hash for one interaction kind.
    #[must_use]
    pub fn interactions(&self, kind: InteractionKind) -> String {
        format!("{}:interact:{kind}", self.prefix)
    }

    /// Check-in bitmap for a user and month.
    #[must_use]
    pub fn attendance(&self, user_id: UserId, month: YearMonth) -> String {
        format!("{}:sign:{user_id}:{month}", self.prefix)
    }

    /// Cached streak for a user and month.
    #[must_use]
    pub fn streak(&self, user_id: UserId, month: YearMonth) -> String {
        format!("{}:sign-streak:{user_id}:{month}", self.prefix)
    }

    /// Sorted set of last-seen timestamps.
    #[must_use]
    pub fn presence(&self) -> String {
        format!("{}:online", self.prefix)
    }
}
