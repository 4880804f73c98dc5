//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Interaction rows, keyed by `kind || subject_id || actor_id`.
    pub const INTERACTIONS: &str = "interactions";

    /// Index: interactions by actor, keyed by `kind || actor_id || subject_id`.
    /// Value is empty (index only).
    pub const INTERACTIONS_BY_ACTOR: &str = "interactions_by_actor";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::INTERACTIONS, cf::INTERACTIONS_BY_ACTOR]
}
