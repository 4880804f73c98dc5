//! Storage layer for engage.
//!
//! The engine talks to two collaborators:
//!
//! - a **durable store** ([`InteractionStore`]) holding interaction rows. The
//!   provided implementation is [`RocksStore`], using column families for the
//!   primary rows and an actor index.
//! - a **fast store** ([`FastStore`]) with string, hash, bitmap and sorted-set
//!   primitives. [`RedisFastStore`] talks to Redis; [`MemoryFastStore`] keeps
//!   the same semantics in process memory.
//!
//! # Architecture
//!
//! The durable store uses the following column families:
//!
//! - `interactions`: one row per interaction, keyed by `kind || subject || actor`
//! - `interactions_by_actor`: index keyed by `kind || actor || subject`
//!
//! # Example
//!
//! ```no_run
//! use engage_core::{Interaction, InteractionKey, InteractionKind, SubjectId, UserId};
//! use engage_store::{InteractionStore, RocksStore};
//!
//! let store = RocksStore::open("/tmp/engage-db").unwrap();
//!
//! let key = InteractionKey::new(SubjectId::new(1), UserId::new(2));
//! store
//!     .insert_interactions(InteractionKind::Like, &[Interaction::new(InteractionKind::Like, key)])
//!     .unwrap();
//!
//! let likes = store.count_for_subject(InteractionKind::Like, SubjectId::new(1)).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use engage_core::{Interaction, InteractionKey, InteractionKind, SubjectId, UserId};

pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryFastStore;
pub use redis_store::RedisFastStore;
pub use rocks::RocksStore;

/// The durable storage trait for interaction rows.
///
/// Writes are batched: each call is applied atomically as a whole.
pub trait InteractionStore: Send + Sync {
    /// Insert a batch of interaction rows of one kind. Rows already present
    /// are left as they are, so they keep their `created_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_interactions(&self, kind: InteractionKind, rows: &[Interaction]) -> Result<()>;

    /// Delete a batch of interactions of one kind. Missing rows are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_interactions(&self, kind: InteractionKind, keys: &[InteractionKey]) -> Result<()>;

    /// Existence count for one `(subject, actor)` pair: 0 or 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn interaction_count(&self, kind: InteractionKind, key: InteractionKey) -> Result<u64>;

    /// Number of interactions of `kind` on a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_for_subject(&self, kind: InteractionKind, subject_id: SubjectId) -> Result<u64>;

    /// Subjects an actor has an interaction of `kind` with, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn subjects_for_actor(&self, kind: InteractionKind, actor_id: UserId)
        -> Result<Vec<SubjectId>>;
}

/// The fast key/value store trait.
///
/// Every method maps to a single atomic command of the backing store. Bitmaps
/// use Redis bit ordering: offset 0 is the most significant bit of byte 0.
#[async_trait]
pub trait FastStore: Send + Sync {
    // =========================================================================
    // Strings
    // =========================================================================

    /// Get a string value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a string value that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    // =========================================================================
    // Hashes
    // =========================================================================

    /// Set a hash field, overwriting any previous value.
    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Set a hash field only if it is absent. Returns whether it was set.
    async fn hash_put_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool>;

    /// Get a hash field.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Number of fields in a hash.
    async fn hash_len(&self, key: &str) -> Result<u64>;

    /// Read the entire hash and delete the key in one atomic step.
    async fn hash_take_all(&self, key: &str) -> Result<HashMap<String, String>>;

    // =========================================================================
    // Bitmaps
    // =========================================================================

    /// Set or clear a bit, returning its previous value.
    async fn bit_set(&self, key: &str, offset: u32, value: bool) -> Result<bool>;

    /// Read a bit. Missing keys read as all zeros.
    async fn bit_get(&self, key: &str, offset: u32) -> Result<bool>;

    /// Population count of the whole bitmap.
    async fn bit_count(&self, key: &str) -> Result<u64>;

    /// Read the first `width` bits (at most 63) as an unsigned integer,
    /// offset 0 being the most significant bit.
    async fn bitfield_get_unsigned(&self, key: &str, width: u32) -> Result<u64>;

    // =========================================================================
    // Sorted sets
    // =========================================================================

    /// Add or re-score a member. Returns `true` if the member was new.
    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<bool>;

    /// Score of a member, if present.
    async fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Number of members.
    async fn zset_card(&self, key: &str) -> Result<u64>;

    /// Remove every member with a score strictly below `max`. Returns the count removed.
    async fn zset_remove_below(&self, key: &str, max: f64) -> Result<u64>;
}
