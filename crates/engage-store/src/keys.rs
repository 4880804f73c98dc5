//! Key encoding utilities for `RocksDB`.
//!
//! All keys start with the one-byte interaction kind tag followed by
//! big-endian identifiers, so prefix scans return rows in numeric order.

use engage_core::{InteractionKey, InteractionKind, SubjectId, UserId};

/// Length of a full interaction key: tag + two 8-byte ids.
pub const INTERACTION_KEY_LEN: usize = 17;

/// Length of a `kind || id` prefix.
pub const PREFIX_LEN: usize = 9;

/// Create a primary interaction key.
///
/// Format: `tag (1 byte) || subject_id (8 bytes) || actor_id (8 bytes)`
#[must_use]
pub fn interaction_key(kind: InteractionKind, key: InteractionKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(INTERACTION_KEY_LEN);
    out.push(kind.tag());
    out.extend_from_slice(&key.subject_id.to_be_bytes());
    out.extend_from_slice(&key.actor_id.to_be_bytes());
    out
}

/// Create an actor index key.
///
/// Format: `tag (1 byte) || actor_id (8 bytes) || subject_id (8 bytes)`
#[must_use]
pub fn actor_index_key(kind: InteractionKind, key: InteractionKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(INTERACTION_KEY_LEN);
    out.push(kind.tag());
    out.extend_from_slice(&key.actor_id.to_be_bytes());
    out.extend_from_slice(&key.subject_id.to_be_bytes());
    out
}

/// Prefix for iterating all interactions of a kind on a subject.
#[must_use]
pub fn subject_prefix(kind: InteractionKind, subject_id: SubjectId) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREFIX_LEN);
    out.push(kind.tag());
    out.extend_from_slice(&subject_id.to_be_bytes());
    out
}

/// Prefix for iterating an actor's index entries of a kind.
#[must_use]
pub fn actor_prefix(kind: InteractionKind, actor_id: UserId) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREFIX_LEN);
    out.push(kind.tag());
    out.extend_from_slice(&actor_id.to_be_bytes());
    out
}

/// Extract the subject ID from an actor index key.
///
/// Returns `None` if the key is not a full index key.
#[must_use]
pub fn subject_from_actor_key(key: &[u8]) -> Option<SubjectId> {
    let bytes: [u8; 8] = key.get(PREFIX_LEN..INTERACTION_KEY_LEN)?.try_into().ok()?;
    Some(SubjectId::from_be_bytes(bytes))
}
