//! Interaction types: likes, collects and their pending toggles.
//!
//! A toggle is buffered as a [`InteractionRecord`] until the write-back flush
//! turns it into a durable [`Interaction`] row (or removes one).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{EngageError, SubjectId, UserId};

/// The kind of boolean interaction a user can toggle on a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Like / unlike.
    Like,
    /// Collect / uncollect (bookmarks).
    Collect,
}

impl InteractionKind {
    /// Every known kind.
    pub const ALL: [Self; 2] = [Self::Like, Self::Collect];

    /// Stable lowercase name, used in fast-store keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Collect => "collect",
        }
    }

    /// One-byte tag used as the leading byte of durable keys.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Like => 1,
            Self::Collect => 2,
        }
    }
}

impl FromStr for InteractionKind {
    type Err = EngageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "collect" => Ok(Self::Collect),
            other => Err(EngageError::InvalidKind(other.to_string())),
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an interaction within a kind: who did it to what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InteractionKey {
    /// The subject being interacted with.
    pub subject_id: SubjectId,
    /// The user doing the interacting.
    pub actor_id: UserId,
}

impl InteractionKey {
    /// Create a new key.
    #[must_use]
    pub const fn new(subject_id: SubjectId, actor_id: UserId) -> Self {
        Self {
            subject_id,
            actor_id,
        }
    }

    /// Field name inside the pending hash: `subject:actor`.
    #[must_use]
    pub fn to_field(&self) -> String {
        format!("{}:{}", self.subject_id, self.actor_id)
    }

    /// Parse a pending-hash field.
    ///
    /// # Errors
    ///
    /// Returns `EngageError::InvalidInteractionKey` if the field is not two
    /// integers separated by a colon.
    pub fn parse_field(field: &str) -> crate::Result<Self> {
        let invalid = || EngageError::InvalidInteractionKey(field.to_string());
        let (subject, actor) = field.split_once(':').ok_or_else(invalid)?;
        let subject_id = subject.parse().map_err(|_| invalid())?;
        let actor_id = actor.parse().map_err(|_| invalid())?;
        Ok(Self::new(subject_id, actor_id))
    }
}

impl fmt::Display for InteractionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_id, self.actor_id)
    }
}

/// A pending toggle held in the fast store until the next flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionRecord {
    /// Interaction kind.
    pub kind: InteractionKind,
    /// Subject and actor.
    pub key: InteractionKey,
    /// `true` to add the interaction, `false` to remove it.
    pub desired: bool,
}

impl InteractionRecord {
    /// Create a new pending record.
    #[must_use]
    pub const fn new(kind: InteractionKind, key: InteractionKey, desired: bool) -> Self {
        Self { kind, key, desired }
    }

    /// Value stored in the pending hash.
    #[must_use]
    pub const fn encoded_state(&self) -> &'static str {
        encode_state(self.desired)
    }

    /// Rebuild a record from a pending-hash entry.
    ///
    /// Values other than `"true"` decode as `false`.
    ///
    /// # Errors
    ///
    /// Returns `EngageError::InvalidInteractionKey` if the field is malformed.
    pub fn from_entry(kind: InteractionKind, field: &str, value: &str) -> crate::Result<Self> {
        Ok(Self::new(
            kind,
            InteractionKey::parse_field(field)?,
            decode_state(value),
        ))
    }
}

/// Encode a desired state for the pending hash.
#[must_use]
pub const fn encode_state(desired: bool) -> &'static str {
    if desired {
        "true"
    } else {
        "false"
    }
}

/// Decode a pending-hash value.
#[must_use]
pub fn decode_state(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// A durable interaction row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction kind.
    pub kind: InteractionKind,
    /// The subject being interacted with.
    pub subject_id: SubjectId,
    /// The user doing the interacting.
    pub actor_id: UserId,
    /// When the interaction was first persisted.
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    /// Create a row stamped with the current time.
    #[must_use]
    pub fn new(kind: InteractionKind, key: InteractionKey) -> Self {
        Self {
            kind,
            subject_id: key.subject_id,
            actor_id: key.actor_id,
            created_at: Utc::now(),
        }
    }

    /// The identity of this row.
    #[must_use]
    pub const fn key(&self) -> InteractionKey {
        InteractionKey::new(self.subject_id, self.actor_id)
    }
}
