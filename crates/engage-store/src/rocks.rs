//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `InteractionStore` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use engage_core::{Interaction, InteractionKey, InteractionKind, SubjectId, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::InteractionStore;

/// RocksDB-backed durable store.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Collect every key in `cf_name` starting with `prefix`.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let handle = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&handle, IteratorMode::From(prefix, Direction::Forward));

        let mut found = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push(key);
        }
        Ok(found)
    }

    /// Read a stored row back (used by tests and diagnostics).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation or decoding fails.
    pub fn get_interaction(
        &self,
        kind: InteractionKind,
        key: InteractionKey,
    ) -> Result<Option<Interaction>> {
        let handle = self.cf(cf::INTERACTIONS)?;

        self.db
            .get_cf(&handle, keys::interaction_key(kind, key))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }
}

impl InteractionStore for RocksStore {
    fn insert_interactions(&self, kind: InteractionKind, rows: &[Interaction]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let cf_rows = self.cf(cf::INTERACTIONS)?;
        let cf_by_actor = self.cf(cf::INTERACTIONS_BY_ACTOR)?;

        let mut batch = WriteBatch::default();
        let mut kept = 0usize;
        for row in rows {
            let key = row.key();
            let row_key = keys::interaction_key(kind, key);
            // An existing row keeps its original `created_at`.
            let exists = self
                .db
                .get_pinned_cf(&cf_rows, &row_key)
                .map_err(|e| StoreError::Database(e.to_string()))?
                .is_some();
            if exists {
                kept += 1;
            } else {
                batch.put_cf(&cf_rows, &row_key, Self::serialize(row)?);
            }
            batch.put_cf(&cf_by_actor, keys::actor_index_key(kind, key), []);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(kind = %kind, rows = rows.len(), kept, "Inserted interactions");
        Ok(())
    }

    fn delete_interactions(&self, kind: InteractionKind, keys: &[InteractionKey]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let cf_rows = self.cf(cf::INTERACTIONS)?;
        let cf_by_actor = self.cf(cf::INTERACTIONS_BY_ACTOR)?;

        let mut batch = WriteBatch::default();
        for &key in keys {
            batch.delete_cf(&cf_rows, keys::interaction_key(kind, key));
            batch.delete_cf(&cf_by_actor, keys::actor_index_key(kind, key));
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(kind = %kind, rows = keys.len(), "Deleted interactions");
        Ok(())
    }

    fn interaction_count(&self, kind: InteractionKind, key: InteractionKey) -> Result<u64> {
        let handle = self.cf(cf::INTERACTIONS)?;

        let exists = self
            .db
            .get_cf(&handle, keys::interaction_key(kind, key))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        Ok(u64::from(exists))
    }

    fn count_for_subject(&self, kind: InteractionKind, subject_id: SubjectId) -> Result<u64> {
        let prefix = keys::subject_prefix(kind, subject_id);
        let found = self.scan_prefix(cf::INTERACTIONS, &prefix)?;
        Ok(found.len() as u64)
    }

    fn subjects_for_actor(
        &self,
        kind: InteractionKind,
        actor_id: UserId,
    ) -> Result<Vec<SubjectId>> {
        let prefix = keys::actor_prefix(kind, actor_id);

        self.scan_prefix(cf::INTERACTIONS_BY_ACTOR, &prefix)?
            .iter()
            .map(|key| {
                keys::subject_from_actor_key(key).ok_or_else(|| StoreError::Corrupt {
                    key: format!("{key:?}"),
                    message: "truncated actor index key".into(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn key(subject: u64, actor: u64) -> InteractionKey {
        InteractionKey::new(SubjectId::new(subject), UserId::new(actor))
    }

    fn like(subject: u64, actor: u64) -> Interaction {
        Interaction::new(InteractionKind::Like, key(subject, actor))
    }

    #[test]
    fn insert_then_count() {
        let (store, _dir) = create_test_store();

        store
            .insert_interactions(InteractionKind::Like, &[like(1, 10), like(1, 11), like(2, 10)])
            .unwrap();

        assert_eq!(store.interaction_count(InteractionKind::Like, key(1, 10)).unwrap(), 1);
        assert_eq!(store.interaction_count(InteractionKind::Like, key(1, 12)).unwrap(), 0);
        assert_eq!(store.count_for_subject(InteractionKind::Like, SubjectId::new(1)).unwrap(), 2);
        assert_eq!(store.count_for_subject(InteractionKind::Like, SubjectId::new(2)).unwrap(), 1);

        let row = store
            .get_interaction(InteractionKind::Like, key(2, 10))
            .unwrap()
            .unwrap();
        assert_eq!(row.subject_id, SubjectId::new(2));
        assert_eq!(row.actor_id, UserId::new(10));
    }

    #[test]
    fn kinds_are_isolated() {
        let (store, _dir) = create_test_store();

        store
            .insert_interactions(InteractionKind::Like, &[like(1, 10)])
            .unwrap();

        assert_eq!(store.interaction_count(InteractionKind::Collect, key(1, 10)).unwrap(), 0);
        assert!(store
            .subjects_for_actor(InteractionKind::Collect, UserId::new(10))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn upsert_is_idempotent() {
        let (store, _dir) = create_test_store();

        store
            .insert_interactions(InteractionKind::Like, &[like(3, 4)])
            .unwrap();
        store
            .insert_interactions(InteractionKind::Like, &[like(3, 4)])
            .unwrap();

        assert_eq!(store.count_for_subject(InteractionKind::Like, SubjectId::new(3)).unwrap(), 1);
    }

    #[test]
    fn upsert_keeps_first_timestamp() {
        let (store, _dir) = create_test_store();
        let first = chrono::Utc::now() - chrono::Duration::days(2);

        let mut original = like(3, 4);
        original.created_at = first;
        store
            .insert_interactions(InteractionKind::Like, &[original])
            .unwrap();
        store
            .insert_interactions(InteractionKind::Like, &[like(3, 4), like(3, 5)])
            .unwrap();

        let row = store
            .get_interaction(InteractionKind::Like, key(3, 4))
            .unwrap()
            .unwrap();
        assert_eq!(row.created_at, first);
        assert_eq!(store.count_for_subject(InteractionKind::Like, SubjectId::new(3)).unwrap(), 2);
    }

    #[test]
    fn delete_removes_row_and_index() {
        let (store, _dir) = create_test_store();

        store
            .insert_interactions(InteractionKind::Like, &[like(1, 10), like(2, 10)])
            .unwrap();
        store
            .delete_interactions(InteractionKind::Like, &[key(1, 10), key(9, 9)])
            .unwrap();

        assert_eq!(store.interaction_count(InteractionKind::Like, key(1, 10)).unwrap(), 0);
        assert_eq!(
            store
                .subjects_for_actor(InteractionKind::Like, UserId::new(10))
                .unwrap(),
            vec![SubjectId::new(2)]
        );
    }

    #[test]
    fn subjects_for_actor_in_order() {
        let (store, _dir) = create_test_store();
        let collect = |subject| Interaction::new(InteractionKind::Collect, key(subject, 5));

        store
            .insert_interactions(
                InteractionKind::Collect,
                &[collect(300), collect(2), collect(40)],
            )
            .unwrap();
        // Neighbouring actor must not leak into the prefix scan.
        store
            .insert_interactions(
                InteractionKind::Collect,
                &[Interaction::new(InteractionKind::Collect, key(1, 6))],
            )
            .unwrap();

        assert_eq!(
            store
                .subjects_for_actor(InteractionKind::Collect, UserId::new(5))
                .unwrap(),
            vec![SubjectId::new(2), SubjectId::new(40), SubjectId::new(300)]
        );
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            store
                .insert_interactions(InteractionKind::Like, &[like(8, 8)])
                .unwrap();
        }

        let store = RocksStore::open(dir.path()).unwrap();
        assert_eq!(store.interaction_count(InteractionKind::Like, key(8, 8)).unwrap(), 1);
    }
}
