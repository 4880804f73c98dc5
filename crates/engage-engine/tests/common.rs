//! Common test utilities for engine integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use engage_core::{Interaction, InteractionKey, InteractionKind, SubjectId, UserId};
use engage_engine::{Engine, EngineConfig};
use engage_store::{FastStore, InteractionStore, MemoryFastStore, RocksStore, StoreError};

/// Test harness with a controllable in-memory fast store and a fresh `RocksDB`.
pub struct Harness {
    /// The engine under test.
    pub engine: Engine,
    /// The fast store shared by every component.
    pub fast: Arc<ControlledFastStore>,
    /// The durable store behind the interaction buffer.
    pub durable: Arc<dyn InteractionStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl Harness {
    /// Engine with the test config and a healthy durable store.
    pub fn new() -> Self {
        Self::build(|store| Arc::new(store))
    }

    /// Engine whose durable store fails its first `failures` inserts.
    pub fn flaky(failures: u32) -> Self {
        Self::build(|store| Arc::new(FlakyStore::new(store, failures, 0)))
    }

    /// Engine whose durable store fails its first `failures` deletes.
    pub fn flaky_deletes(failures: u32) -> Self {
        Self::build(|store| Arc::new(FlakyStore::new(store, 0, failures)))
    }

    /// Engine whose fast store is down from the start.
    pub fn unreachable() -> Self {
        let harness = Self::new();
        harness.fast.set_down(true);
        harness
    }

    fn build(durable: impl FnOnce(RocksStore) -> Arc<dyn InteractionStore>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");
        let durable = durable(store);
        let fast = Arc::new(ControlledFastStore::new());
        let engine = Engine::new(
            Arc::clone(&fast) as Arc<dyn FastStore>,
            Arc::clone(&durable),
            test_config(),
        );
        Self {
            engine,
            fast,
            durable,
            _temp_dir: temp_dir,
        }
    }

    /// A second engine over the same stores, as after a process restart.
    pub fn restarted(&self) -> Engine {
        Engine::new(
            Arc::clone(&self.fast) as Arc<dyn FastStore>,
            Arc::clone(&self.durable),
            self.engine.config.clone(),
        )
    }

    /// Durable row count for a subject.
    pub fn durable_count(&self, kind: InteractionKind, subject: u64) -> u64 {
        self.durable
            .count_for_subject(kind, SubjectId::new(subject))
            .expect("durable count")
    }

    /// Whether the durable store holds the `(subject, actor)` row.
    pub fn durable_has(&self, kind: InteractionKind, subject: u64, actor: u64) -> bool {
        let key = InteractionKey::new(SubjectId::new(subject), UserId::new(actor));
        self.durable.interaction_count(kind, key).expect("durable lookup") > 0
    }
}

/// 3s quiet window, three attempts with 100ms/200ms backoff, 5s re-queue delay.
pub fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_key_prefix("test")
        .with_quiet_window(Duration::from_secs(3))
        .with_retry_policy(3, Duration::from_millis(100), Duration::from_secs(1))
        .with_requeue_delay(Duration::from_secs(5))
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, second)
        .single()
        .expect("valid time")
}

pub fn subject(id: u64) -> SubjectId {
    SubjectId::new(id)
}

pub fn user(id: u64) -> UserId {
    UserId::new(id)
}

// ============================================================================
// Test doubles
// ============================================================================

/// Durable store that fails a fixed number of inserts and deletes before
/// delegating.
pub struct FlakyStore {
    inner: RocksStore,
    insert_failures: AtomicU32,
    delete_failures: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: RocksStore, insert_failures: u32, delete_failures: u32) -> Self {
        Self {
            inner,
            insert_failures: AtomicU32::new(insert_failures),
            delete_failures: AtomicU32::new(delete_failures),
        }
    }
}

fn consume_failure(left: &AtomicU32) -> engage_store::Result<()> {
    let failed = left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failed {
        return Err(StoreError::Database("injected write failure".into()));
    }
    Ok(())
}

impl InteractionStore for FlakyStore {
    fn insert_interactions(
        &self,
        kind: InteractionKind,
        rows: &[Interaction],
    ) -> engage_store::Result<()> {
        consume_failure(&self.insert_failures)?;
        self.inner.insert_interactions(kind, rows)
    }

    fn delete_interactions(
        &self,
        kind: InteractionKind,
        keys: &[InteractionKey],
    ) -> engage_store::Result<()> {
        consume_failure(&self.delete_failures)?;
        self.inner.delete_interactions(kind, keys)
    }

    fn interaction_count(
        &self,
        kind: InteractionKind,
        key: InteractionKey,
    ) -> engage_store::Result<u64> {
        self.inner.interaction_count(kind, key)
    }

    fn count_for_subject(
        &self,
        kind: InteractionKind,
        subject_id: SubjectId,
    ) -> engage_store::Result<u64> {
        self.inner.count_for_subject(kind, subject_id)
    }

    fn subjects_for_actor(
        &self,
        kind: InteractionKind,
        actor_id: UserId,
    ) -> engage_store::Result<Vec<SubjectId>> {
        self.inner.subjects_for_actor(kind, actor_id)
    }
}

/// In-memory fast store that can be taken down, and can stall the next
/// bitfield read after it has read its value.
#[derive(Default)]
pub struct ControlledFastStore {
    inner: MemoryFastStore,
    down: AtomicBool,
    bitfield_lag: Mutex<Option<Duration>>,
}

impl ControlledFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail (`true`) or delegate again (`false`).
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Delay the result of the next bitfield read by `lag`.
    pub fn lag_next_bitfield(&self, lag: Duration) {
        *self.bitfield_lag.lock().unwrap() = Some(lag);
    }

    fn check(&self) -> engage_store::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FastStore for ControlledFastStore {
    async fn get(&self, key: &str) -> engage_store::Result<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> engage_store::Result<()> {
        self.check()?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> engage_store::Result<()> {
        self.check()?;
        self.inner.hash_put(key, field, value).await
    }

    async fn hash_put_if_absent(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> engage_store::Result<bool> {
        self.check()?;
        self.inner.hash_put_if_absent(key, field, value).await
    }

    async fn hash_get(&self, key: &str, field: &str) -> engage_store::Result<Option<String>> {
        self.check()?;
        self.inner.hash_get(key, field).await
    }

    async fn hash_len(&self, key: &str) -> engage_store::Result<u64> {
        self.check()?;
        self.inner.hash_len(key).await
    }

    async fn hash_take_all(&self, key: &str) -> engage_store::Result<HashMap<String, String>> {
        self.check()?;
        self.inner.hash_take_all(key).await
    }

    async fn bit_set(&self, key: &str, offset: u32, value: bool) -> engage_store::Result<bool> {
        self.check()?;
        self.inner.bit_set(key, offset, value).await
    }

    async fn bit_get(&self, key: &str, offset: u32) -> engage_store::Result<bool> {
        self.check()?;
        self.inner.bit_get(key, offset).await
    }

    async fn bit_count(&self, key: &str) -> engage_store::Result<u64> {
        self.check()?;
        self.inner.bit_count(key).await
    }

    async fn bitfield_get_unsigned(&self, key: &str, width: u32) -> engage_store::Result<u64> {
        self.check()?;
        let value = self.inner.bitfield_get_unsigned(key, width).await?;
        let lag = self.bitfield_lag.lock().unwrap().take();
        if let Some(lag) = lag {
            tokio::time::sleep(lag).await;
        }
        Ok(value)
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> engage_store::Result<bool> {
        self.check()?;
        self.inner.zset_add(key, member, score).await
    }

    async fn zset_score(&self, key: &str, member: &str) -> engage_store::Result<Option<f64>> {
        self.check()?;
        self.inner.zset_score(key, member).await
    }

    async fn zset_card(&self, key: &str) -> engage_store::Result<u64> {
        self.check()?;
        self.inner.zset_card(key).await
    }

    async fn zset_remove_below(&self, key: &str, max: f64) -> engage_store::Result<u64> {
        self.check()?;
        self.inner.zset_remove_below(key, max).await
    }
}
