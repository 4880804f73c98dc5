//! Write-back buffer for boolean interactions (likes, collects).
//!
//! A toggle only writes the desired state into a per-kind hash in the fast
//! store (`subject:actor -> "true" | "false"`), so repeated toggles of the same
//! pair overwrite each other. The first toggle of a kind arms a deferred flush;
//! until that flush finishes no further flush is armed for the kind. The flush
//! takes the whole hash atomically and applies it to the durable store as one
//! batched upsert plus one batched delete.
//!
//! # Failure handling
//!
//! Durable writes are retried with exponential backoff. Entries that still
//! fail are put back into the pending hash unless a newer toggle for the same
//! pair has arrived since, and the kind is re-armed after `requeue_delay`.
//! Entries that cannot even be re-queued stay in the in-flight snapshot and
//! are retried by the next flush of the kind.
//!
//! # Locking
//!
//! Each kind has its own `armed` lock, held by `toggle` around the hash write
//! and by the flush completion around the re-arm decision, so a toggle landing
//! while a flush is finishing is never left without a flush. The in-flight
//! snapshot lock is held by the flush across the atomic take and by readers
//! across the pending lookup, so a reader cannot observe the gap between the
//! two.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};

use engage_core::{
    decode_state, encode_state, Interaction, InteractionKey, InteractionKind, InteractionRecord,
    SubjectId, UserId,
};
use engage_store::{FastStore, InteractionStore};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::keys::KeySpace;
use crate::scheduler::FlushQueue;
use crate::stats::{FlushStats, FlushStatsSnapshot};

#[derive(Debug, Clone)]
struct FlushPolicy {
    quiet_window: Duration,
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    requeue_delay: Duration,
}

impl From<&EngineConfig> for FlushPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            quiet_window: config.quiet_window,
            max_attempts: config.flush_max_attempts.max(1),
            initial_backoff: config.flush_initial_backoff,
            max_backoff: config.flush_max_backoff,
            requeue_delay: config.requeue_delay,
        }
    }
}

#[derive(Default)]
struct KindSlot {
    /// Whether a flush is scheduled or running for this kind.
    armed: Mutex<bool>,
    /// Entries taken from the pending hash whose durable write is not done.
    in_flight: RwLock<HashMap<InteractionKey, bool>>,
}

struct Inner {
    fast: Arc<dyn FastStore>,
    durable: Arc<dyn InteractionStore>,
    keys: KeySpace,
    policy: FlushPolicy,
    slots: BTreeMap<InteractionKind, KindSlot>,
    queue: FlushQueue,
    stats: FlushStats,
    idle: Notify,
}

/// Result of one flush run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FlushReport {
    written: usize,
    removed: usize,
}

/// Coalescing write-back buffer for interaction toggles.
///
/// Cloning is cheap and shares the same buffer.
#[derive(Clone)]
pub struct InteractionBuffer {
    inner: Arc<Inner>,
}

impl InteractionBuffer {
    /// Create a buffer and start its flush workers.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(
        fast: Arc<dyn FastStore>,
        durable: Arc<dyn InteractionStore>,
        config: &EngineConfig,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let handle = weak.clone();
            let queue = FlushQueue::start(config.flush_workers, move |kind| {
                let handle = handle.clone();
                async move {
                    if let Some(inner) = handle.upgrade() {
                        inner.run_flush(kind).await;
                    }
                }
            });

            Inner {
                fast,
                durable,
                keys: KeySpace::new(config.key_prefix.clone()),
                policy: FlushPolicy::from(config),
                slots: InteractionKind::ALL
                    .into_iter()
                    .map(|kind| (kind, KindSlot::default()))
                    .collect(),
                queue,
                stats: FlushStats::default(),
                idle: Notify::new(),
            }
        });

        Self { inner }
    }

    /// Record the desired state of `(subject, actor)` for `kind`.
    ///
    /// Overwrites any pending state for the pair and arms a deferred flush if
    /// none is armed. Returns as soon as the fast store has the value.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store write fails.
    pub async fn toggle(
        &self,
        kind: InteractionKind,
        subject_id: SubjectId,
        actor_id: UserId,
        desired: bool,
    ) -> Result<()> {
        let key = InteractionKey::new(subject_id, actor_id);
        let record = InteractionRecord::new(kind, key, desired);
        let slot = self.inner.slot(kind);

        let mut armed = slot.armed.lock().await;
        self.inner
            .fast
            .hash_put(
                &self.inner.keys.interactions(kind),
                &record.key.to_field(),
                record.encoded_state(),
            )
            .await
            .map_err(EngineError::unavailable)?;

        if !*armed {
            *armed = true;
            self.inner.arm(kind, self.inner.policy.quiet_window);
        }

        tracing::debug!(kind = %kind, key = %record.key, desired, "Buffered interaction");
        Ok(())
    }

    /// Whether `actor` currently has a `kind` interaction with `subject`.
    ///
    /// Pending toggles win over rows being flushed, which win over the
    /// durable store, so a toggle is visible to reads immediately.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store cannot be
    /// read, or `EngineError::Storage` if the durable fallback fails.
    pub async fn has_interaction(
        &self,
        kind: InteractionKind,
        subject_id: SubjectId,
        actor_id: UserId,
    ) -> Result<bool> {
        let key = InteractionKey::new(subject_id, actor_id);
        let slot = self.inner.slot(kind);

        {
            let in_flight = slot.in_flight.read().await;
            let pending = self
                .inner
                .fast
                .hash_get(&self.inner.keys.interactions(kind), &key.to_field())
                .await
                .map_err(EngineError::unavailable)?;

            if let Some(value) = pending {
                return Ok(decode_state(&value));
            }
            if let Some(&desired) = in_flight.get(&key) {
                return Ok(desired);
            }
        }

        Ok(self.inner.durable.interaction_count(kind, key)? > 0)
    }

    /// Durable number of `kind` interactions on a subject.
    ///
    /// Toggles still buffered are not counted.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Storage` if the durable store fails.
    pub fn interaction_count(&self, kind: InteractionKind, subject_id: SubjectId) -> Result<u64> {
        Ok(self.inner.durable.count_for_subject(kind, subject_id)?)
    }

    /// Subjects `actor` has a durable `kind` interaction with.
    ///
    /// Toggles still buffered are not included.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Storage` if the durable store fails.
    pub fn subjects_for_actor(
        &self,
        kind: InteractionKind,
        actor_id: UserId,
    ) -> Result<Vec<SubjectId>> {
        Ok(self.inner.durable.subjects_for_actor(kind, actor_id)?)
    }

    /// Arm a flush for every kind with toggles left in the fast store, e.g.
    /// by a process that stopped before flushing. Returns the kinds armed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store cannot be read.
    pub async fn recover(&self) -> Result<Vec<InteractionKind>> {
        let mut recovered = Vec::new();

        for kind in InteractionKind::ALL {
            let mut armed = self.inner.slot(kind).armed.lock().await;
            if *armed {
                continue;
            }
            let pending = self.inner.pending_len(kind).await?;
            if pending > 0 {
                tracing::info!(kind = %kind, pending, "Recovering buffered interactions");
                *armed = true;
                self.inner.arm(kind, self.inner.policy.quiet_window);
                recovered.push(kind);
            }
        }

        Ok(recovered)
    }

    /// Flush everything that is buffered and wait until every kind is idle.
    ///
    /// Kinds with a flush already armed are waited for, not flushed twice.
    /// If the durable store keeps failing this keeps waiting; callers bound
    /// it with a timeout.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store cannot be read.
    pub async fn drain(&self) -> Result<()> {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let mut busy = false;
            for kind in InteractionKind::ALL {
                let slot = self.inner.slot(kind);
                let mut armed = slot.armed.lock().await;
                if *armed {
                    busy = true;
                    continue;
                }
                let leftovers = slot.in_flight.read().await.len() as u64;
                if self.inner.pending_len(kind).await? + leftovers > 0 {
                    *armed = true;
                    self.inner.arm(kind, Duration::ZERO);
                    busy = true;
                }
            }

            if !busy {
                tracing::debug!("Interaction buffer drained");
                return Ok(());
            }
            notified.await;
        }
    }

    /// Current flush counters.
    #[must_use]
    pub fn stats(&self) -> FlushStatsSnapshot {
        self.inner.stats.snapshot()
    }
}

impl Inner {
    fn slot(&self, kind: InteractionKind) -> &KindSlot {
        &self.slots[&kind]
    }

    /// Start the deferred flush timer. Caller holds the kind's `armed` lock
    /// and has set it.
    fn arm(&self, kind: InteractionKind, delay: Duration) {
        FlushStats::add(&self.stats.armed, 1);
        tracing::debug!(kind = %kind, delay_ms = delay.as_millis(), "Armed flush");
        self.queue.schedule(kind, delay);
    }

    async fn pending_len(&self, kind: InteractionKind) -> Result<u64> {
        self.fast
            .hash_len(&self.keys.interactions(kind))
            .await
            .map_err(EngineError::unavailable)
    }

    /// Worker entry point: flush, then decide whether the kind stays armed.
    async fn run_flush(&self, kind: InteractionKind) {
        let failed = match self.flush(kind).await {
            Ok(report) => {
                if report != FlushReport::default() {
                    tracing::info!(
                        kind = %kind,
                        written = report.written,
                        removed = report.removed,
                        "Flushed interactions"
                    );
                }
                false
            }
            Err(e) => {
                let counter = match e {
                    EngineError::DurablePersistFailed { .. } => &self.stats.failed,
                    _ => &self.stats.aborted,
                };
                FlushStats::add(counter, 1);
                tracing::error!(kind = %kind, error = %e, "Interaction flush failed");
                true
            }
        };

        let slot = self.slot(kind);
        let mut armed = slot.armed.lock().await;
        let leftovers = slot.in_flight.read().await.len() as u64;
        let pending = match self.pending_len(kind).await {
            Ok(pending) => pending + leftovers,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Cannot check pending interactions");
                1
            }
        };

        if pending > 0 {
            let delay = if failed || leftovers > 0 {
                self.policy.requeue_delay
            } else {
                self.policy.quiet_window
            };
            self.arm(kind, delay);
        } else {
            *armed = false;
        }
        drop(armed);

        FlushStats::add(&self.stats.completed, 1);
        self.idle.notify_waiters();
    }

    /// Take the pending hash and write it to the durable store.
    async fn flush(&self, kind: InteractionKind) -> Result<FlushReport> {
        let hash_key = self.keys.interactions(kind);
        let slot = self.slot(kind);

        let batch = {
            let mut in_flight = slot.in_flight.write().await;
            let taken = self
                .fast
                .hash_take_all(&hash_key)
                .await
                .map_err(EngineError::unavailable)?;

            // Leftovers from a previous run are older than anything just taken.
            for (field, value) in &taken {
                match InteractionRecord::from_entry(kind, field, value) {
                    Ok(record) => {
                        in_flight.insert(record.key, record.desired);
                    }
                    Err(e) => {
                        tracing::warn!(
                            kind = %kind,
                            field = %field,
                            error = %e,
                            "Dropping malformed pending entry"
                        );
                    }
                }
            }
            in_flight.clone()
        };

        if batch.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut adds: Vec<Interaction> = Vec::new();
        let mut removes: Vec<InteractionKey> = Vec::new();
        for (&key, &desired) in &batch {
            if desired {
                adds.push(Interaction::new(kind, key));
            } else {
                removes.push(key);
            }
        }

        let result = self.persist(kind, adds, removes).await;
        match result {
            Ok(report) => {
                slot.in_flight.write().await.clear();
                Ok(report)
            }
            Err(failure) => {
                self.requeue(kind, &hash_key).await;
                Err(failure)
            }
        }
    }

    /// Apply the batch with bounded retries.
    async fn persist(
        &self,
        kind: InteractionKind,
        adds: Vec<Interaction>,
        removes: Vec<InteractionKey>,
    ) -> Result<FlushReport> {
        let report = FlushReport {
            written: adds.len(),
            removed: removes.len(),
        };
        let mut adds = Some(adds).filter(|rows| !rows.is_empty());
        let mut removes = Some(removes).filter(|keys| !keys.is_empty());
        let mut backoff = self.policy.initial_backoff;
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            if let Some(rows) = &adds {
                match self.durable.insert_interactions(kind, rows) {
                    Ok(()) => {
                        FlushStats::add(&self.stats.rows_written, rows.len());
                        adds = None;
                    }
                    Err(e) => last_error = e.to_string(),
                }
            }
            if let Some(keys) = &removes {
                match self.durable.delete_interactions(kind, keys) {
                    Ok(()) => {
                        FlushStats::add(&self.stats.rows_removed, keys.len());
                        removes = None;
                    }
                    Err(e) => last_error = e.to_string(),
                }
            }

            if adds.is_none() && removes.is_none() {
                return Ok(report);
            }

            if attempt < self.policy.max_attempts {
                tracing::warn!(
                    kind = %kind,
                    attempt,
                    backoff_ms = backoff.as_millis(),
                    error = %last_error,
                    "Durable write failed, retrying"
                );
                FlushStats::add(&self.stats.retries, 1);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.policy.max_backoff);
            }
        }

        // Whatever succeeded is out of the batch; only the rest goes back.
        let slot = self.slot(kind);
        let mut in_flight = slot.in_flight.write().await;
        if adds.is_none() {
            in_flight.retain(|_, desired| !*desired);
        }
        if removes.is_none() {
            in_flight.retain(|_, desired| *desired);
        }

        Err(EngineError::DurablePersistFailed {
            kind,
            attempts: self.policy.max_attempts,
            message: last_error,
        })
    }

    /// Put in-flight entries back into the pending hash. A newer toggle for the
    /// same pair takes precedence. Entries that cannot be written back stay
    /// in flight for the next run.
    async fn requeue(&self, kind: InteractionKind, hash_key: &str) {
        let slot = self.slot(kind);
        let mut in_flight = slot.in_flight.write().await;
        let mut requeued = 0usize;

        let entries: Vec<(InteractionKey, bool)> =
            in_flight.iter().map(|(&key, &desired)| (key, desired)).collect();
        for (key, desired) in entries {
            match self
                .fast
                .hash_put_if_absent(hash_key, &key.to_field(), encode_state(desired))
                .await
            {
                Ok(inserted) => {
                    in_flight.remove(&key);
                    if inserted {
                        requeued += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        kind = %kind,
                        remaining = in_flight.len(),
                        error = %e,
                        "Cannot re-queue interactions, keeping them in flight"
                    );
                    break;
                }
            }
        }

        FlushStats::add(&self.stats.requeued, requeued);
        tracing::warn!(kind = %kind, requeued, "Re-queued unwritten interactions");
    }
}
