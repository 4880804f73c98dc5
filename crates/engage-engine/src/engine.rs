//! Engine wiring.

use std::sync::Arc;

use engage_store::{FastStore, InteractionStore, MemoryFastStore, RedisFastStore, RocksStore};

use crate::attendance::AttendanceTracker;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::interaction::InteractionBuffer;
use crate::presence::PresenceTracker;

/// The three components sharing one fast store.
#[derive(Clone)]
pub struct Engine {
    /// Buffered likes and collects.
    pub interactions: InteractionBuffer,

    /// Daily check-ins.
    pub attendance: AttendanceTracker,

    /// Online presence.
    pub presence: PresenceTracker,

    /// Engine configuration.
    pub config: EngineConfig,
}

impl Engine {
    /// Build an engine over existing stores.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(
        fast: Arc<dyn FastStore>,
        durable: Arc<dyn InteractionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            interactions: InteractionBuffer::new(Arc::clone(&fast), durable, &config),
            attendance: AttendanceTracker::new(Arc::clone(&fast), &config),
            presence: PresenceTracker::new(fast, &config),
            config,
        }
    }

    /// Open the durable store at `config.data_dir` and connect the fast store.
    ///
    /// Without a Redis URL the in-process fast store is used, so buffered
    /// state does not survive a restart.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Storage` if `RocksDB` cannot be opened, or
    /// `EngineError::StoreUnavailable` if Redis cannot be reached.
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        tracing::info!(path = %config.data_dir, "Opening RocksDB store");
        let durable: Arc<dyn InteractionStore> = Arc::new(RocksStore::open(&config.data_dir)?);

        let fast: Arc<dyn FastStore> = match &config.redis_url {
            Some(url) => Arc::new(
                RedisFastStore::connect(url)
                    .await
                    .map_err(EngineError::unavailable)?,
            ),
            None => {
                tracing::warn!("Redis not configured - using in-memory fast store");
                Arc::new(MemoryFastStore::new())
            }
        };

        Ok(Self::new(fast, durable, config))
    }

    /// Re-arm flushes for toggles buffered before a restart.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store cannot be read.
    pub async fn recover(&self) -> Result<()> {
        let kinds = self.interactions.recover().await?;
        if !kinds.is_empty() {
            tracing::info!(kinds = ?kinds, "Recovered buffered interactions");
        }
        Ok(())
    }

    /// Flush every buffered toggle. Bound it with a timeout: a durable store
    /// that keeps failing keeps this waiting.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StoreUnavailable` if the fast store cannot be read.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Draining interaction buffer");
        self.interactions.drain().await?;
        let stats = self.interactions.stats();
        tracing::info!(
            flushes = stats.completed,
            failed = stats.failed,
            aborted = stats.aborted,
            rows_written = stats.rows_written,
            rows_removed = stats.rows_removed,
            "Interaction buffer drained"
        );
        Ok(())
    }
}
