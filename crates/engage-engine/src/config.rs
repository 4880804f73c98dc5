//! Engine configuration.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Engine configuration loaded from an optional JSON file and environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the `RocksDB` data directory (default: "/data/engage").
    pub data_dir: String,

    /// Redis URL. When unset the in-process fast store is used.
    pub redis_url: Option<String>,

    /// Prefix for every fast-store key (default: "engage").
    pub key_prefix: String,

    /// Delay between the first buffered toggle of a kind and its flush (default: 3s).
    pub quiet_window: Duration,

    /// Number of background flush workers (default: 2).
    pub flush_workers: usize,

    /// Durable write attempts per flush before re-queueing (default: 3).
    pub flush_max_attempts: u32,

    /// Backoff before the second attempt; doubles each retry (default: 200ms).
    pub flush_initial_backoff: Duration,

    /// Upper bound on the retry backoff (default: 5s).
    pub flush_max_backoff: Duration,

    /// Delay before re-flushing entries re-queued after a failed flush (default: 30s).
    pub requeue_delay: Duration,

    /// Lifetime of a cached streak (default: 24h).
    pub streak_cache_ttl: Duration,

    /// Users not seen for this long are swept by the presence sweeper (default: 10min).
    pub presence_threshold: Duration,

    /// Period of the presence sweeper run by the daemon; disabled when unset.
    pub sweep_interval: Option<Duration>,

    /// How long shutdown waits for buffered toggles to flush (default: 30s).
    pub drain_timeout: Duration,
}

/// Optional JSON config file. Every field falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<String>,
    redis_url: Option<String>,
    key_prefix: Option<String>,
    quiet_window_ms: Option<u64>,
    flush_workers: Option<usize>,
    flush_max_attempts: Option<u32>,
    flush_initial_backoff_ms: Option<u64>,
    flush_max_backoff_ms: Option<u64>,
    requeue_delay_ms: Option<u64>,
    streak_cache_ttl_secs: Option<u64>,
    presence_threshold_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    drain_timeout_secs: Option<u64>,
}

impl ConfigFile {
    fn apply(self, config: &mut EngineConfig) {
        if let Some(v) = self.data_dir {
            config.data_dir = v;
        }
        if self.redis_url.is_some() {
            config.redis_url = self.redis_url;
        }
        if let Some(v) = self.key_prefix {
            config.key_prefix = v;
        }
        if let Some(v) = self.quiet_window_ms {
            config.quiet_window = Duration::from_millis(v);
        }
        if let Some(v) = self.flush_workers {
            config.flush_workers = v;
        }
        if let Some(v) = self.flush_max_attempts {
            config.flush_max_attempts = v;
        }
        if let Some(v) = self.flush_initial_backoff_ms {
            config.flush_initial_backoff = Duration::from_millis(v);
        }
        if let Some(v) = self.flush_max_backoff_ms {
            config.flush_max_backoff = Duration::from_millis(v);
        }
        if let Some(v) = self.requeue_delay_ms {
            config.requeue_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.streak_cache_ttl_secs {
            config.streak_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = self.presence_threshold_secs {
            config.presence_threshold = Duration::from_secs(v);
        }
        if let Some(v) = self.sweep_interval_secs {
            config.sweep_interval = Some(Duration::from_secs(v));
        }
        if let Some(v) = self.drain_timeout_secs {
            config.drain_timeout = Duration::from_secs(v);
        }
    }
}

impl EngineConfig {
    /// Load configuration.
    ///
    /// Starts from the defaults, applies the JSON file named by
    /// `ENGAGE_CONFIG_FILE` if set, then applies `ENGAGE_*` environment
    /// variables. Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ENGAGE_CONFIG_FILE") {
            match load_config_file(&path) {
                Ok(file) => {
                    tracing::info!(path = %path, "Loaded config file");
                    file.apply(&mut config);
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "Ignoring config file"),
            }
        }

        if let Ok(v) = std::env::var("ENGAGE_DATA_DIR") {
            config.data_dir = v;
        }
        if let Ok(v) = std::env::var("ENGAGE_REDIS_URL") {
            config.redis_url = Some(v).filter(|url| !url.is_empty());
        }
        if let Ok(v) = std::env::var("ENGAGE_KEY_PREFIX") {
            config.key_prefix = v;
        }
        if let Some(v) = env_parse("ENGAGE_QUIET_WINDOW_MS") {
            config.quiet_window = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("ENGAGE_FLUSH_WORKERS") {
            config.flush_workers = v;
        }
        if let Some(v) = env_parse("ENGAGE_FLUSH_MAX_ATTEMPTS") {
            config.flush_max_attempts = v;
        }
        if let Some(v) = env_parse("ENGAGE_FLUSH_BACKOFF_MS") {
            config.flush_initial_backoff = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("ENGAGE_FLUSH_MAX_BACKOFF_MS") {
            config.flush_max_backoff = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("ENGAGE_REQUEUE_DELAY_MS") {
            config.requeue_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("ENGAGE_STREAK_TTL_SECS") {
            config.streak_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("ENGAGE_PRESENCE_THRESHOLD_SECS") {
            config.presence_threshold = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("ENGAGE_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = Some(Duration::from_secs(v)).filter(|d| !d.is_zero());
        }
        if let Some(v) = env_parse("ENGAGE_DRAIN_TIMEOUT_SECS") {
            config.drain_timeout = Duration::from_secs(v);
        }

        config
    }

    /// Check values that would make the engine misbehave.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.flush_workers == 0 {
            return Err(EngineError::Config("flush_workers must be at least 1".into()));
        }
        if self.flush_max_attempts == 0 {
            return Err(EngineError::Config(
                "flush_max_attempts must be at least 1".into(),
            ));
        }
        if self.flush_max_backoff < self.flush_initial_backoff {
            return Err(EngineError::Config(
                "flush_max_backoff must not be below flush_initial_backoff".into(),
            ));
        }
        if self.key_prefix.is_empty() {
            return Err(EngineError::Config("key_prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the quiet window.
    #[must_use]
    pub fn with_quiet_window(mut self, window: Duration) -> Self {
        self.quiet_window = window;
        self
    }

    /// Set the retry policy of the flush path.
    #[must_use]
    pub fn with_retry_policy(
        mut self,
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        self.flush_max_attempts = max_attempts;
        self.flush_initial_backoff = initial_backoff;
        self.flush_max_backoff = max_backoff;
        self
    }

    /// Set the re-queue delay.
    #[must_use]
    pub fn with_requeue_delay(mut self, delay: Duration) -> Self {
        self.requeue_delay = delay;
        self
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(variable = %name, value = %raw, "Ignoring unparseable setting");
    }
    parsed
}

/// Load a config file from JSON.
fn load_config_file(path: &str) -> std::result::Result<ConfigFile, std::io::Error> {
    let path = Path::new(path);
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/engage".into(),
            redis_url: None,
            key_prefix: "engage".into(),
            quiet_window: Duration::from_secs(3),
            flush_workers: 2,
            flush_max_attempts: 3,
            flush_initial_backoff: Duration::from_millis(200),
            flush_max_backoff: Duration::from_secs(5),
            requeue_delay: Duration::from_secs(30),
            streak_cache_ttl: Duration::from_secs(24 * 60 * 60),
            presence_threshold: Duration::from_secs(10 * 60),
            sweep_interval: None,
            drain_timeout: Duration::from_secs(30),
        }
    }
}
