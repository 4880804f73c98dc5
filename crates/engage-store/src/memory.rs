//! In-process fast store.
//!
//! `MemoryFastStore` mirrors the Redis semantics the engine relies on: bitmaps
//! use Redis bit ordering, string TTLs expire lazily on read, and every method
//! runs under a single lock so each call is atomic. Expiry is measured with the
//! tokio clock, which lets tests drive it with `tokio::time::pause`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{Result, StoreError};
use crate::FastStore;

#[derive(Default)]
struct State {
    strings: HashMap<String, (String, Option<Instant>)>,
    hashes: HashMap<String, HashMap<String, String>>,
    bitmaps: HashMap<String, Vec<u8>>,
    zsets: HashMap<String, HashMap<String, f64>>,
}

/// Fast store kept entirely in process memory.
#[derive(Default)]
pub struct MemoryFastStore {
    state: Mutex<State>,
}

impl MemoryFastStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

fn bit_position(offset: u32) -> (usize, u8) {
    ((offset / 8) as usize, 0x80 >> (offset % 8))
}

fn read_bit(bytes: &[u8], offset: u32) -> bool {
    let (index, mask) = bit_position(offset);
    bytes.get(index).is_some_and(|byte| byte & mask != 0)
}

#[async_trait]
impl FastStore for MemoryFastStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.state()?;
        let expired = match state.strings.get(key) {
            None => return Ok(None),
            Some((_, Some(deadline))) => Instant::now() >= *deadline,
            Some((_, None)) => false,
        };
        if expired {
            state.strings.remove(key);
            return Ok(None);
        }
        Ok(state.strings.get(key).map(|(value, _)| value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let deadline = Instant::now() + ttl;
        self.state()?
            .strings
            .insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(())
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.state()?
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_put_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let mut state = self.state()?;
        let hash = state.hashes.entry(key.to_string()).or_default();
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self
            .state()?
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned())
    }

    async fn hash_len(&self, key: &str) -> Result<u64> {
        Ok(self
            .state()?
            .hashes
            .get(key)
            .map_or(0, |hash| hash.len() as u64))
    }

    async fn hash_take_all(&self, key: &str) -> Result<HashMap<String, String>> {
        Ok(self.state()?.hashes.remove(key).unwrap_or_default())
    }

    async fn bit_set(&self, key: &str, offset: u32, value: bool) -> Result<bool> {
        let mut state = self.state()?;
        let bytes = state.bitmaps.entry(key.to_string()).or_default();
        let (index, mask) = bit_position(offset);
        if bytes.len() <= index {
            bytes.resize(index + 1, 0);
        }
        let previous = bytes[index] & mask != 0;
        if value {
            bytes[index] |= mask;
        } else {
            bytes[index] &= !mask;
        }
        Ok(previous)
    }

    async fn bit_get(&self, key: &str, offset: u32) -> Result<bool> {
        Ok(self
            .state()?
            .bitmaps
            .get(key)
            .is_some_and(|bytes| read_bit(bytes, offset)))
    }

    async fn bit_count(&self, key: &str) -> Result<u64> {
        Ok(self.state()?.bitmaps.get(key).map_or(0, |bytes| {
            bytes.iter().map(|byte| u64::from(byte.count_ones())).sum()
        }))
    }

    async fn bitfield_get_unsigned(&self, key: &str, width: u32) -> Result<u64> {
        if width == 0 || width > 63 {
            return Err(StoreError::Unavailable(format!(
                "invalid bitfield width: u{width}"
            )));
        }
        let state = self.state()?;
        let Some(bytes) = state.bitmaps.get(key) else {
            return Ok(0);
        };
        Ok((0..width).fold(0u64, |acc, offset| {
            (acc << 1) | u64::from(read_bit(bytes, offset))
        }))
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<bool> {
        let previous = self
            .state()?
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(previous.is_none())
    }

    async fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        Ok(self
            .state()?
            .zsets
            .get(key)
            .and_then(|set| set.get(member))
            .copied())
    }

    async fn zset_card(&self, key: &str) -> Result<u64> {
        Ok(self
            .state()?
            .zsets
            .get(key)
            .map_or(0, |set| set.len() as u64))
    }

    async fn zset_remove_below(&self, key: &str, max: f64) -> Result<u64> {
        let mut state = self.state()?;
        let Some(set) = state.zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|_, score| *score >= max);
        Ok((before - set.len()) as u64)
    }
}
