//! Redis-backed fast store.
//!
//! One `ConnectionManager` is shared by all callers; it is cheap to clone and
//! reconnects on its own. Each trait method issues one Redis command, except
//! `hash_take_all`, which is a `MULTI`/`EXEC` pipeline of `HGETALL` and `DEL`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;

use crate::error::{Result, StoreError};
use crate::FastStore;

/// Fast store talking to a Redis server.
#[derive(Clone)]
pub struct RedisFastStore {
    conn: ConnectionManager,
}

impl RedisFastStore {
    /// Connect to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager_with_config(config).await?;

        tracing::info!(url = %redis_url, "Connected to Redis");
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.conn().get(key).await?)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let seconds = ttl.as_secs().max(1);
        let () = self.conn().set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let _: i64 = self.conn().hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_put_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        Ok(self.conn().hset_nx(key, field, value).await?)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.conn().hget(key, field).await?)
    }

    async fn hash_len(&self, key: &str) -> Result<u64> {
        Ok(self.conn().hlen(key).await?)
    }

    async fn hash_take_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn();
        let (entries, _deleted): (HashMap<String, String>, i64) = redis::pipe()
            .atomic()
            .hgetall(key)
            .del(key)
            .query_async(&mut conn)
            .await?;
        Ok(entries)
    }

    async fn bit_set(&self, key: &str, offset: u32, value: bool) -> Result<bool> {
        let previous: i64 = self.conn().setbit(key, offset as usize, value).await?;
        Ok(previous == 1)
    }

    async fn bit_get(&self, key: &str, offset: u32) -> Result<bool> {
        let bit: i64 = self.conn().getbit(key, offset as usize).await?;
        Ok(bit == 1)
    }

    async fn bit_count(&self, key: &str) -> Result<u64> {
        Ok(self.conn().bitcount(key).await?)
    }

    async fn bitfield_get_unsigned(&self, key: &str, width: u32) -> Result<u64> {
        let mut conn = self.conn();
        let values: Vec<Option<u64>> = redis::cmd("BITFIELD")
            .arg(key)
            .arg("GET")
            .arg(format!("u{width}"))
            .arg(0)
            .query_async(&mut conn)
            .await?;

        values
            .first()
            .copied()
            .ok_or_else(|| StoreError::Corrupt {
                key: key.to_string(),
                message: "empty BITFIELD reply".into(),
            })
            .map(Option::unwrap_or_default)
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<bool> {
        let added: i64 = self.conn().zadd(key, member, score).await?;
        Ok(added == 1)
    }

    async fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        Ok(self.conn().zscore(key, member).await?)
    }

    async fn zset_card(&self, key: &str) -> Result<u64> {
        Ok(self.conn().zcard(key).await?)
    }

    async fn zset_remove_below(&self, key: &str, max: f64) -> Result<u64> {
        // "(" makes the bound exclusive.
        Ok(self
            .conn()
            .zrembyscore(key, "-inf", format!("({max}"))
            .await?)
    }
}
