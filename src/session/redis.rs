//! Redis session store
//!
//! Production adapter. Values are written with `SET .. PX` so the entry
//! expires no later than the token it tracks; pattern deletion walks the
//! keyspace with `SCAN` (never `KEYS`) and deletes each page before moving
//! on, so the call only returns once every matched key is gone.

use super::{SessionStore, StoreError};

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client, RedisError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const SCAN_PAGE_SIZE: usize = 100;

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Redis-backed [`SessionStore`]
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    /// Connect and verify the server answers
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let mut conn = ConnectionManager::new(client).await?;

        ::redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        tracing::info!("Redis session store connected");

        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let millis = ttl.as_millis() as u64;
        if millis == 0 {
            return Err(StoreError::Backend(format!(
                "refusing to write {} with an empty ttl",
                key
            )));
        }

        let mut conn = self.conn.clone();
        ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!(key = %key, ttl_ms = millis, "Session entry written");
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let deleted: usize = conn.del(keys).await?;
        Ok(deleted)
    }

    async fn delete_by_prefix(&self, pattern: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_PAGE_SIZE)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: usize = conn.del(&keys).await?;
                total_deleted += deleted;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted = total_deleted, "Session entries deleted by pattern");
        Ok(total_deleted)
    }
}
