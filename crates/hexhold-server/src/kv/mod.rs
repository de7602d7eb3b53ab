//! Typed facade over the shared key/value backend.
//!
//! The backend client itself is an external collaborator; this module owns
//! the seam: a typed async connection trait, a bounded FIFO pool, and the
//! in-memory backend used for single-node deployments and every test.

mod memory;
mod pool;

pub use memory::MemoryKv;
pub use pool::{KvPool, PooledConnection, DEFAULT_POOL_SIZE};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

/// Errors surfaced by KV operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv operation timed out")]
    Timeout,
    #[error("kv connection failed: {0}")]
    Connection(String),
}

/// One logical connection to the shared key/value backend.
///
/// Every operation may suspend. Connections are handed out through
/// [`KvPool`], which serializes checkout, so a connection is never used from
/// two tasks at once.
#[async_trait]
pub trait KvConnection: Send + Sync {
    async fn hash_get(&mut self, key: &str, field: &str) -> Result<Option<String>, KvError>;
    async fn hash_set(&mut self, key: &str, field: &str, value: &str) -> Result<(), KvError>;
    async fn hash_set_many(
        &mut self,
        key: &str,
        entries: &[(String, String)],
    ) -> Result<(), KvError>;
    async fn hash_get_all(&mut self, key: &str) -> Result<HashMap<String, String>, KvError>;
    async fn hash_del(&mut self, key: &str, field: &str) -> Result<(), KvError>;

    async fn set_add(&mut self, key: &str, member: &str) -> Result<(), KvError>;
    async fn set_rem(&mut self, key: &str, member: &str) -> Result<(), KvError>;
    async fn set_members(&mut self, key: &str) -> Result<Vec<String>, KvError>;

    async fn zset_add(&mut self, key: &str, member: &str, score: f64) -> Result<(), KvError>;
    async fn zset_rem(&mut self, key: &str, member: &str) -> Result<(), KvError>;
    /// Members ordered by score, with redis-style negative indices.
    async fn zset_range(&mut self, key: &str, start: i64, stop: i64)
        -> Result<Vec<String>, KvError>;

    async fn list_lpush(&mut self, key: &str, value: &str) -> Result<(), KvError>;
    async fn list_ltrim(&mut self, key: &str, start: i64, stop: i64) -> Result<(), KvError>;
    async fn list_lrange(&mut self, key: &str, start: i64, stop: i64)
        -> Result<Vec<String>, KvError>;

    async fn string_set(
        &mut self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), KvError>;
    async fn string_get(&mut self, key: &str) -> Result<Option<String>, KvError>;

    async fn exists(&mut self, key: &str) -> Result<bool, KvError>;
    async fn ping(&mut self) -> Result<(), KvError>;
}

/// Pooled facade handed to the data layer.
///
/// Each call checks a connection out of the pool, runs the operation under
/// the command timeout, and returns the connection FIFO.
#[derive(Clone)]
pub struct Kv {
    pool: KvPool,
    command_timeout: Duration,
}

macro_rules! with_conn {
    ($self:ident, $conn:ident => $op:expr) => {{
        let mut $conn = $self.pool.acquire().await;
        match timeout($self.command_timeout, $op).await {
            Ok(result) => result,
            Err(_) => Err(KvError::Timeout),
        }
    }};
}

impl Kv {
    pub fn new(pool: KvPool, command_timeout: Duration) -> Self {
        Self {
            pool,
            command_timeout,
        }
    }

    /// Liveness probe used by background loops before each pass.
    pub async fn is_available(&self) -> bool {
        self.ping().await.is_ok()
    }

    pub async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, KvError> {
        with_conn!(self, conn => conn.hash_get(key, field))
    }

    pub async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), KvError> {
        with_conn!(self, conn => conn.hash_set(key, field, value))
    }

    pub async fn hash_set_many(
        &self,
        key: &str,
        entries: &[(String, String)],
    ) -> Result<(), KvError> {
        with_conn!(self, conn => conn.hash_set_many(key, entries))
    }

    pub async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, KvError> {
        with_conn!(self, conn => conn.hash_get_all(key))
    }

    pub async fn hash_del(&self, key: &str, field: &str) -> Result<(), KvError> {
        with_conn!(self, conn => conn.hash_del(key, field))
    }

    pub async fn set_add(&self, key: &str, member: &str) -> Result<(), KvError> {
        with_conn!(self, conn => conn.set_add(key, member))
    }

    pub async fn set_rem(&self, key: &str, member: &str) -> Result<(), KvError> {
        with_conn!(self, conn => conn.set_rem(key, member))
    }

    pub async fn set_members(&self, key: &str) -> Result<Vec<String>, KvError> {
        with_conn!(self, conn => conn.set_members(key))
    }

    pub async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<(), KvError> {
        with_conn!(self, conn => conn.zset_add(key, member, score))
    }

    pub async fn zset_rem(&self, key: &str, member: &str) -> Result<(), KvError> {
        with_conn!(self, conn => conn.zset_rem(key, member))
    }

    pub async fn zset_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        with_conn!(self, conn => conn.zset_range(key, start, stop))
    }

    pub async fn list_lpush(&self, key: &str, value: &str) -> Result<(), KvError> {
        with_conn!(self, conn => conn.list_lpush(key, value))
    }

    pub async fn list_ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        with_conn!(self, conn => conn.list_ltrim(key, start, stop))
    }

    pub async fn list_lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        with_conn!(self, conn => conn.list_lrange(key, start, stop))
    }

    pub async fn string_set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), KvError> {
        with_conn!(self, conn => conn.string_set(key, value, ttl))
    }

    pub async fn string_get(&self, key: &str) -> Result<Option<String>, KvError> {
        with_conn!(self, conn => conn.string_get(key))
    }

    pub async fn exists(&self, key: &str) -> Result<bool, KvError> {
        with_conn!(self, conn => conn.exists(key))
    }

    pub async fn ping(&self) -> Result<(), KvError> {
        with_conn!(self, conn => conn.ping())
    }
}
