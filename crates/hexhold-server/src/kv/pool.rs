//! Bounded FIFO connection pool.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::KvConnection;

pub const DEFAULT_POOL_SIZE: usize = 10;

/// Bounded pool of KV connections.
///
/// Checkout waits when the pool is saturated instead of failing; returned
/// connections rejoin at the back of the queue, so checkouts cycle through
/// every connection FIFO.
#[derive(Clone)]
pub struct KvPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    idle: Mutex<VecDeque<Box<dyn KvConnection>>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl KvPool {
    pub fn new(connections: Vec<Box<dyn KvConnection>>) -> Self {
        let size = connections.len();
        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(connections.into()),
                permits: Arc::new(Semaphore::new(size)),
                size,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Number of connections currently checked in.
    pub fn idle(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub async fn acquire(&self) -> PooledConnection {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore closed");
        let conn = self
            .inner
            .idle
            .lock()
            .expect("pool mutex poisoned")
            .pop_front()
            .expect("permit held with no idle connection");
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        }
    }
}

/// Checked-out connection; returns itself to the pool on drop.
pub struct PooledConnection {
    conn: Option<Box<dyn KvConnection>>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = dyn KvConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_deref().expect("connection taken")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_deref_mut().expect("connection taken")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Return before the permit releases (fields drop after this body)
            // so a waiter never wakes to an empty queue.
            self.pool
                .idle
                .lock()
                .expect("pool mutex poisoned")
                .push_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use std::time::Duration;

    #[tokio::test]
    async fn checkout_and_return() {
        let store = MemoryKv::new();
        let pool = KvPool::new(store.connections(2));
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.idle(), 2);

        let a = pool.acquire().await;
        let b = pool.acquire().await;
        assert_eq!(pool.idle(), 0);

        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 2);
    }

    #[tokio::test]
    async fn saturated_pool_waits_instead_of_failing() {
        let store = MemoryKv::new();
        let pool = KvPool::new(store.connections(1));

        let held = pool.acquire().await;

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let _conn = pool.acquire().await;
            })
        };

        // The waiter cannot finish while the connection is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
    }
}
