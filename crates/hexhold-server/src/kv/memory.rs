//! In-memory KV backend.
//!
//! Implements the full facade surface over shared process memory: the
//! production backend for single-node deployments and the backend every test
//! runs against. Clones share the same tables.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{KvConnection, KvError};

#[derive(Default)]
struct Tables {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
    zsets: HashMap<String, Vec<(String, f64)>>,
    lists: HashMap<String, VecDeque<String>>,
    strings: HashMap<String, StringEntry>,
}

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// Shared in-memory store.
#[derive(Clone)]
pub struct MemoryKv {
    tables: Arc<RwLock<Tables>>,
    healthy: Arc<AtomicBool>,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Open one pooled connection view onto this store.
    pub fn connection(&self) -> Box<dyn KvConnection> {
        Box::new(MemoryConnection {
            store: self.clone(),
        })
    }

    pub fn connections(&self, count: usize) -> Vec<Box<dyn KvConnection>> {
        (0..count).map(|_| self.connection()).collect()
    }

    /// Flip the simulated backend health; unhealthy connections fail every
    /// operation. Lets tests drive the outage paths.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), KvError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KvError::Connection("backend unavailable".to_string()))
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().expect("kv store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().expect("kv store lock poisoned")
    }
}

struct MemoryConnection {
    store: MemoryKv,
}

/// Normalize redis-style range indices (negative counts from the end) to an
/// inclusive `[start, stop]` pair, or `None` for an empty selection.
fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    start = start.max(0);
    stop = stop.min(len - 1);
    if len == 0 || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl KvConnection for MemoryConnection {
    async fn hash_get(&mut self, key: &str, field: &str) -> Result<Option<String>, KvError> {
        self.store.check()?;
        Ok(self
            .store
            .read()
            .hashes
            .get(key)
            .and_then(|h| h.get(field).cloned()))
    }

    async fn hash_set(&mut self, key: &str, field: &str, value: &str) -> Result<(), KvError> {
        self.store.check()?;
        self.store
            .write()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_set_many(
        &mut self,
        key: &str,
        entries: &[(String, String)],
    ) -> Result<(), KvError> {
        self.store.check()?;
        let mut tables = self.store.write();
        let hash = tables.hashes.entry(key.to_string()).or_default();
        for (field, value) in entries {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hash_get_all(&mut self, key: &str) -> Result<HashMap<String, String>, KvError> {
        self.store.check()?;
        Ok(self.store.read().hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_del(&mut self, key: &str, field: &str) -> Result<(), KvError> {
        self.store.check()?;
        if let Some(hash) = self.store.write().hashes.get_mut(key) {
            hash.remove(field);
        }
        Ok(())
    }

    async fn set_add(&mut self, key: &str, member: &str) -> Result<(), KvError> {
        self.store.check()?;
        self.store
            .write()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_rem(&mut self, key: &str, member: &str) -> Result<(), KvError> {
        self.store.check()?;
        if let Some(set) = self.store.write().sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn set_members(&mut self, key: &str) -> Result<Vec<String>, KvError> {
        self.store.check()?;
        Ok(self
            .store
            .read()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn zset_add(&mut self, key: &str, member: &str, score: f64) -> Result<(), KvError> {
        self.store.check()?;
        let mut tables = self.store.write();
        let zset = tables.zsets.entry(key.to_string()).or_default();
        zset.retain(|(m, _)| m != member);
        zset.push((member.to_string(), score));
        zset.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(())
    }

    async fn zset_rem(&mut self, key: &str, member: &str) -> Result<(), KvError> {
        self.store.check()?;
        if let Some(zset) = self.store.write().zsets.get_mut(key) {
            zset.retain(|(m, _)| m != member);
        }
        Ok(())
    }

    async fn zset_range(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, KvError> {
        self.store.check()?;
        let tables = self.store.read();
        let Some(zset) = tables.zsets.get(key) else {
            return Ok(Vec::new());
        };
        let Some((start, stop)) = normalize_range(zset.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(zset[start..=stop].iter().map(|(m, _)| m.clone()).collect())
    }

    async fn list_lpush(&mut self, key: &str, value: &str) -> Result<(), KvError> {
        self.store.check()?;
        self.store
            .write()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn list_ltrim(&mut self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        self.store.check()?;
        let mut tables = self.store.write();
        if let Some(list) = tables.lists.get_mut(key) {
            match normalize_range(list.len(), start, stop) {
                Some((start, stop)) => {
                    if start == 0 && stop == list.len() - 1 {
                        return Ok(());
                    }
                    let kept: VecDeque<String> = list
                        .iter()
                        .skip(start)
                        .take(stop - start + 1)
                        .cloned()
                        .collect();
                    *list = kept;
                }
                None => list.clear(),
            }
        }
        Ok(())
    }

    async fn list_lrange(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, KvError> {
        self.store.check()?;
        let tables = self.store.read();
        let Some(list) = tables.lists.get(key) else {
            return Ok(Vec::new());
        };
        let Some((start, stop)) = normalize_range(list.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(list
            .iter()
            .skip(start)
            .take(stop - start + 1)
            .cloned()
            .collect())
    }

    async fn string_set(
        &mut self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), KvError> {
        self.store.check()?;
        self.store.write().strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn string_get(&mut self, key: &str) -> Result<Option<String>, KvError> {
        self.store.check()?;
        // Lazy expiry: drop the entry on first read past its deadline.
        let expired = {
            let tables = self.store.read();
            match tables.strings.get(key) {
                Some(entry) => entry.expires_at.is_some_and(|at| Instant::now() >= at),
                None => return Ok(None),
            }
        };
        if expired {
            self.store.write().strings.remove(key);
            return Ok(None);
        }
        Ok(self.store.read().strings.get(key).map(|e| e.value.clone()))
    }

    async fn exists(&mut self, key: &str) -> Result<bool, KvError> {
        self.store.check()?;
        let tables = self.store.read();
        Ok(tables.hashes.contains_key(key)
            || tables.sets.contains_key(key)
            || tables.zsets.contains_key(key)
            || tables.lists.contains_key(key)
            || tables.strings.contains_key(key))
    }

    async fn ping(&mut self) -> Result<(), KvError> {
        self.store.check()
    }
}
