//! In-process response cache

use crate::error::Result;
use crate::response::QueryResponse;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// 128-bit content-addressed fingerprint of a canonicalised request.
///
/// Computed over the serialized normative fields only; credentials never
/// enter a request and therefore never reach the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 16]);

impl CacheKey {
    pub fn of(request: &impl Serialize) -> Result<Self> {
        let canonical = serde_json::to_vec(request)?;
        let digest = Sha256::digest(&canonical);
        let mut key = [0u8; 16];
        key.copy_from_slice(&digest[..16]);
        Ok(Self(key))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

struct StoredEntry {
    response: QueryResponse,
    size: usize,
    last_used: u64,
}

struct CacheInner {
    entries: HashMap<CacheKey, StoredEntry>,
    size: usize,
    tick: u64,
}

/// Byte-bounded LRU cache of assembled query responses, shared
/// process-wide behind a mutex. A capacity of zero disables caching.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(capacity_mb: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                size: 0,
                tick: 0,
            }),
            capacity: capacity_mb * 1024 * 1024,
        }
    }

    /// Look up a response and bump its recency
    pub fn get(&self, key: &CacheKey) -> Option<QueryResponse> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        let entry = inner.entries.get_mut(key)?;
        entry.last_used = tick;
        Some(entry.response.clone())
    }

    /// Admit a response, evicting least-recently-used entries until it
    /// fits. Responses larger than the whole cache are not admitted.
    pub fn set(&self, key: CacheKey, response: QueryResponse) {
        let size = response.size();
        if size > self.capacity {
            debug!(%key, size, capacity = self.capacity, "response exceeds cache capacity");
            return;
        }

        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(previous) = inner.entries.remove(&key) {
            inner.size -= previous.size;
        }

        while inner.size + size > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| *key)
                .expect("cache holds entries while over budget");
            let evicted = inner.entries.remove(&oldest).expect("key taken from map");
            inner.size -= evicted.size;
            debug!(key = %oldest, size = evicted.size, "evicted cache entry");
        }

        inner.size += size;
        inner.entries.insert(
            key,
            StoredEntry {
                response,
                size,
                last_used: tick,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes currently held
    pub fn size(&self) -> usize {
        self.inner.lock().size
    }
}
