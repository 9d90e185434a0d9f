//! Bounded image cache.
//!
//! Maps a request key to previously downloaded image bytes. Entries expire
//! after `max_age`; when space runs out the oldest entries are evicted first.
//! Size accounting is the exact sum of stored byte lengths.

use crate::config::CacheConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One cached image.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub bytes: Vec<u8>,
    pub inserted_at: Instant,
    pub size: usize,
}

/// Time- and size-limited image store.
#[derive(Debug)]
pub struct ImageCache {
    entries: HashMap<String, CacheEntry>,
    max_size: usize,
    max_age: Duration,
    current_size: usize,
}

impl ImageCache {
    /// Create a cache holding at most `max_size` bytes for at most `max_age`.
    pub fn new(max_size: usize, max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_size,
            max_age,
            current_size: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.max_size_mb.saturating_mul(1024 * 1024),
            Duration::from_secs(config.max_age_seconds),
        )
    }

    pub fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`, purging expired entries first.
    pub fn get_at(&mut self, key: &str, now: Instant) -> Option<Vec<u8>> {
        self.purge_expired(now);
        self.entries.get(key).map(|entry| entry.bytes.clone())
    }

    pub fn put(&mut self, key: &str, bytes: Vec<u8>) -> bool {
        self.put_at(key, bytes, Instant::now())
    }

    /// Insert `bytes` under `key` as of `now`.
    ///
    /// Returns `false` (and stores nothing) when the entry alone exceeds the
    /// total capacity.
    pub fn put_at(&mut self, key: &str, bytes: Vec<u8>, now: Instant) -> bool {
        self.purge_expired(now);

        let size = bytes.len();
        if size > self.max_size {
            tracing::debug!(key, size, max_size = self.max_size, "Image too large to cache");
            return false;
        }

        self.remove(key);
        self.make_space(size);

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                bytes,
                inserted_at: now,
                size,
            },
        );
        self.current_size += size;
        true
    }

    /// Number of live entries (expired entries may linger until the next operation).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact number of bytes currently stored.
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    pub fn capacity_bytes(&self) -> usize {
        self.max_size
    }

    fn purge_expired(&mut self, now: Instant) {
        let max_age = self.max_age;
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| now.saturating_duration_since(entry.inserted_at) >= max_age)
            .map(|entry| entry.key.clone())
            .collect();

        for key in expired {
            self.remove(&key);
        }
    }

    fn make_space(&mut self, needed: usize) {
        if self.current_size + needed <= self.max_size {
            return;
        }

        let mut by_age: Vec<(Instant, String)> = self
            .entries
            .values()
            .map(|entry| (entry.inserted_at, entry.key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age {
            if self.current_size + needed <= self.max_size {
                break;
            }
            self.remove(&key);
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.current_size -= entry.size;
        }
    }
}
