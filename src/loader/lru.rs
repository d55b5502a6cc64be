//! Bounded LRU map with an optional time-to-live per entry.
//!
//! Eviction is opportunistic: expired entries are dropped when they are read
//! or when an insert needs room. No background timer is involved.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
    tick: u64,
}

/// Counters for cache maintenance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LruStats {
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
}

/// Least-recently-used map with a size bound and optional TTL
#[derive(Debug, Clone)]
pub struct LruTtlCache<K, V> {
    capacity: usize,
    ttl: Option<Duration>,
    entries: HashMap<K, Entry<V>>,
    /// Access order: tick -> key, oldest first
    order: BTreeMap<u64, K>,
    next_tick: u64,
    stats: LruStats,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            stats: LruStats::default(),
        }
    }

    /// Returns a live entry and marks it most recently used
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => is_expired(entry, now),
        };

        if expired {
            self.remove_entry(key);
            self.stats.expirations += 1;
            return None;
        }

        let tick = self.bump();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.tick);
        entry.tick = tick;
        self.order.insert(tick, key.clone());
        Some(entry.value.clone())
    }

    /// Returns true if a live entry exists, without touching recency
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|entry| !is_expired(entry, now))
            .unwrap_or(false)
    }

    /// Inserts or replaces an entry, evicting as needed.
    ///
    /// Returns the keys dropped to make room.
    pub fn insert(&mut self, key: K, value: V) -> Vec<K> {
        let mut dropped = Vec::new();

        if self.entries.contains_key(&key) {
            self.remove_entry(&key);
        } else if self.entries.len() >= self.capacity {
            dropped.extend(self.purge_expired());
            while self.entries.len() >= self.capacity {
                let Some((_, oldest)) = self.order.pop_first() else {
                    break;
                };
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
                dropped.push(oldest);
            }
        }

        let tick = self.bump();
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.order.insert(tick, key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                tick,
            },
        );

        dropped
    }

    /// Removes an entry
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|entry| entry.value)
    }

    /// Drops every expired entry and returns their keys
    pub fn purge_expired(&mut self) -> Vec<K> {
        let now = Instant::now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
            self.stats.expirations += 1;
        }

        expired
    }

    /// Removes everything
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Number of stored entries, including ones whose TTL elapsed but were not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<K> {
        self.order.values().cloned().collect()
    }

    /// Eviction and expiration counters
    pub fn stats(&self) -> LruStats {
        self.stats
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove_entry(&mut self, key: &K) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        Some(entry)
    }
}

fn is_expired<V>(entry: &Entry<V>, now: Instant) -> bool {
    entry.expires_at.map(|at| now >= at).unwrap_or(false)
}
