//! Bounded least-recently-used caches.
//!
//! Recency is a monotonically increasing access counter rather than a clock,
//! so eviction order is deterministic. Eviction scans every entry.

use std::fmt::Debug;
use std::hash::Hash;

use fstore_result::Result;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

/// A value that holds a resource released by [`close`](Closable::close).
pub trait Closable {
    fn close(&mut self) -> Result<()>;
}

#[derive(Debug)]
struct Slot<V> {
    value: V,
    last_used: u64,
}

#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: FxHashMap<K, Slot<V>>,
    counter: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// A cache holding at most `capacity` entries. A capacity of zero is
    /// treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: FxHashMap::default(),
            counter: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn tick(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    /// Look up `key`, marking it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = self.tick();
        self.entries.get_mut(key).map(|slot| {
            slot.last_used = now;
            &slot.value
        })
    }

    /// Like [`get`](Self::get), returning `miss` when the key is absent.
    pub fn get_or<'a>(&'a mut self, key: &K, miss: &'a V) -> &'a V {
        self.get(key).unwrap_or(miss)
    }

    /// Insert or overwrite `key`. A new key inserted at capacity first
    /// evicts the least recently used entry, which is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let evicted = if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity
        {
            self.remove_oldest()
        } else {
            None
        };
        let now = self.tick();
        self.entries.insert(
            key,
            Slot {
                value,
                last_used: now,
            },
        );
        evicted
    }

    /// Remove and return the least recently used entry.
    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone())?;
        self.entries
            .remove_entry(&oldest)
            .map(|(key, slot)| (key, slot.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

/// [`LruCache`] that closes every value it evicts.
///
/// Close failures are logged and never returned to the caller that caused
/// the eviction.
#[derive(Debug)]
pub struct LruClosableCache<K, V> {
    inner: LruCache<K, V>,
}

impl<K, V> LruClosableCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Closable,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_or<'a>(&'a mut self, key: &K, miss: &'a V) -> &'a V {
        self.inner.get_or(key, miss)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    /// Insert or overwrite `key`, closing the entry evicted to make room.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.inner
            .insert(key, value)
            .map(|(key, value)| close_evicted(key, value))
    }

    /// Remove, close and return the least recently used entry.
    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        self.inner
            .remove_oldest()
            .map(|(key, value)| close_evicted(key, value))
    }

    /// Evict and close every entry.
    pub fn close(&mut self) {
        debug!(entries = self.inner.len(), "closing cache");
        while self.remove_oldest().is_some() {}
    }
}

fn close_evicted<K: Debug, V: Closable>(key: K, mut value: V) -> (K, V) {
    debug!(?key, "evicting cache entry");
    if let Err(err) = value.close() {
        warn!(?key, error = %err, "failed to close evicted cache entry");
    }
    (key, value)
}
