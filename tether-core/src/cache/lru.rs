//! LRU (Least Recently Used) cache with optional time-to-idle
//!
//! Recency is tracked with a monotonically increasing tick per access. The
//! tick order doubles as idle order, so idle entries always form the oldest
//! prefix and can be purged without scanning the whole cache.

use super::entry::CacheEntry;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

struct Slot<V> {
    tick: u64,
    entry: CacheEntry<V>,
}

/// LRU cache with configurable capacity and idle expiry
pub struct LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    capacity: usize,
    time_to_idle: Option<Duration>,
    slots: HashMap<K, Slot<V>>,
    recency: BTreeMap<u64, K>,
    next_tick: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            time_to_idle: None,
            slots: HashMap::with_capacity(capacity.min(1024)),
            recency: BTreeMap::new(),
            next_tick: 0,
        }
    }

    /// Entries not accessed for this long are treated as absent
    pub fn with_time_to_idle(mut self, time_to_idle: Duration) -> Self {
        self.time_to_idle = Some(time_to_idle);
        self
    }

    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn is_idle(&self, slot: &Slot<V>) -> bool {
        self.time_to_idle.is_some_and(|ttl| slot.entry.is_idle(ttl))
    }

    /// Get a value and mark it most recently used. Idle entries read as absent.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let slot = self.slots.get(key)?;
        if self.is_idle(slot) {
            return None;
        }
        let old_tick = slot.tick;
        let new_tick = self.tick();

        self.recency.remove(&old_tick);
        self.recency.insert(new_tick, key.clone());

        let slot = self.slots.get_mut(key)?;
        slot.tick = new_tick;
        slot.entry.touch();
        Some(&slot.entry.value)
    }

    /// Get a value without changing recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        let slot = self.slots.get(key)?;
        if self.is_idle(slot) {
            return None;
        }
        Some(&slot.entry.value)
    }

    /// Insert a value as most recently used.
    ///
    /// Returns every entry that left the cache: the previous value under the
    /// same key and any least recently used entry evicted to make room.
    pub fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        let mut displaced = Vec::new();
        if let Some(previous) = self.remove(&key) {
            displaced.push((key.clone(), previous));
        }

        while self.slots.len() >= self.capacity {
            match self.pop_oldest() {
                Some(evicted) => displaced.push(evicted),
                None => break,
            }
        }

        let tick = self.tick();
        self.recency.insert(tick, key.clone());
        self.slots.insert(key, Slot { tick, entry: CacheEntry::new(value) });
        displaced
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.entry.value)
    }

    /// Remove every idle entry, oldest first
    pub fn purge_idle(&mut self) -> Vec<(K, V)> {
        let mut purged = Vec::new();
        if self.time_to_idle.is_none() {
            return purged;
        }
        while let Some((_, key)) = self.recency.first_key_value() {
            let idle = self.slots.get(key).is_some_and(|slot| self.is_idle(slot));
            if !idle {
                break;
            }
            match self.pop_oldest() {
                Some(entry) => purged.push(entry),
                None => break,
            }
        }
        purged
    }

    fn pop_oldest(&mut self) -> Option<(K, V)> {
        let (_, key) = self.recency.pop_first()?;
        let slot = self.slots.remove(&key)?;
        Some((key, slot.entry.value))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.recency.clear();
    }

    /// Number of entries, idle ones included until purged
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
