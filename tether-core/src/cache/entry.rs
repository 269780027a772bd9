//! Cache entry metadata

use std::time::{Duration, Instant};

/// A cached value with access metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// When this entry was created
    pub created_at: Instant,

    /// When this entry was last read or written
    pub last_accessed: Instant,

    /// Number of times this entry has been accessed
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V) -> Self {
        let now = Instant::now();
        Self { value, created_at: now, last_accessed: now, access_count: 1 }
    }

    /// Mark this entry as accessed
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }

    /// True when the entry has not been accessed for at least `time_to_idle`
    pub fn is_idle(&self, time_to_idle: Duration) -> bool {
        self.last_accessed.elapsed() >= time_to_idle
    }
}
