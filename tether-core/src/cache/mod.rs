//! Bounded in-memory caches
//!
//! [`LruCache`] evicts the least recently used entry once full and can
//! additionally drop entries left idle for longer than a time-to-idle.
//! Used to bound per-client tables such as the crawler IP map.

pub mod entry;
pub mod lru;

pub use entry::CacheEntry;
pub use lru::LruCache;
