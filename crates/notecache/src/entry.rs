//! Timestamped cache entries
//!
//! Entries are never evicted by a timer. Staleness is checked lazily when an
//! entry is read, and a stale value stays in place until it is overwritten
//! or cleared.

use std::time::Duration;
use tokio::time::Instant;

/// Default time-to-live for child-list, search and lookup entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Cache store configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry stays fresh after being written
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

/// A cached value and the time it was written
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    written_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Wrap a value, stamped with the current time
    pub fn new(value: V) -> Self {
        Self {
            value,
            written_at: Instant::now(),
        }
    }

    /// The stored value, fresh or not
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Time elapsed since the entry was written
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.written_at)
    }

    /// `true` while `age() <= ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() <= ttl
    }
}
