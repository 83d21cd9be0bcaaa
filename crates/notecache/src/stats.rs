//! Per-cache read and write counters
//!
//! Each of the store's caches keeps its own counters so the `stats` report
//! can tell, say, a cold hierarchy from churning child lists. Reads land in
//! exactly one of three buckets:
//! - hit: entry present and fresh
//! - stale: entry present but past its TTL (the caller refetches)
//! - miss: no entry

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// The caches a [`crate::CacheStore`] keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Hierarchy tree of the selected root
    Tree,
    /// Items per leaf container
    Children,
    /// Search results per (root, name)
    Search,
    /// Root lookups per name
    Lookup,
}

impl CacheKind {
    /// Every kind, in report order
    pub const ALL: [CacheKind; 4] = [
        CacheKind::Tree,
        CacheKind::Children,
        CacheKind::Search,
        CacheKind::Lookup,
    ];

    /// Short label used in reports
    pub fn name(self) -> &'static str {
        match self {
            CacheKind::Tree => "tree",
            CacheKind::Children => "children",
            CacheKind::Search => "search",
            CacheKind::Lookup => "lookup",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    inserts: AtomicU64,
    invalidations: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> KindStats {
        KindStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.stale,
            &self.inserts,
            &self.invalidations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time counters of one cache (or the sum of all of them)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Fresh reads
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Reads that found an expired entry
    pub stale: u64,
    /// Writes
    pub inserts: u64,
    /// Targeted or bulk clears
    pub invalidations: u64,
}

impl KindStats {
    /// Reads of any outcome
    pub fn reads(&self) -> u64 {
        self.hits + self.misses + self.stale
    }

    /// Share of reads served fresh (0.0 when nothing was read)
    pub fn hit_ratio(&self) -> f64 {
        match self.reads() {
            0 => 0.0,
            reads => self.hits as f64 / reads as f64,
        }
    }

    fn add(mut self, other: KindStats) -> Self {
        self.hits += other.hits;
        self.misses += other.misses;
        self.stale += other.stale;
        self.inserts += other.inserts;
        self.invalidations += other.invalidations;
        self
    }
}

/// Counters for every cache in a store
#[derive(Debug, Default)]
pub struct CacheStats {
    kinds: [Counters; 4],
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a read
    ///
    /// `present` is whether an entry existed, `fresh` whether it was within
    /// its TTL.
    pub fn record_read(&self, kind: CacheKind, present: bool, fresh: bool) {
        let counters = &self.kinds[kind.index()];
        let counter = match (present, fresh) {
            (true, true) => &counters.hits,
            (true, false) => &counters.stale,
            (false, _) => &counters.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write
    pub fn record_insert(&self, kind: CacheKind) {
        self.kinds[kind.index()]
            .inserts
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a clear of one entry or a whole cache
    pub fn record_invalidation(&self, kind: CacheKind) {
        self.kinds[kind.index()]
            .invalidations
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Counters of one cache
    pub fn kind(&self, kind: CacheKind) -> KindStats {
        self.kinds[kind.index()].snapshot()
    }

    /// Counters summed over every cache
    pub fn total(&self) -> KindStats {
        CacheKind::ALL
            .iter()
            .map(|kind| self.kind(*kind))
            .fold(KindStats::default(), KindStats::add)
    }

    /// Fresh reads across every cache
    pub fn hits(&self) -> u64 {
        self.total().hits
    }

    /// Empty reads across every cache
    pub fn misses(&self) -> u64 {
        self.total().misses
    }

    /// Overall share of reads served fresh
    pub fn hit_ratio(&self) -> f64 {
        self.total().hit_ratio()
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counters in &self.kinds {
            counters.reset();
        }
    }
}
