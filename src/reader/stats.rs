//! Read instrumentation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one column's read path.
#[derive(Debug, Default)]
pub struct ReadStats {
    /// Blocks decoded from storage.
    pub block_loads: AtomicU64,
    /// Block lookups served by a published block.
    pub cache_hits: AtomicU64,
    /// Decoded blocks published into a cache slot.
    pub published: AtomicU64,
    /// Decoded blocks dropped because another thread published first.
    pub discarded: AtomicU64,
    /// Key comparisons spent locating blocks.
    pub block_search_steps: AtomicU64,
}

impl ReadStats {
    /// Create new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let loads = self.block_loads.load(Ordering::Relaxed);
        let total = hits + loads;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.block_loads.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.published.store(0, Ordering::Relaxed);
        self.discarded.store(0, Ordering::Relaxed);
        self.block_search_steps.store(0, Ordering::Relaxed);
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Clone for ReadStats {
    fn clone(&self) -> Self {
        Self {
            block_loads: AtomicU64::new(self.block_loads.load(Ordering::Relaxed)),
            cache_hits: AtomicU64::new(self.cache_hits.load(Ordering::Relaxed)),
            published: AtomicU64::new(self.published.load(Ordering::Relaxed)),
            discarded: AtomicU64::new(self.discarded.load(Ordering::Relaxed)),
            block_search_steps: AtomicU64::new(self.block_search_steps.load(Ordering::Relaxed)),
        }
    }
}
