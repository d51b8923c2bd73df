//! Buffer pool statistics tracking

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of a pool's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Slot requests, successful or not
    pub total_acquisitions: u64,
    /// Requests served from the free list
    pub reuse_hits: u64,
    /// Requests served by a fresh allocation
    pub fresh_allocations: u64,
    /// Requests that found neither a free slot nor budget
    pub exhaustions: u64,
    /// Slots returned to the free list
    pub reclaims: u64,
    /// Idle slots handed back to the allocator by sweeps
    pub slots_released: u64,
    /// Slots currently leased
    pub currently_leased: usize,
    /// Peak number of slots leased simultaneously
    pub peak_leased: usize,
}

impl BufferPoolStats {
    /// Create new statistics instance
    pub fn new() -> Self {
        Default::default()
    }

    /// Fraction of successful acquisitions served from the free list
    pub fn hit_rate(&self) -> f64 {
        let served = self.reuse_hits + self.fresh_allocations;
        if served == 0 {
            return 0.0;
        }
        self.reuse_hits as f64 / served as f64
    }

    /// Fraction of acquisitions that were dropped for lack of memory
    pub fn drop_rate(&self) -> f64 {
        if self.total_acquisitions == 0 {
            return 0.0;
        }
        self.exhaustions as f64 / self.total_acquisitions as f64
    }

    /// Get a summary string of the statistics
    pub fn summary(&self) -> String {
        format!(
            "BufferPoolStats {{ acquisitions: {}, hits: {}, fresh: {}, dropped: {}, \
             reclaims: {}, released: {}, leased: {}, peak: {}, hit_rate: {:.2}% }}",
            self.total_acquisitions,
            self.reuse_hits,
            self.fresh_allocations,
            self.exhaustions,
            self.reclaims,
            self.slots_released,
            self.currently_leased,
            self.peak_leased,
            self.hit_rate() * 100.0
        )
    }
}

/// Thread-safe statistics for buffer pools
#[derive(Debug, Default)]
pub struct AtomicBufferPoolStats {
    total_acquisitions: AtomicU64,
    reuse_hits: AtomicU64,
    fresh_allocations: AtomicU64,
    exhaustions: AtomicU64,
    reclaims: AtomicU64,
    slots_released: AtomicU64,
    currently_leased: AtomicUsize,
    peak_leased: AtomicUsize,
}

impl AtomicBufferPoolStats {
    /// Create new atomic statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a slot served from the free list
    pub fn record_hit(&self) {
        self.reuse_hits.fetch_add(1, Ordering::Relaxed);
        self.record_lease();
    }

    /// Record a slot served by a fresh allocation
    pub fn record_fresh(&self) {
        self.fresh_allocations.fetch_add(1, Ordering::Relaxed);
        self.record_lease();
    }

    /// Record a request that could not be served
    pub fn record_exhaustion(&self) {
        self.total_acquisitions.fetch_add(1, Ordering::Relaxed);
        self.exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a slot pushed back onto the free list
    pub fn record_reclaim(&self) {
        self.reclaims.fetch_add(1, Ordering::Relaxed);
        self.currently_leased.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record idle slots freed by a sweep
    pub fn record_release(&self, slots: usize) {
        self.slots_released.fetch_add(slots as u64, Ordering::Relaxed);
    }

    fn record_lease(&self) {
        self.total_acquisitions.fetch_add(1, Ordering::Relaxed);
        let leased = self.currently_leased.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_leased.fetch_max(leased, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> BufferPoolStats {
        BufferPoolStats {
            total_acquisitions: self.total_acquisitions.load(Ordering::Relaxed),
            reuse_hits: self.reuse_hits.load(Ordering::Relaxed),
            fresh_allocations: self.fresh_allocations.load(Ordering::Relaxed),
            exhaustions: self.exhaustions.load(Ordering::Relaxed),
            reclaims: self.reclaims.load(Ordering::Relaxed),
            slots_released: self.slots_released.load(Ordering::Relaxed),
            currently_leased: self.currently_leased.load(Ordering::Relaxed),
            peak_leased: self.peak_leased.load(Ordering::Relaxed),
        }
    }
}
