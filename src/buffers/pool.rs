//! Slot pool implementation

use std::{
    cell::RefCell,
    ptr::NonNull,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::{
    allocators::{AlignedBufferAllocator, Allocator},
    error::{FramePoolError, Result},
};

use super::{
    config::BufferPoolConfig,
    slot::{SlotHeader, SlotLayout, SlotLease},
    stats::{AtomicBufferPoolStats, BufferPoolStats},
};

/// Address of an idle slot sitting in the free list
#[derive(Debug)]
struct IdleSlot(NonNull<u8>);

// SAFETY: idle slots are plain memory owned by the pool.
unsafe impl Send for IdleSlot {}

/// Source of pool ids stamped into every lease
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct PoolState {
    /// LIFO free list
    free: Vec<IdleSlot>,
    /// Slots allocated by this pool, idle or leased
    slot_count: usize,
}

/// A pool of reusable fixed-size slots for one frame class
///
/// Every operation is serialized by the pool's lock. [`BufferPool::scoped_lock`]
/// exposes that lock so a frame's teardown and the reclaim of its slot can
/// run as a single critical section relative to [`BufferPool::acquire_slot`].
///
/// The lock is reentrant: a teardown running under the guard may drop
/// further frames of the same pool (a composite frame releasing its parts),
/// and their reclaims re-enter the lock on the same thread.
#[derive(Debug)]
pub struct BufferPool {
    /// Process-unique id, checked on reclaim
    id: u64,
    /// Configuration
    config: BufferPoolConfig,
    /// Derived slot geometry
    layout: SlotLayout,
    /// Source of fresh slots
    allocator: Arc<dyn Allocator>,
    /// Free list and slot count
    state: ReentrantMutex<RefCell<PoolState>>,
    /// Statistics
    stats: AtomicBufferPoolStats,
}

impl BufferPool {
    /// Create a new buffer pool drawing from `allocator`
    pub fn new(config: BufferPoolConfig, allocator: Arc<dyn Allocator>) -> Result<Self> {
        config.validate()?;
        let layout = config.layout();

        log::debug!(
            "buffer pool '{}' created: payload {} bytes, object {} bytes, slot {} bytes",
            config.name,
            layout.payload_capacity,
            layout.object_capacity(),
            layout.total_size
        );

        Ok(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            config,
            layout,
            allocator,
            state: ReentrantMutex::new(RefCell::new(PoolState::default())),
            stats: AtomicBufferPoolStats::new(),
        })
    }

    /// Create a pool on the process-wide shared allocator
    pub fn with_shared_allocator(config: BufferPoolConfig) -> Result<Self> {
        Self::new(config, AlignedBufferAllocator::shared())
    }

    /// Lease a slot: most recently reclaimed first, otherwise freshly allocated
    ///
    /// Returns [`FramePoolError::Exhausted`] when the free list is empty and
    /// the allocator refuses to grow the pool. This is backpressure, not a
    /// fault; the pool is left unchanged.
    pub fn acquire_slot(&self) -> Result<SlotLease> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        self.acquire_locked(&mut state)
    }

    fn acquire_locked(&self, state: &mut PoolState) -> Result<SlotLease> {
        if let Some(IdleSlot(base)) = state.free.pop() {
            // SAFETY: free-list slots are initialised and owned by the pool.
            let generation = unsafe { SlotHeader::at(base) }.lease();
            self.stats.record_hit();
            return Ok(SlotLease::new(base, generation, self.layout, self.id));
        }

        match self.allocator.allocate(self.layout.total_size) {
            Ok(base) => {
                // SAFETY: fresh allocation of total_size >= header bytes.
                let generation = unsafe { SlotHeader::init(base) }.lease();
                state.slot_count += 1;
                self.stats.record_fresh();
                Ok(SlotLease::new(base, generation, self.layout, self.id))
            }
            Err(err) => {
                self.stats.record_exhaustion();
                log::trace!(
                    "buffer pool '{}' exhausted ({} leased): {}",
                    self.config.name,
                    state.slot_count - state.free.len(),
                    err
                );
                Err(FramePoolError::exhausted(self.layout.total_size))
            }
        }
    }

    /// Return a leased slot to the free list
    ///
    /// The slot's frame object must already be torn down.
    ///
    /// # Panics
    /// If the lease belongs to another pool, its slot was already reclaimed,
    /// or a payload view of the slot is still alive.
    pub fn reclaim_slot(&self, lease: SlotLease) {
        self.scoped_lock().reclaim(lease);
    }

    /// Hand every idle slot back to the allocator; returns the bytes freed
    ///
    /// Leased slots are untouched.
    pub fn release_idle_slots(&self) -> usize {
        let guard = self.state.lock();
        let count = {
            let mut state = guard.borrow_mut();
            let count = state.free.len();
            for IdleSlot(base) in state.free.drain(..) {
                // SAFETY: idle slots came from this allocator with total_size.
                unsafe { self.allocator.deallocate(base, self.layout.total_size) };
            }
            state.slot_count -= count;
            count
        };
        drop(guard);

        if count > 0 {
            self.stats.record_release(count);
            log::debug!(
                "buffer pool '{}' released {} idle slots ({} bytes)",
                self.config.name,
                count,
                count * self.layout.total_size
            );
        }
        count * self.layout.total_size
    }

    /// Take the pool lock for a teardown/reclaim sequence
    pub fn scoped_lock(&self) -> PoolGuard<'_> {
        PoolGuard {
            pool: self,
            state: self.state.lock(),
        }
    }

    /// Maximum payload bytes per frame
    pub fn payload_capacity(&self) -> usize {
        self.config.frame_data_buffer_size
    }

    /// Bytes charged against the budget per slot
    pub fn frame_total_size(&self) -> usize {
        self.layout.total_size
    }

    /// Slot geometry
    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    /// Process-unique pool id, carried by every lease this pool issues
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get pool configuration
    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    /// Get the allocator backing this pool
    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    /// Number of slots in the free list
    pub fn idle_count(&self) -> usize {
        self.scoped_lock().idle_count()
    }

    /// Number of slots currently leased
    pub fn leased_count(&self) -> usize {
        self.scoped_lock().leased_count()
    }

    /// Number of slots allocated by this pool, idle or leased
    pub fn slot_count(&self) -> usize {
        self.state.lock().borrow().slot_count
    }

    /// Bytes this pool currently holds from the allocator
    pub fn resident_bytes(&self) -> usize {
        self.slot_count() * self.layout.total_size
    }

    /// Get current statistics
    pub fn stats(&self) -> BufferPoolStats {
        self.stats.snapshot()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        self.release_idle_slots();
        let leaked = self.state.get_mut().get_mut().slot_count;
        if leaked > 0 {
            log::warn!(
                "buffer pool '{}' dropped with {} slots still leased",
                self.config.name,
                leaked
            );
        }
    }
}

/// The pool lock held across a teardown/reclaim sequence
///
/// While a guard is alive no other thread can acquire, reclaim or release
/// slots of this pool. The owning thread may still take the lock again.
pub struct PoolGuard<'a> {
    pool: &'a BufferPool,
    state: ReentrantMutexGuard<'a, RefCell<PoolState>>,
}

impl PoolGuard<'_> {
    /// Push a leased slot back onto the free list under this guard
    ///
    /// # Panics
    /// If the lease belongs to another pool, its slot was already reclaimed,
    /// or a payload view of the slot is still alive.
    pub fn reclaim(&mut self, lease: SlotLease) {
        assert_eq!(
            lease.pool_id(),
            self.pool.id,
            "slot lease reclaimed into a different pool"
        );
        assert!(
            !lease.payload_attached(),
            "slot payload outlived its frame (generation {})",
            lease.generation()
        );
        lease.header().unlease(lease.generation());
        self.state.borrow_mut().free.push(IdleSlot(lease.base()));
        self.pool.stats.record_reclaim();
    }

    /// Reclaim the slot, or leave it leased forever if its payload escaped
    ///
    /// A slot whose payload view is still alive somewhere must never be
    /// handed out again. It stays allocated and counted as leased until the
    /// pool is dropped. Returns `true` when the slot went back to the free list.
    pub fn reclaim_or_leak(&mut self, lease: SlotLease) -> bool {
        if lease.payload_attached() {
            log::error!(
                "buffer pool '{}': payload of slot generation {} outlived its frame, slot leaked",
                self.pool.config.name,
                lease.generation()
            );
            std::mem::forget(lease);
            return false;
        }
        self.reclaim(lease);
        true
    }

    /// Lease a slot while already holding the lock
    pub fn acquire(&mut self) -> Result<SlotLease> {
        let mut state = self.state.borrow_mut();
        self.pool.acquire_locked(&mut state)
    }

    /// Number of slots in the free list
    pub fn idle_count(&self) -> usize {
        self.state.borrow().free.len()
    }

    /// Number of slots currently leased
    pub fn leased_count(&self) -> usize {
        let state = self.state.borrow();
        state.slot_count - state.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(payload: usize, max_bytes: usize) -> (BufferPool, Arc<AlignedBufferAllocator>) {
        let allocator = Arc::new(AlignedBufferAllocator::with_max_size(max_bytes));
        let config = BufferPoolConfig::new("test")
            .with_payload_capacity(payload)
            .with_object_size(64);
        let pool = BufferPool::new(config, allocator.clone()).unwrap();
        (pool, allocator)
    }

    #[test]
    fn test_lifo_reuse() {
        let (pool, allocator) = test_pool(256, 0);
        let a = pool.acquire_slot().unwrap();
        let b = pool.acquire_slot().unwrap();
        let b_addr = b.base();
        let a_addr = a.base();
        assert_ne!(a_addr, b_addr);

        pool.reclaim_slot(a);
        pool.reclaim_slot(b);
        assert_eq!(pool.idle_count(), 2);

        let c = pool.acquire_slot().unwrap();
        assert_eq!(c.base(), b_addr);
        assert_eq!(allocator.allocation_count(), 2);
        pool.reclaim_slot(c);
    }

    #[test]
    fn test_generation_advances_on_reuse() {
        let (pool, _allocator) = test_pool(64, 0);
        let first = pool.acquire_slot().unwrap();
        let gen = first.generation();
        pool.reclaim_slot(first);

        let second = pool.acquire_slot().unwrap();
        assert_eq!(second.generation(), gen + 1);
        pool.reclaim_slot(second);
    }

    #[test]
    fn test_exhaustion_leaves_state_consistent() {
        let (pool, allocator) = test_pool(1000, 0);
        allocator.set_max_size(pool.frame_total_size());

        let lease = pool.acquire_slot().unwrap();
        let err = pool.acquire_slot().unwrap_err();
        assert!(matches!(err, FramePoolError::Exhausted { .. }));
        assert_eq!(pool.slot_count(), 1);
        assert_eq!(pool.leased_count(), 1);
        assert_eq!(pool.stats().exhaustions, 1);

        pool.reclaim_slot(lease);
        assert!(pool.acquire_slot().map(|l| pool.reclaim_slot(l)).is_ok());
    }

    #[test]
    fn test_release_idle_slots_keeps_leased() {
        let (pool, allocator) = test_pool(128, 0);
        let kept = pool.acquire_slot().unwrap();
        let idle = pool.acquire_slot().unwrap();
        pool.reclaim_slot(idle);

        let freed = pool.release_idle_slots();
        assert_eq!(freed, pool.frame_total_size());
        assert_eq!(pool.slot_count(), 1);
        assert_eq!(allocator.used_size(), pool.frame_total_size());

        pool.reclaim_slot(kept);
        pool.release_idle_slots();
        assert_eq!(allocator.used_size(), 0);
    }

    #[test]
    fn test_payload_is_aligned() {
        let (pool, _allocator) = test_pool(100, 0);
        let lease = pool.acquire_slot().unwrap();
        assert_eq!(lease.payload_ptr().as_ptr() as usize % 16, 0);
        pool.reclaim_slot(lease);
    }

    #[test]
    fn test_guard_reclaim_and_acquire() {
        let (pool, _allocator) = test_pool(64, 0);
        let lease = pool.acquire_slot().unwrap();
        let addr = lease.base();

        let mut guard = pool.scoped_lock();
        guard.reclaim(lease);
        assert_eq!(guard.idle_count(), 1);
        let again = guard.acquire().unwrap();
        assert_eq!(again.base(), addr);
        assert_eq!(guard.leased_count(), 1);
        guard.reclaim(again);
    }

    #[test]
    #[should_panic(expected = "different pool")]
    fn test_reclaim_into_wrong_pool_panics() {
        let (pool_a, _a) = test_pool(64, 0);
        let (pool_b, _b) = test_pool(128, 0);
        let lease = pool_a.acquire_slot().unwrap();
        pool_b.reclaim_slot(lease);
    }

    #[test]
    fn test_same_layout_pools_reject_foreign_leases() {
        let (pool_a, _a) = test_pool(64, 0);
        let (pool_b, _b) = test_pool(64, 0);
        assert_eq!(pool_a.layout(), pool_b.layout());
        assert_ne!(pool_a.id(), pool_b.id());

        let lease = pool_a.acquire_slot().unwrap();
        assert_eq!(lease.pool_id(), pool_a.id());
        let foreign = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pool_b.reclaim_slot(lease)));
        assert!(foreign.is_err());

        // Neither pool's bookkeeping moved
        assert_eq!(pool_b.slot_count(), 0);
        assert_eq!(pool_b.idle_count(), 0);
        assert_eq!(pool_a.leased_count(), 1);
    }

    #[test]
    fn test_reclaim_or_leak_keeps_slot_with_live_payload() {
        let (pool, allocator) = test_pool(64, 0);
        let lease = pool.acquire_slot().unwrap();
        lease.header().attach_payload();
        let header = lease.header() as *const SlotHeader;

        assert!(!pool.scoped_lock().reclaim_or_leak(lease));
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.leased_count(), 1);

        let fresh = pool.acquire_slot().unwrap();
        assert_eq!(allocator.allocation_count(), 2);
        assert!(pool.scoped_lock().reclaim_or_leak(fresh));

        // SAFETY: the leaked slot stays allocated; detach so the test ends clean.
        unsafe { (*header).detach_payload() };
    }

    #[test]
    #[should_panic(expected = "outlived its frame")]
    fn test_reclaim_with_live_payload_panics() {
        let (pool, _allocator) = test_pool(64, 0);
        let lease = pool.acquire_slot().unwrap();
        lease.header().attach_payload();
        pool.reclaim_slot(lease);
    }

    #[test]
    fn test_drop_returns_idle_memory() {
        let (pool, allocator) = test_pool(512, 0);
        let lease = pool.acquire_slot().unwrap();
        pool.reclaim_slot(lease);
        drop(pool);
        assert_eq!(allocator.used_size(), 0);
    }
}
