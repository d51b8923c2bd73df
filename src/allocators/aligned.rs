//! Aligned heap allocator with a global byte budget

use std::{
    alloc::{alloc_zeroed, dealloc, Layout},
    ptr::NonNull,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

#[cfg(debug_assertions)]
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{FramePoolError, Result};

use super::{budget::MemoryBudget, traits::Allocator, BUFFER_ALIGNMENT};

/// Process-wide instance handed out by [`AlignedBufferAllocator::shared`]
static SHARED: Mutex<Weak<AlignedBufferAllocator>> = parking_lot::const_mutex(Weak::new());

#[derive(Debug, Default)]
struct AllocatorState {
    budget: MemoryBudget,
    /// Live allocations by address, used to catch size mismatches
    #[cfg(debug_assertions)]
    live: HashMap<usize, usize>,
}

/// Heap allocator returning [`BUFFER_ALIGNMENT`]-aligned blocks and
/// charging them against a byte budget
#[derive(Debug, Default)]
pub struct AlignedBufferAllocator {
    /// Budget and debug bookkeeping, one lock for check-and-charge
    state: Mutex<AllocatorState>,
    allocations: AtomicU64,
    deallocations: AtomicU64,
}

impl AlignedBufferAllocator {
    /// Create an allocator without a byte cap
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator with a byte cap (0 = unlimited)
    pub fn with_max_size(max_bytes: usize) -> Self {
        let allocator = Self::new();
        allocator.state.lock().budget.max_bytes = max_bytes;
        allocator
    }

    /// Get the process-wide allocator, creating it if no holder keeps one alive
    ///
    /// The instance lives exactly as long as the pools and registries that
    /// hold it; once they are all gone the next call starts a fresh one with
    /// an empty budget.
    pub fn shared() -> Arc<Self> {
        let mut slot = SHARED.lock();
        if let Some(existing) = slot.upgrade() {
            return existing;
        }

        let allocator = Arc::new(Self::new());
        *slot = Arc::downgrade(&allocator);
        log::debug!("created shared aligned buffer allocator");
        allocator
    }

    /// Snapshot of the budget
    pub fn budget(&self) -> MemoryBudget {
        self.state.lock().budget
    }

    fn layout(size: usize) -> Result<Layout> {
        if size == 0 {
            return Err(FramePoolError::invalid_parameter(
                "size",
                "Allocation size must be greater than 0",
            ));
        }
        Layout::from_size_align(size, BUFFER_ALIGNMENT)
            .map_err(|e| FramePoolError::invalid_parameter("size", e.to_string()))
    }
}

impl Allocator for AlignedBufferAllocator {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        let layout = Self::layout(size)?;

        let mut state = self.state.lock();
        state.budget.try_charge(size)?;

        // Zeroed so every slot byte is initialised before its first lease.
        // SAFETY: layout has a non-zero size.
        let ptr = match NonNull::new(unsafe { alloc_zeroed(layout) }) {
            Some(ptr) => ptr,
            None => {
                state.budget.refund(size);
                return Err(FramePoolError::out_of_memory(size));
            }
        };

        #[cfg(debug_assertions)]
        state.live.insert(ptr.as_ptr() as usize, size);

        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        let mut state = self.state.lock();

        #[cfg(debug_assertions)]
        {
            let recorded = state.live.remove(&(ptr.as_ptr() as usize));
            assert_eq!(
                recorded,
                Some(size),
                "deallocate of {:p} with size {} does not match its allocation",
                ptr,
                size
            );
        }

        // The layout was valid when the block was allocated.
        let layout = Layout::from_size_align_unchecked(size, BUFFER_ALIGNMENT);
        dealloc(ptr.as_ptr(), layout);
        state.budget.refund(size);
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }

    fn set_max_size(&self, bytes: usize) {
        let mut state = self.state.lock();
        log::debug!(
            "allocator cap {} -> {} bytes ({} in use)",
            state.budget.max_bytes,
            bytes,
            state.budget.used_bytes
        );
        state.budget.max_bytes = bytes;
    }

    fn max_size(&self) -> usize {
        self.state.lock().budget.max_bytes
    }

    fn used_size(&self) -> usize {
        self.state.lock().budget.used_bytes
    }

    fn allocation_count(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    fn deallocation_count(&self) -> u64 {
        self.deallocations.load(Ordering::Relaxed)
    }
}
