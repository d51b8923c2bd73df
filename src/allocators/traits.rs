//! Allocator trait definition

use std::ptr::NonNull;

use crate::error::Result;

use super::BUFFER_ALIGNMENT;

/// Trait for slot allocators backing the buffer pools
///
/// Implementations track a global byte budget: every successful
/// [`allocate`](Allocator::allocate) charges `size` bytes against it and
/// every [`deallocate`](Allocator::deallocate) returns them.
pub trait Allocator: Send + Sync + std::fmt::Debug {
    /// Allocate `size` bytes aligned to [`Allocator::alignment`]
    fn allocate(&self, size: usize) -> Result<NonNull<u8>>;

    /// Free memory previously returned by [`Allocator::allocate`]
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same
    /// `size`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize);

    /// Update the byte cap (0 = unlimited). Affects later allocations only.
    fn set_max_size(&self, bytes: usize);

    /// Get the configured byte cap (0 = unlimited)
    fn max_size(&self) -> usize;

    /// Get the amount of memory currently charged against the budget
    fn used_size(&self) -> usize;

    /// Number of successful allocations since creation
    fn allocation_count(&self) -> u64;

    /// Number of deallocations since creation
    fn deallocation_count(&self) -> u64;

    /// Get the remaining budget, `None` when unlimited
    fn available_size(&self) -> Option<usize> {
        match self.max_size() {
            0 => None,
            max => Some(max.saturating_sub(self.used_size())),
        }
    }

    /// Get allocator alignment guarantee
    fn alignment(&self) -> usize {
        BUFFER_ALIGNMENT
    }

    /// Get allocator type name for debugging
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Common allocator queries
pub trait AllocatorExt: Allocator {
    /// Check whether the budget has room for `size` more bytes
    fn can_allocate(&self, size: usize) -> bool {
        self.available_size().map_or(true, |available| available >= size)
    }

    /// Number of allocations not yet returned
    fn live_allocations(&self) -> u64 {
        self.allocation_count()
            .saturating_sub(self.deallocation_count())
    }

    /// Get budget utilization (0.0 to 1.0), 0.0 when unlimited
    fn utilization(&self) -> f64 {
        if self.max_size() == 0 {
            return 0.0;
        }
        self.used_size() as f64 / self.max_size() as f64
    }
}

// Blanket implementation for all Allocators
impl<T: Allocator + ?Sized> AllocatorExt for T {}
