//! Aligned, budget-tracked memory allocation for frame slots

pub mod aligned;
pub mod budget;
pub mod traits;

pub use aligned::AlignedBufferAllocator;
pub use budget::MemoryBudget;
pub use traits::{Allocator, AllocatorExt};

/// Alignment of every slot handed out by the allocators, and of every
/// payload region inside a slot. Matches common DMA/SIMD requirements.
pub const BUFFER_ALIGNMENT: usize = 16;

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Convert a megabyte count to bytes, saturating at `usize::MAX`.
#[inline]
pub const fn megabytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

/// Largest megabyte count [`megabytes`] converts without saturating.
pub const MAX_MEGABYTES: usize = usize::MAX / (1024 * 1024);
