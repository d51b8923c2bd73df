//! Per frame-class slot pools
//!
//! A [`BufferPool`] owns a LIFO free list of fixed-size slots, each large
//! enough for one frame object plus its aligned payload. Slots come from an
//! [`Allocator`](crate::allocators::Allocator) only on a free-list miss and
//! go back to it only through [`BufferPool::release_idle_slots`].

pub mod config;
pub mod pool;
pub mod slot;
pub mod stats;

// Re-export main types
pub use config::{BufferPoolConfig, BufferPoolConfigBuilder};
pub use pool::{BufferPool, PoolGuard};
pub use slot::{SlotLayout, SlotLease, SLOT_HEADER_SIZE};
pub use stats::{AtomicBufferPoolStats, BufferPoolStats};
