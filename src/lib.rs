//! # framepool - Slab Pool for Sensor Frame Buffers
//!
//! framepool recycles the memory behind depth/vision sensor frames. Frames
//! are bucketed by `(frame type, max payload size)`; each bucket is a pool
//! of fixed-size slots drawn from one budget-capped, 16-byte aligned
//! allocator. A frame object is constructed in place inside its slot and
//! handed out as a reference-counted handle; dropping the last handle tears
//! the object down and returns the slot to its pool.
//!
//! ## Features
//!
//! - **Global byte budget**: a single cap across every pool, checked on allocation
//! - **LIFO slot reuse**: the most recently released slot is handed out first
//! - **Fail-fast backpressure**: an exhausted budget yields `Ok(None)`, never a block
//! - **Safe slot recycling**: teardown and reclaim run under the pool lock,
//!   and a generation counter turns double reclaims into panics
//! - **Idle trimming**: `free_idle_memory` returns cached slots to the system
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 PoolRegistry                     │
//! │   (frame type, max payload) → factory + pool     │
//! ├──────────────────────────────────────────────────┤
//! │  TypedFrameFactory<F>  →  FrameHandle<F>         │
//! ├──────────────────────────────────────────────────┤
//! │  BufferPool: LIFO free list of slots             │
//! │  [header | frame object | pad | payload]         │
//! └──────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────────┐
//! │  AlignedBufferAllocator (16-byte, byte budget)   │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use framepool::{FrameHeader, FrameType, PoolRegistry, RawFrame};
//!
//! let registry = PoolRegistry::with_shared_allocator();
//! let header = FrameHeader::new(FrameType::Depth, 1, 0);
//! if let Some(mut frame) = registry
//!     .acquire_frame::<RawFrame>(FrameType::Depth, 640 * 480 * 2, header)
//!     .unwrap()
//! {
//!     let raw = framepool::FrameHandle::get_mut(&mut frame).unwrap();
//!     raw.payload_mut().write(0, &[1, 2, 3, 4]).unwrap();
//!     assert_eq!(frame.data(), &[1, 2, 3, 4]);
//! }
//! registry.free_idle_memory();
//! ```

pub mod allocators;
pub mod buffers;
pub mod config;
pub mod error;
pub mod frames;
pub mod registry;

// Main API re-exports
pub use allocators::{AlignedBufferAllocator, Allocator, AllocatorExt, MemoryBudget, BUFFER_ALIGNMENT};
pub use buffers::{
    AtomicBufferPoolStats, BufferPool, BufferPoolConfig, BufferPoolConfigBuilder, BufferPoolStats, PoolGuard,
    SlotLayout, SlotLease,
};
pub use config::FramePoolConfig;
pub use error::{FramePoolError, Result};
pub use frames::{
    FrameHandle, FrameHeader, FrameObject, Payload, RawFrame, TypedFrameFactory, VideoFrame, VideoFrameInit,
};
pub use registry::{
    DefaultSizeEstimator, FrameClassKey, FrameSizeEstimator, FrameType, PixelFormat, PoolRegistry, PoolSnapshot,
    StreamProfile,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 3;
pub const VERSION_PATCH: u32 = 0;
