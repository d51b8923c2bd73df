//! Process-wide lookup from frame class to buffer pool
//!
//! A capture path asks the [`PoolRegistry`] for the factory serving its
//! `(frame type, max payload size)` and acquires frames from it. The
//! registry also carries the global budget and reuse policy, and sweeps
//! idle slots out of every live pool on request.

pub mod key;
pub mod pool_registry;
pub mod sizing;

pub use key::{FrameClassKey, FrameType};
pub use pool_registry::{PoolRegistry, PoolSnapshot};
pub use sizing::{DefaultSizeEstimator, FrameSizeEstimator, PixelFormat, StreamProfile};
