//! Frames constructed in place inside pool slots
//!
//! [`TypedFrameFactory`] leases a slot from its [`BufferPool`](crate::buffers::BufferPool),
//! builds a [`FrameObject`] in the slot's object region and hands out a
//! [`FrameHandle`]. Teardown and slot reclaim run under the pool lock, so a
//! slot is never re-issued while its previous frame is still being dropped.

pub mod factory;
pub mod handle;
pub mod object;
pub mod types;

pub use factory::TypedFrameFactory;
pub use handle::FrameHandle;
pub use object::{FrameObject, Payload};
pub use types::{FrameHeader, RawFrame, VideoFrame, VideoFrameInit};
