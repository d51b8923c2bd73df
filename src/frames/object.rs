//! Frame object contract and the payload view handed to it

use std::{ptr::NonNull, slice};

use crate::{
    buffers::{slot::SlotHeader, SlotLease},
    error::{FramePoolError, Result},
};

/// A frame type that can be constructed in place inside a pool slot
///
/// `construct` is the typed constructor run on every lease; `Drop` is the
/// teardown run when the last [`FrameHandle`](super::FrameHandle) goes away,
/// under the pool lock. The slot's bytes may hold a previous occupant's
/// data, so constructors must initialise every field they later read.
pub trait FrameObject: Send + Sync + Sized + 'static {
    /// Parameters the capture path supplies for each frame
    type Init;

    /// Build the frame object around its payload region
    fn construct(payload: Payload, init: Self::Init) -> Result<Self>;
}

/// Writable view of a slot's 16-byte aligned payload region
///
/// Owned by the frame object living in the same slot. The region stays
/// valid until the frame is torn down; [`Payload::release`] detaches it
/// earlier, after which the view is empty.
///
/// The slot header records that the view exists. A slot whose payload was
/// moved out of its frame, and is still alive when the frame is torn down,
/// is never handed out again.
#[derive(Debug)]
pub struct Payload {
    /// Start of the owning slot
    slot: NonNull<u8>,
    ptr: NonNull<u8>,
    capacity: usize,
    len: usize,
    released: bool,
}

// SAFETY: the payload region is owned by exactly one frame object.
unsafe impl Send for Payload {}
unsafe impl Sync for Payload {}

impl Payload {
    /// Hand out the payload view of a leased slot
    ///
    /// # Panics
    /// If a view of this slot is already alive.
    pub(crate) fn attach(lease: &SlotLease) -> Self {
        lease.header().attach_payload();
        Self {
            slot: lease.base(),
            ptr: lease.payload_ptr(),
            capacity: lease.layout().payload_capacity,
            len: 0,
            released: false,
        }
    }

    /// Aligned start of the region
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Maximum bytes the region holds, 0 once released
    pub fn capacity(&self) -> usize {
        if self.released {
            0
        } else {
            self.capacity
        }
    }

    /// Bytes of valid frame data
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no frame data has been written
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the region was released
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Frame data written so far
    pub fn as_slice(&self) -> &[u8] {
        if self.released {
            return &[];
        }
        // SAFETY: len <= capacity and slot bytes are always initialised.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The whole writable region; pair with [`Payload::set_len`]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let capacity = self.capacity();
        // SAFETY: exclusive access through &mut self; bytes are initialised.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), capacity) }
    }

    /// Set the number of valid bytes
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if self.released {
            return Err(FramePoolError::PayloadReleased);
        }
        if len > self.capacity {
            return Err(FramePoolError::invalid_parameter(
                "len",
                format!("{} exceeds payload capacity {}", len, self.capacity),
            ));
        }
        self.len = len;
        Ok(())
    }

    /// Copy `data` into the region at `offset`, extending the valid length
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if self.released {
            return Err(FramePoolError::PayloadReleased);
        }

        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.capacity)
            .ok_or_else(|| {
                FramePoolError::invalid_parameter(
                    "data",
                    format!(
                        "{} bytes at offset {} exceed payload capacity {}",
                        data.len(),
                        offset,
                        self.capacity
                    ),
                )
            })?;

        self.as_mut_slice()[offset..end].copy_from_slice(data);
        self.len = self.len.max(end);
        Ok(())
    }

    /// Detach the payload once its bytes are no longer needed
    ///
    /// May be called at most once; a second call fails with
    /// [`FramePoolError::PayloadReleased`]. The slot itself returns to the
    /// pool when the frame is torn down, since the frame object lives in it.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(FramePoolError::PayloadReleased);
        }
        self.released = true;
        self.len = 0;
        Ok(())
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        // SAFETY: a slot with an attached payload is never reclaimed, so it
        // is still allocated here.
        unsafe { SlotHeader::at(self.slot) }.detach_payload();
    }
}
