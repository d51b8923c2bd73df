//! Slot geometry, header and lease tokens
//!
//! ```text
//! ┌────────────┬──────────────────────┬─────────┬─────────────────────┐
//! │ SlotHeader │ frame object region  │ padding │ payload (16-aligned)│
//! │  16 bytes  │  frame_obj_size      │  0..15  │  payload capacity   │
//! └────────────┴──────────────────────┴─────────┴─────────────────────┘
//! ```

use std::{
    ptr::NonNull,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use crate::allocators::{align_up, BUFFER_ALIGNMENT};

/// Bytes reserved at the start of every slot for its [`SlotHeader`]
pub const SLOT_HEADER_SIZE: usize = 16;

/// Per-slot ownership state, stored in the slot itself
#[repr(C, align(16))]
#[derive(Debug)]
pub(crate) struct SlotHeader {
    /// Bumped on every lease; a reclaim must present the current value
    generation: AtomicU64,
    /// Set while the slot belongs to a live lease
    leased: AtomicBool,
    /// Set while a `Payload` view of this slot exists
    payload: AtomicBool,
}

const _: () = assert!(std::mem::size_of::<SlotHeader>() == SLOT_HEADER_SIZE);
const _: () = assert!(std::mem::align_of::<SlotHeader>() <= BUFFER_ALIGNMENT);

impl SlotHeader {
    /// Write a fresh header at the start of a newly allocated slot
    ///
    /// # Safety
    /// `base` must point to at least `SLOT_HEADER_SIZE` writable bytes
    /// aligned to `BUFFER_ALIGNMENT` that nobody else references.
    pub(crate) unsafe fn init<'a>(base: NonNull<u8>) -> &'a SlotHeader {
        let header = base.cast::<SlotHeader>();
        header.as_ptr().write(SlotHeader {
            generation: AtomicU64::new(0),
            leased: AtomicBool::new(false),
            payload: AtomicBool::new(false),
        });
        &*header.as_ptr()
    }

    /// Reinterpret the start of an initialised slot as its header
    ///
    /// # Safety
    /// `base` must be the start of a slot previously set up with `init`
    /// and not yet deallocated.
    pub(crate) unsafe fn at<'a>(base: NonNull<u8>) -> &'a SlotHeader {
        &*base.cast::<SlotHeader>().as_ptr()
    }

    /// Mark the slot leased and return its new generation
    pub(crate) fn lease(&self) -> u64 {
        let was_leased = self.leased.swap(true, Ordering::AcqRel);
        assert!(!was_leased, "slot handed out while still leased");
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark the slot idle; panics on double reclaim or stale generation
    pub(crate) fn unlease(&self, generation: u64) {
        let current = self.generation.load(Ordering::Acquire);
        assert_eq!(
            current, generation,
            "reclaim of stale slot lease (generation {}, slot at {})",
            generation, current
        );
        let was_leased = self.leased.swap(false, Ordering::AcqRel);
        assert!(was_leased, "double reclaim of slot generation {}", generation);
    }

    /// Record that a payload view of this slot was handed out
    pub(crate) fn attach_payload(&self) {
        let was_attached = self.payload.swap(true, Ordering::AcqRel);
        assert!(!was_attached, "slot payload handed out twice");
    }

    /// Record that the payload view of this slot was dropped
    pub(crate) fn detach_payload(&self) {
        self.payload.store(false, Ordering::Release);
    }

    /// Whether a payload view of this slot is still alive somewhere
    pub(crate) fn payload_attached(&self) -> bool {
        self.payload.load(Ordering::Acquire)
    }

    pub(crate) fn is_leased(&self) -> bool {
        self.leased.load(Ordering::Acquire)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Byte geometry shared by every slot of one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    /// Header plus frame object bytes
    pub object_region_size: usize,
    /// Offset of the payload from the slot start, always 16-byte aligned
    pub payload_offset: usize,
    /// Payload capacity in bytes
    pub payload_capacity: usize,
    /// Bytes allocated per slot
    pub total_size: usize,
}

impl SlotLayout {
    /// Compute the layout for a frame object size and payload capacity
    pub fn new(frame_obj_size: usize, payload_capacity: usize) -> Self {
        let object_region_size = SLOT_HEADER_SIZE + frame_obj_size;
        Self {
            object_region_size,
            payload_offset: align_up(object_region_size, BUFFER_ALIGNMENT),
            payload_capacity,
            total_size: object_region_size + BUFFER_ALIGNMENT + payload_capacity,
        }
    }

    /// Bytes available to the frame object
    pub fn object_capacity(&self) -> usize {
        self.object_region_size - SLOT_HEADER_SIZE
    }
}

/// Proof of ownership of one leased slot
///
/// Not cloneable: the only way to give the slot back is to move the lease
/// into [`BufferPool::reclaim_slot`](super::BufferPool::reclaim_slot) or
/// [`PoolGuard::reclaim`](super::PoolGuard::reclaim). A lease that is
/// dropped instead leaks its slot until the pool is gone.
#[derive(Debug)]
#[must_use = "a slot lease must be reclaimed or its slot leaks"]
pub struct SlotLease {
    base: NonNull<u8>,
    generation: u64,
    layout: SlotLayout,
    /// Id of the pool that issued the lease
    pool_id: u64,
}

// SAFETY: the lease is the unique owner of its slot's bytes.
unsafe impl Send for SlotLease {}
unsafe impl Sync for SlotLease {}

impl SlotLease {
    pub(crate) fn new(base: NonNull<u8>, generation: u64, layout: SlotLayout, pool_id: u64) -> Self {
        Self {
            base,
            generation,
            layout,
            pool_id,
        }
    }

    /// Slot start address
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Generation this lease was issued for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Slot geometry
    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    /// Id of the pool that issued this lease
    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// Start of the frame object region, right after the header
    pub fn object_ptr(&self) -> NonNull<u8> {
        // SAFETY: the header is smaller than the slot.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(SLOT_HEADER_SIZE)) }
    }

    /// Start of the 16-byte aligned payload region
    pub fn payload_ptr(&self) -> NonNull<u8> {
        // SAFETY: payload_offset + payload_capacity <= total_size.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.layout.payload_offset)) }
    }

    /// Whether a payload view of this slot is still alive
    ///
    /// A slot whose payload escaped its frame cannot be reclaimed.
    pub fn payload_attached(&self) -> bool {
        self.header().payload_attached()
    }

    pub(crate) fn header(&self) -> &SlotHeader {
        // SAFETY: a live lease always refers to an initialised slot.
        unsafe { SlotHeader::at(self.base) }
    }
}
