//! Reference-counted handles to frames living inside pool slots

use std::{
    fmt,
    marker::PhantomData,
    mem::ManuallyDrop,
    ops::Deref,
    ptr::NonNull,
    sync::{
        atomic::{self, AtomicUsize, Ordering},
        Arc,
    },
};

use crate::buffers::{PoolGuard, SlotLease};

use super::{factory::TypedFrameFactory, object::FrameObject};

/// Clone counts above this abort, as `Arc` does
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// In-place state stored in a slot's object region
///
/// The reference count lives next to the frame, so a handle needs no heap
/// allocation of its own.
pub(crate) struct FrameCell<F: FrameObject> {
    refs: AtomicUsize,
    lease: ManuallyDrop<SlotLease>,
    factory: ManuallyDrop<Arc<TypedFrameFactory<F>>>,
    frame: ManuallyDrop<F>,
}

impl<F: FrameObject> FrameCell<F> {
    pub(crate) fn new(lease: SlotLease, factory: Arc<TypedFrameFactory<F>>, frame: F) -> Self {
        Self {
            refs: AtomicUsize::new(1),
            lease: ManuallyDrop::new(lease),
            factory: ManuallyDrop::new(factory),
            frame: ManuallyDrop::new(frame),
        }
    }
}

/// Shared handle to a live frame
///
/// Cloning adds a reference. When the last handle is dropped the frame is
/// torn down under its pool's lock, the slot goes back to the free list, and
/// the handle's hold on its factory is released.
pub struct FrameHandle<F: FrameObject> {
    cell: NonNull<FrameCell<F>>,
    _marker: PhantomData<FrameCell<F>>,
}

// SAFETY: handles share `&F` across threads and the last one drops `F`.
unsafe impl<F: FrameObject> Send for FrameHandle<F> {}
unsafe impl<F: FrameObject> Sync for FrameHandle<F> {}

impl<F: FrameObject> FrameHandle<F> {
    /// Write `cell` into the lease's object region and wrap it
    ///
    /// # Safety
    /// `ptr` must be the object region of the slot owned by the lease inside
    /// `cell`, suitably sized and aligned for `FrameCell<F>`.
    pub(crate) unsafe fn emplace(ptr: NonNull<FrameCell<F>>, cell: FrameCell<F>) -> Self {
        ptr.as_ptr().write(cell);
        Self {
            cell: ptr,
            _marker: PhantomData,
        }
    }

    fn cell(&self) -> &FrameCell<F> {
        // SAFETY: the cell lives as long as any handle.
        unsafe { self.cell.as_ref() }
    }

    /// Mutable access while this is the only handle
    ///
    /// A [`Payload`](super::Payload) moved out of the frame keeps its slot
    /// leased until the view is dropped; the slot is not reused meanwhile.
    pub fn get_mut(this: &mut Self) -> Option<&mut F> {
        if this.cell().refs.load(Ordering::Acquire) == 1 {
            // SAFETY: unique handle and exclusive borrow of it.
            Some(unsafe { &mut *(*this.cell.as_ptr()).frame })
        } else {
            None
        }
    }

    /// Number of handles sharing this frame
    pub fn ref_count(this: &Self) -> usize {
        this.cell().refs.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same frame
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.cell == other.cell
    }

    /// Start address of the slot holding this frame
    pub fn slot_address(this: &Self) -> NonNull<u8> {
        this.cell().lease.base()
    }

    /// Lease generation of the slot holding this frame
    pub fn generation(this: &Self) -> u64 {
        this.cell().lease.generation()
    }

    /// Factory that produced this frame
    pub fn factory(this: &Self) -> &Arc<TypedFrameFactory<F>> {
        &this.cell().factory
    }

    /// Tear the frame down and return its slot
    ///
    /// The slot is reclaimed and the factory hold released even if the
    /// frame's `Drop` panics.
    ///
    /// # Safety
    /// Called exactly once, by the handle that dropped the count to zero.
    unsafe fn destroy(cell: NonNull<FrameCell<F>>) {
        let cell = cell.as_ptr();
        let keep_alive = KeepAlive(ManuallyDrop::take(&mut (*cell).factory));
        let lease = ManuallyDrop::take(&mut (*cell).lease);

        // Any acquire on this pool waits here until teardown is over.
        let _reclaim = Reclaim {
            guard: keep_alive.0.pool().scoped_lock(),
            lease: Some(lease),
        };
        ManuallyDrop::drop(&mut (*cell).frame);
    }
}

/// Releases a handle's hold on its factory when dropped
struct KeepAlive<F: FrameObject>(Arc<TypedFrameFactory<F>>);

impl<F: FrameObject> Drop for KeepAlive<F> {
    fn drop(&mut self) {
        self.0.release_keep_alive();
    }
}

/// Returns a torn-down frame's slot under the pool lock when dropped
struct Reclaim<'a> {
    guard: PoolGuard<'a>,
    lease: Option<SlotLease>,
}

impl Drop for Reclaim<'_> {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.guard.reclaim_or_leak(lease);
        }
    }
}

impl<F: FrameObject> Clone for FrameHandle<F> {
    fn clone(&self) -> Self {
        let old = self.cell().refs.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            std::process::abort();
        }
        Self {
            cell: self.cell,
            _marker: PhantomData,
        }
    }
}

impl<F: FrameObject> Drop for FrameHandle<F> {
    fn drop(&mut self) {
        if self.cell().refs.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        atomic::fence(Ordering::Acquire);
        // SAFETY: this was the last handle.
        unsafe { Self::destroy(self.cell) };
    }
}

impl<F: FrameObject> Deref for FrameHandle<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.cell().frame
    }
}

impl<F: FrameObject + fmt::Debug> fmt::Debug for FrameHandle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHandle")
            .field("slot", &Self::slot_address(self))
            .field("generation", &Self::generation(self))
            .field("refs", &Self::ref_count(self))
            .field("frame", &**self)
            .finish()
    }
}
