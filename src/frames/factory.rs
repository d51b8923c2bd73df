//! Typed frame factory bound to one buffer pool

use std::{
    marker::PhantomData,
    mem,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    allocators::{Allocator, BUFFER_ALIGNMENT},
    buffers::{BufferPool, BufferPoolConfig},
    error::{FramePoolError, Result},
};

use super::{
    handle::{FrameCell, FrameHandle},
    object::{FrameObject, Payload},
};

/// Produces [`FrameHandle`]s of one frame object type from one pool
///
/// Every outstanding handle holds an `Arc` to its factory, so the factory,
/// its pool and the pool's allocator outlive any registry that dropped them.
pub struct TypedFrameFactory<F: FrameObject> {
    pool: Arc<BufferPool>,
    /// Handles produced and not yet torn down
    outstanding: AtomicUsize,
    _marker: PhantomData<fn() -> F>,
}

impl<F: FrameObject> TypedFrameFactory<F> {
    /// Object-region bytes a pool needs to host frames of type `F`
    pub const fn required_object_size() -> usize {
        mem::size_of::<FrameCell<F>>()
    }

    /// Bind a factory to an existing pool
    ///
    /// Fails with [`FramePoolError::UnsupportedLayout`] when the pool's
    /// object region cannot hold `F`.
    pub fn new(pool: Arc<BufferPool>) -> Result<Arc<Self>> {
        let needed = Self::required_object_size();
        let available = pool.layout().object_capacity();
        if needed > available {
            return Err(FramePoolError::unsupported_layout(format!(
                "{} needs {} object bytes, pool '{}' reserves {}",
                std::any::type_name::<F>(),
                needed,
                pool.config().name,
                available
            )));
        }

        let align = mem::align_of::<FrameCell<F>>();
        if align > BUFFER_ALIGNMENT {
            return Err(FramePoolError::unsupported_layout(format!(
                "{} requires {}-byte alignment, slots provide {}",
                std::any::type_name::<F>(),
                align,
                BUFFER_ALIGNMENT
            )));
        }

        Ok(Arc::new(Self {
            pool,
            outstanding: AtomicUsize::new(0),
            _marker: PhantomData,
        }))
    }

    /// Create a factory with its own pool sized for `F`
    pub fn with_capacity(
        name: impl Into<String>,
        payload_capacity: usize,
        allocator: Arc<dyn Allocator>,
    ) -> Result<Arc<Self>> {
        let config = BufferPoolConfig::new(name)
            .with_payload_capacity(payload_capacity)
            .with_object_size(Self::required_object_size());
        Self::new(Arc::new(BufferPool::new(config, allocator)?))
    }

    /// Lease a slot and construct a frame in it
    ///
    /// Returns `Ok(None)` when the pool is exhausted: the caller drops the
    /// frame. Construction errors are returned after the slot is reclaimed,
    /// unless the constructor kept its payload alive elsewhere; that slot
    /// stays leased for good.
    pub fn acquire_frame(self: &Arc<Self>, init: F::Init) -> Result<Option<FrameHandle<F>>> {
        let lease = match self.pool.acquire_slot() {
            Ok(lease) => lease,
            Err(err) if err.is_exhaustion() => return Ok(None),
            Err(err) => return Err(err),
        };

        let payload = Payload::attach(&lease);
        let frame = match F::construct(payload, init) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!(
                    "constructing {} in pool '{}' failed: {}",
                    std::any::type_name::<F>(),
                    self.pool.config().name,
                    err
                );
                self.pool.scoped_lock().reclaim_or_leak(lease);
                return Err(err);
            }
        };

        let cell_ptr = lease.object_ptr().cast::<FrameCell<F>>();
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        let cell = FrameCell::new(lease, Arc::clone(self), frame);

        // SAFETY: `new` checked the object region fits an aligned FrameCell,
        // and the lease moved into the cell owns that region.
        Ok(Some(unsafe { FrameHandle::emplace(cell_ptr, cell) }))
    }

    /// Called once by each handle's destroy action after teardown
    pub(crate) fn release_keep_alive(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "frame keep-alive released twice");
    }

    /// The pool this factory draws from
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Maximum payload bytes per frame
    pub fn payload_capacity(&self) -> usize {
        self.pool.payload_capacity()
    }

    /// Handles produced and not yet torn down
    pub fn outstanding_frames(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

impl<F: FrameObject> std::fmt::Debug for TypedFrameFactory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedFrameFactory")
            .field("frame", &std::any::type_name::<F>())
            .field("pool", &self.pool.config().name)
            .field("outstanding", &self.outstanding_frames())
            .finish()
    }
}
