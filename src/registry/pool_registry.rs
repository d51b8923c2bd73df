//! Frame class to pool registry

use std::{
    any::{type_name, Any},
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use parking_lot::Mutex;

use crate::{
    allocators::{megabytes, AlignedBufferAllocator, Allocator},
    buffers::{BufferPool, BufferPoolConfig, BufferPoolStats},
    config::FramePoolConfig,
    error::{FramePoolError, Result},
    frames::{FrameHandle, FrameObject, TypedFrameFactory},
};

use super::{
    key::{FrameClassKey, FrameType},
    sizing::{DefaultSizeEstimator, FrameSizeEstimator, PixelFormat, StreamProfile},
};

static GLOBAL: Mutex<Option<Arc<PoolRegistry>>> = parking_lot::const_mutex(None);

/// A shared pool and the factory bound to it
#[derive(Debug)]
struct RegistryEntry {
    pool: Arc<BufferPool>,
    /// `TypedFrameFactory<F>` for the type that created the entry
    factory: Arc<dyn Any + Send + Sync>,
    frame_object: &'static str,
}

#[derive(Debug, Default)]
struct RegistryState {
    pools: BTreeMap<FrameClassKey, RegistryEntry>,
    /// Every pool ever handed out, shared or not, for idle sweeps
    sweep: Vec<(FrameClassKey, Weak<BufferPool>)>,
}

/// Diagnostics for one live pool
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub key: FrameClassKey,
    pub name: String,
    /// Whether the registry shares this pool between requests
    pub shared: bool,
    pub frame_total_size: usize,
    pub idle_slots: usize,
    pub leased_slots: usize,
    pub stats: BufferPoolStats,
}

/// Lookup from `(frame type, max payload size)` to a pool and its factory
///
/// Holds the global policy: the allocator's byte budget and whether pools
/// are shared between requests for the same frame class.
#[derive(Debug)]
pub struct PoolRegistry {
    allocator: Arc<dyn Allocator>,
    state: Mutex<RegistryState>,
    reuse_enabled: AtomicBool,
    estimator: Arc<dyn FrameSizeEstimator>,
}

impl PoolRegistry {
    /// Create a registry whose pools draw from `allocator`
    pub fn new(allocator: Arc<dyn Allocator>) -> Self {
        Self {
            allocator,
            state: Mutex::new(RegistryState::default()),
            reuse_enabled: AtomicBool::new(true),
            estimator: Arc::new(DefaultSizeEstimator),
        }
    }

    /// Create a registry on the process-wide shared allocator
    pub fn with_shared_allocator() -> Self {
        Self::new(AlignedBufferAllocator::shared())
    }

    /// Replace the frame size estimator
    pub fn with_estimator(mut self, estimator: Arc<dyn FrameSizeEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// The process-wide registry, created on first use
    ///
    /// A newly created instance applies `FRAMEPOOL_*` environment overrides.
    pub fn global() -> Arc<PoolRegistry> {
        let mut global = GLOBAL.lock();
        if let Some(registry) = global.as_ref() {
            return Arc::clone(registry);
        }

        let registry = Arc::new(PoolRegistry::with_shared_allocator());
        match FramePoolConfig::from_env() {
            Ok(config) => registry.apply_config(&config),
            Err(err) => log::warn!("ignoring frame pool environment: {}", err),
        }
        *global = Some(Arc::clone(&registry));
        registry
    }

    /// Drop the process-wide registry; returns whether one existed
    ///
    /// Pools stay alive while outstanding frames or other holders
    /// reference them. The next [`PoolRegistry::global`] starts fresh.
    pub fn shutdown_global() -> bool {
        let registry = GLOBAL.lock().take();
        registry.is_some()
    }

    /// Factory for frames of type `F` in the class `(frame_type, max_payload_size)`
    ///
    /// With reuse enabled, equal keys share one pool. With reuse disabled,
    /// each call gets a fresh unshared pool. Requesting a different `F` for
    /// a shared key fails with [`FramePoolError::TypeMismatch`].
    pub fn get_or_create<F: FrameObject>(
        &self,
        frame_type: FrameType,
        max_payload_size: usize,
    ) -> Result<Arc<TypedFrameFactory<F>>> {
        if max_payload_size == 0 {
            return Err(FramePoolError::invalid_parameter(
                "max_payload_size",
                "must be greater than zero",
            ));
        }

        let key = FrameClassKey::new(frame_type, max_payload_size);
        let reuse = self.reuse_enabled();
        let mut state = self.state.lock();

        if reuse {
            if let Some(entry) = state.pools.get(&key) {
                return Arc::clone(&entry.factory)
                    .downcast::<TypedFrameFactory<F>>()
                    .map_err(|_| FramePoolError::TypeMismatch {
                        key: key.to_string(),
                        registered: entry.frame_object,
                        requested: type_name::<F>(),
                    });
            }
        }

        let name = if reuse {
            key.to_string()
        } else {
            format!("{}#{}", key, state.sweep.len())
        };
        let config = BufferPoolConfig::new(name)
            .with_payload_capacity(max_payload_size)
            .with_object_size(TypedFrameFactory::<F>::required_object_size());
        let pool = Arc::new(BufferPool::new(config, Arc::clone(&self.allocator))?);
        let factory = TypedFrameFactory::<F>::new(Arc::clone(&pool))?;

        state.sweep.push((key, Arc::downgrade(&pool)));
        if reuse {
            state.pools.insert(
                key,
                RegistryEntry {
                    pool,
                    factory: Arc::clone(&factory) as Arc<dyn Any + Send + Sync>,
                    frame_object: type_name::<F>(),
                },
            );
        }

        log::debug!(
            "registered {} pool for {} ({})",
            if reuse { "shared" } else { "unshared" },
            key,
            type_name::<F>()
        );
        Ok(factory)
    }

    /// [`get_or_create`](Self::get_or_create) sized by the estimator for a stream profile
    pub fn get_or_create_for_profile<F: FrameObject>(
        &self,
        profile: &StreamProfile,
    ) -> Result<Arc<TypedFrameFactory<F>>> {
        let size = self.estimator.estimate_profile(profile)?;
        self.get_or_create(profile.frame_type, size)
    }

    /// [`get_or_create`](Self::get_or_create) sized by the estimator for an image format
    pub fn get_or_create_for_format<F: FrameObject>(
        &self,
        frame_type: FrameType,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<Arc<TypedFrameFactory<F>>> {
        let size = self.estimator.estimate(format, width, height)?;
        self.get_or_create(frame_type, size)
    }

    /// Resolve the factory for a frame class and acquire a frame from it
    ///
    /// `Ok(None)` means the frame must be dropped: the budget is spent and
    /// no idle slot is available.
    pub fn acquire_frame<F: FrameObject>(
        &self,
        frame_type: FrameType,
        max_payload_size: usize,
        init: F::Init,
    ) -> Result<Option<FrameHandle<F>>> {
        self.get_or_create::<F>(frame_type, max_payload_size)?
            .acquire_frame(init)
    }

    /// Set the global byte ceiling in megabytes, 0 = unlimited
    ///
    /// Applies to later allocations only. Limits past the address space
    /// saturate to `usize::MAX` bytes.
    pub fn set_max_total_memory(&self, megabytes_limit: usize) {
        self.allocator.set_max_size(megabytes(megabytes_limit));
        log::debug!("frame pool budget set to {} MB", megabytes_limit);
    }

    /// Toggle sharing of pools between requests for the same frame class
    pub fn enable_reuse(&self, enabled: bool) {
        self.reuse_enabled.store(enabled, Ordering::Release);
        log::debug!("frame pool reuse {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn reuse_enabled(&self) -> bool {
        self.reuse_enabled.load(Ordering::Acquire)
    }

    /// Apply a loaded configuration
    pub fn apply_config(&self, config: &FramePoolConfig) {
        self.set_max_total_memory(config.max_total_memory_mb);
        self.enable_reuse(config.enable_reuse);
    }

    /// Hand every idle slot of every live pool back to the allocator
    ///
    /// Returns the bytes freed. Leased slots are untouched.
    pub fn free_idle_memory(&self) -> usize {
        let pools = self.live_pools();
        let freed: usize = pools.iter().map(|(_, pool)| pool.release_idle_slots()).sum();
        log::debug!("idle sweep over {} pools freed {} bytes", pools.len(), freed);
        freed
    }

    /// Upgrade the sweep list, pruning pools that are gone
    fn live_pools(&self) -> Vec<(FrameClassKey, Arc<BufferPool>)> {
        let mut state = self.state.lock();
        let mut live = Vec::with_capacity(state.sweep.len());
        state.sweep.retain(|(key, weak)| match weak.upgrade() {
            Some(pool) => {
                live.push((*key, pool));
                true
            }
            None => false,
        });
        live
    }

    /// Number of pools still alive, shared or not
    pub fn pool_count(&self) -> usize {
        self.state
            .lock()
            .sweep
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Number of shared frame classes
    pub fn registered_count(&self) -> usize {
        self.state.lock().pools.len()
    }

    /// Diagnostics for every live pool, in key order
    pub fn stats_snapshot(&self) -> Vec<PoolSnapshot> {
        let mut snapshots: Vec<_> = self
            .live_pools()
            .into_iter()
            .map(|(key, pool)| {
                let shared = self
                    .state
                    .lock()
                    .pools
                    .get(&key)
                    .map_or(false, |entry| Arc::ptr_eq(&entry.pool, &pool));
                let guard = pool.scoped_lock();
                let (idle_slots, leased_slots) = (guard.idle_count(), guard.leased_count());
                drop(guard);
                PoolSnapshot {
                    key,
                    name: pool.config().name.clone(),
                    shared,
                    frame_total_size: pool.frame_total_size(),
                    idle_slots,
                    leased_slots,
                    stats: pool.stats(),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.name.cmp(&b.name)));
        snapshots
    }

    /// The allocator every pool of this registry draws from
    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    /// Forget every shared frame class
    ///
    /// Pools with outstanding frames live on until those frames drop.
    pub fn clear(&self) {
        let pools = std::mem::take(&mut self.state.lock().pools);
        log::debug!("cleared {} frame classes", pools.len());
        drop(pools);
    }
}
