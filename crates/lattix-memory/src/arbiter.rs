//! The memory arbiter: cross-device lock, ownership and transfer coordinator.
//!
//! Every numeric kernel locks its operands here before touching them. The
//! arbiter tracks which devices hold a valid copy of each block, moves data
//! through host memory when a device asks for a block it does not hold, and
//! enforces many-readers / single-writer exclusion across devices.
//!
//! Block state lives under one mutex. Bulk transfers run with the mutex
//! released while the block is flagged as transferring, so unrelated blocks
//! are never held up by a slow device copy.

use crate::backend::{DevicePtr, HostMemoryBackend, HostRegion, MemoryBackend};
use crate::error::{MemoryError, Result};
use crate::tag::{LockMode, MemId, MemoryTag};
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};

/// Per-block ownership and lock state.
#[derive(Debug)]
struct MemoryBlock {
    /// Device that last wrote the block and so holds the authoritative copy.
    writer: Option<MemoryTag>,
    /// Devices holding a valid copy.
    readers: [bool; MemoryTag::COUNT],
    /// Read locks currently held, per device.
    read_locks: [usize; MemoryTag::COUNT],
    /// Device holding the write lock.
    write_lock: Option<MemoryTag>,
    /// Writers waiting for the lock.
    pending_writers: usize,
    /// Devices holding an allocation for this block.
    allocated: [bool; MemoryTag::COUNT],
    transferring: bool,
}

impl MemoryBlock {
    fn new() -> Self {
        let mut readers = [false; MemoryTag::COUNT];
        readers[MemoryTag::Cpu.index()] = true;
        let mut allocated = [false; MemoryTag::COUNT];
        allocated[MemoryTag::Cpu.index()] = true;
        Self {
            writer: None,
            readers,
            read_locks: [0; MemoryTag::COUNT],
            write_lock: None,
            pending_writers: 0,
            allocated,
            transferring: false,
        }
    }

    fn read_count(&self) -> usize {
        self.read_locks.iter().sum()
    }

    fn is_locked(&self) -> bool {
        self.read_count() > 0
            || self.write_lock.is_some()
            || self.pending_writers > 0
            || self.transferring
    }

    fn holds_valid(&self, tag: MemoryTag) -> bool {
        self.readers[tag.index()]
    }

    /// Device to copy from when `tag` needs fresh contents. Host first, since
    /// a host copy needs no download.
    fn source(&self) -> Option<MemoryTag> {
        if self.holds_valid(MemoryTag::Cpu) {
            return Some(MemoryTag::Cpu);
        }
        self.writer
            .filter(|w| self.holds_valid(*w))
            .or_else(|| MemoryTag::ALL.into_iter().find(|t| self.holds_valid(*t)))
    }

    fn other_device_reading(&self, tag: MemoryTag) -> bool {
        MemoryTag::ALL
            .into_iter()
            .any(|t| t != tag && self.read_locks[t.index()] > 0)
    }
}

/// Snapshot of a block's state, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStatus {
    pub writer: Option<MemoryTag>,
    pub readers: Vec<MemoryTag>,
    pub read_count: usize,
    pub write_locked: bool,
}

/// Coordinator for every registered memory block.
///
/// Shared through `Arc`; all methods take `&self`.
pub struct MemoryArbiter {
    blocks: Mutex<HashMap<MemId, MemoryBlock>>,
    changed: Condvar,
    backends: RwLock<HashMap<MemoryTag, Arc<dyn MemoryBackend>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for MemoryArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryArbiter")
            .field("blocks", &self.block_count())
            .field("devices", &self.registered_devices())
            .finish()
    }
}

impl Default for MemoryArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryArbiter {
    /// Create an arbiter with the host backend registered.
    pub fn new() -> Self {
        let mut backends: HashMap<MemoryTag, Arc<dyn MemoryBackend>> = HashMap::new();
        backends.insert(MemoryTag::Cpu, Arc::new(HostMemoryBackend));
        Self {
            blocks: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
            backends: RwLock::new(backends),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a shared arbiter.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register (or replace) the backend for its device.
    pub fn register_backend(&self, backend: Arc<dyn MemoryBackend>) {
        let tag = backend.tag();
        debug!("memory arbiter: registering backend for {}", tag);
        self.backends
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tag, backend);
    }

    /// Whether a backend is registered for `tag`.
    pub fn has_backend(&self, tag: MemoryTag) -> bool {
        self.backends
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&tag)
    }

    /// Devices with a registered backend.
    pub fn registered_devices(&self) -> Vec<MemoryTag> {
        let backends = self.backends.read().unwrap_or_else(|e| e.into_inner());
        MemoryTag::ALL
            .into_iter()
            .filter(|t| backends.contains_key(t))
            .collect()
    }

    fn backend(&self, tag: MemoryTag) -> Result<Arc<dyn MemoryBackend>> {
        self.backends
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&tag)
            .cloned()
            .ok_or(MemoryError::NoBackend(tag))
    }

    fn state(&self) -> MutexGuard<'_, HashMap<MemId, MemoryBlock>> {
        // A panic while holding the lock is a lock-discipline violation; the
        // table itself is still consistent.
        self.blocks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, HashMap<MemId, MemoryBlock>>,
    ) -> MutexGuard<'a, HashMap<MemId, MemoryBlock>> {
        self.changed.wait(guard).unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new block whose only valid copy is in host memory.
    pub fn add_memblock(&self) -> MemId {
        let id = MemId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let previous = self.state().insert(id, MemoryBlock::new());
        assert!(previous.is_none(), "memory block {} registered twice", id);
        trace!("memory arbiter: added block {}", id);
        id
    }

    /// Unregister a block and free its device allocations.
    ///
    /// # Panics
    ///
    /// Panics if the block is unknown or still locked.
    pub fn remove_memblock(&self, id: MemId) {
        let block = {
            let mut blocks = self.state();
            let locked = match blocks.get(&id) {
                Some(block) => block.is_locked(),
                None => panic!("removing unregistered memory block {}", id),
            };
            assert!(!locked, "removing memory block {} while it is locked", id);
            blocks.remove(&id)
        };
        if let Some(block) = block {
            for tag in MemoryTag::ALL {
                if block.allocated[tag.index()]
                    && let Ok(backend) = self.backend(tag)
                {
                    backend.free(id);
                }
            }
        }
        trace!("memory arbiter: removed block {}", id);
    }

    /// Number of registered blocks.
    pub fn block_count(&self) -> usize {
        self.state().len()
    }

    /// Current state of a block, or `None` if it is not registered.
    pub fn status(&self, id: MemId) -> Option<BlockStatus> {
        self.state().get(&id).map(|b| BlockStatus {
            writer: b.writer,
            readers: MemoryTag::ALL
                .into_iter()
                .filter(|t| b.holds_valid(*t))
                .collect(),
            read_count: b.read_count(),
            write_locked: b.write_lock.is_some(),
        })
    }

    /// Acquire a read lock on `id` for `tag`, transferring a valid copy to
    /// the device first if it has none.
    ///
    /// A waiting writer holds off new readers, except on a device that still
    /// holds a read lock on the block: nested reads there are granted. Once
    /// that device's read count drops to zero its next read queues behind
    /// the writer, so a writer waits at most for the reads already open.
    pub fn read(&self, tag: MemoryTag, id: MemId, region: HostRegion) -> Result<DevicePtr> {
        self.lock(LockMode::ReadOnly, tag, id, region)
    }

    /// Acquire the exclusive write lock on `id` for `tag`, with valid
    /// contents on the device.
    pub fn write(&self, tag: MemoryTag, id: MemId, region: HostRegion) -> Result<DevicePtr> {
        self.lock(LockMode::ReadWrite, tag, id, region)
    }

    /// Acquire a lock on `id` for `tag` in the given mode.
    ///
    /// Blocks until the lock can be granted. The returned pointer stays valid
    /// until the matching release.
    ///
    /// # Panics
    ///
    /// Panics if the block is not registered.
    pub fn lock(
        &self,
        mode: LockMode,
        tag: MemoryTag,
        id: MemId,
        region: HostRegion,
    ) -> Result<DevicePtr> {
        let backend = self.backend(tag)?;
        if mode.is_write() {
            self.acquire_write(mode, &backend, id, region)
        } else {
            self.acquire_read(&backend, id, region)
        }
    }

    /// Release the lock acquired with `mode`.
    pub fn unlock(&self, mode: LockMode, tag: MemoryTag, id: MemId) {
        if mode.is_write() {
            self.release_write(id);
        } else {
            self.release_read(id, tag);
        }
    }

    fn acquire_read(
        &self,
        backend: &Arc<dyn MemoryBackend>,
        id: MemId,
        region: HostRegion,
    ) -> Result<DevicePtr> {
        let tag = backend.tag();
        let mut blocks = self.state();
        loop {
            let block = blocks
                .get(&id)
                .unwrap_or_else(|| panic!("read lock on unregistered memory block {}", id));
            let reentrant = block.read_locks[tag.index()] > 0;
            let blocked = block.transferring
                || block.write_lock.is_some()
                || (block.pending_writers > 0 && !reentrant);
            if !blocked {
                break;
            }
            blocks = self.wait(blocks);
        }

        let block = blocks.get_mut(&id).expect("block checked above");
        block.read_locks[tag.index()] += 1;
        if block.holds_valid(tag) {
            drop(blocks);
            return backend.device_ptr(id, region).inspect_err(|_| {
                self.release_read(id, tag);
            });
        }

        let source = block.source();
        block.transferring = true;
        drop(blocks);

        debug!(
            "memory arbiter: read transfer of {} ({} bytes) {:?} -> {}",
            id,
            region.len(),
            source,
            tag
        );
        let transferred = self.transfer(source, backend, id, region);

        let mut blocks = self.state();
        let block = blocks.get_mut(&id).expect("locked block cannot be removed");
        block.transferring = false;
        match transferred {
            Ok(()) => {
                block.readers[MemoryTag::Cpu.index()] = true;
                block.readers[tag.index()] = true;
                block.allocated[tag.index()] = true;
                block.writer = None;
                drop(blocks);
                self.changed.notify_all();
                backend.device_ptr(id, region).inspect_err(|_| {
                    self.release_read(id, tag);
                })
            }
            Err(err) => {
                block.read_locks[tag.index()] -= 1;
                drop(blocks);
                self.changed.notify_all();
                Err(err)
            }
        }
    }

    fn acquire_write(
        &self,
        mode: LockMode,
        backend: &Arc<dyn MemoryBackend>,
        id: MemId,
        region: HostRegion,
    ) -> Result<DevicePtr> {
        let tag = backend.tag();
        let mut blocks = self.state();
        blocks
            .get_mut(&id)
            .unwrap_or_else(|| panic!("write lock on unregistered memory block {}", id))
            .pending_writers += 1;
        loop {
            let block = blocks.get(&id).expect("pending writer keeps block alive");
            let blocked = block.transferring
                || block.write_lock.is_some()
                || block.other_device_reading(tag);
            if !blocked {
                break;
            }
            blocks = self.wait(blocks);
        }

        let block = blocks.get_mut(&id).expect("block checked above");
        block.pending_writers -= 1;
        block.write_lock = Some(tag);

        let needs_copy = mode == LockMode::ReadWrite && !block.holds_valid(tag);
        let needs_alloc = !block.allocated[tag.index()];
        let source = block.source();
        if needs_copy || needs_alloc {
            block.transferring = true;
        }
        drop(blocks);

        let prepared = if needs_copy {
            debug!(
                "memory arbiter: write transfer of {} ({} bytes) {:?} -> {}",
                id,
                region.len(),
                source,
                tag
            );
            self.transfer(source, backend, id, region)
        } else if needs_alloc {
            trace!("memory arbiter: allocating {} on {}", id, tag);
            backend.alloc(id, region.len())
        } else {
            Ok(())
        };

        let mut blocks = self.state();
        let block = blocks.get_mut(&id).expect("locked block cannot be removed");
        block.transferring = false;
        let result = match prepared {
            Ok(()) => {
                block.readers = [false; MemoryTag::COUNT];
                block.readers[tag.index()] = true;
                block.allocated[tag.index()] = true;
                if needs_copy {
                    block.allocated[MemoryTag::Cpu.index()] = true;
                }
                block.writer = Some(tag);
                Ok(())
            }
            Err(err) => {
                block.write_lock = None;
                Err(err)
            }
        };
        drop(blocks);
        self.changed.notify_all();

        result?;
        backend.device_ptr(id, region).inspect_err(|_| {
            self.release_write(id);
        })
    }

    /// Move a valid copy from `source` to the device of `target`, always via
    /// host memory.
    fn transfer(
        &self,
        source: Option<MemoryTag>,
        target: &Arc<dyn MemoryBackend>,
        id: MemId,
        region: HostRegion,
    ) -> Result<()> {
        let source = source.ok_or_else(|| MemoryError::Transfer {
            tag: target.tag(),
            id,
            message: "no device holds a valid copy".to_string(),
        })?;
        if source != MemoryTag::Cpu {
            self.backend(source)?.download(id, region)?;
        }
        if target.tag() != MemoryTag::Cpu {
            target.upload(id, region)?;
        }
        Ok(())
    }

    /// Release one read lock held by `tag`.
    ///
    /// # Panics
    ///
    /// Panics if `tag` holds no read lock on the block.
    pub fn release_read(&self, id: MemId, tag: MemoryTag) {
        let mut blocks = self.state();
        let block = blocks
            .get_mut(&id)
            .unwrap_or_else(|| panic!("read release on unregistered memory block {}", id));
        assert!(
            block.read_locks[tag.index()] > 0,
            "read release on block {} without a read lock held by {}",
            id,
            tag
        );
        block.read_locks[tag.index()] -= 1;
        drop(blocks);
        self.changed.notify_all();
    }

    /// Release the write lock.
    ///
    /// # Panics
    ///
    /// Panics if the block is not write-locked.
    pub fn release_write(&self, id: MemId) {
        let mut blocks = self.state();
        let block = blocks
            .get_mut(&id)
            .unwrap_or_else(|| panic!("write release on unregistered memory block {}", id));
        assert!(
            block.write_lock.is_some(),
            "write release on block {} without a write lock",
            id
        );
        block.write_lock = None;
        drop(blocks);
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalStoreBackend;

    fn region_of(data: &mut [f64]) -> HostRegion {
        unsafe { HostRegion::new(data.as_mut_ptr().cast(), std::mem::size_of_val(data)) }
    }

    #[test]
    fn new_block_is_valid_on_host_only() {
        let arbiter = MemoryArbiter::new();
        let id = arbiter.add_memblock();
        let status = arbiter.status(id).unwrap();
        assert_eq!(status.readers, vec![MemoryTag::Cpu]);
        assert_eq!(status.writer, None);
        assert_eq!(status.read_count, 0);
        arbiter.remove_memblock(id);
        assert_eq!(arbiter.block_count(), 0);
    }

    #[test]
    fn ids_are_unique_for_empty_blocks() {
        let arbiter = MemoryArbiter::new();
        let a = arbiter.add_memblock();
        let b = arbiter.add_memblock();
        assert_ne!(a, b);
    }

    #[test]
    fn lock_without_backend_is_an_error() {
        let arbiter = MemoryArbiter::new();
        let id = arbiter.add_memblock();
        let mut data = vec![0.0; 4];
        let err = arbiter.read(MemoryTag::Wgpu, id, region_of(&mut data));
        assert!(matches!(err, Err(MemoryError::NoBackend(MemoryTag::Wgpu))));
        assert_eq!(arbiter.status(id).unwrap().read_count, 0);
    }

    #[test]
    fn host_read_returns_host_pointer() {
        let arbiter = MemoryArbiter::new();
        let id = arbiter.add_memblock();
        let mut data = vec![1.0; 4];
        let region = region_of(&mut data);
        let ptr = arbiter.read(MemoryTag::Cpu, id, region).unwrap();
        assert_eq!(ptr, DevicePtr::Addressable(region.as_ptr()));
        assert_eq!(arbiter.status(id).unwrap().read_count, 1);
        arbiter.release_read(id, MemoryTag::Cpu);
        assert_eq!(arbiter.status(id).unwrap().read_count, 0);
    }

    #[test]
    fn write_invalidates_other_copies() {
        let arbiter = MemoryArbiter::new();
        arbiter.register_backend(Arc::new(LocalStoreBackend::new()));
        let id = arbiter.add_memblock();
        let mut data = vec![2.0; 8];
        let region = region_of(&mut data);

        arbiter.read(MemoryTag::LocalStore, id, region).unwrap();
        arbiter.release_read(id, MemoryTag::LocalStore);
        assert_eq!(
            arbiter.status(id).unwrap().readers,
            vec![MemoryTag::Cpu, MemoryTag::LocalStore]
        );

        arbiter.write(MemoryTag::LocalStore, id, region).unwrap();
        arbiter.release_write(id);
        let status = arbiter.status(id).unwrap();
        assert_eq!(status.readers, vec![MemoryTag::LocalStore]);
        assert_eq!(status.writer, Some(MemoryTag::LocalStore));
    }

    #[test]
    #[should_panic(expected = "without a read lock")]
    fn unmatched_read_release_panics() {
        let arbiter = MemoryArbiter::new();
        let id = arbiter.add_memblock();
        arbiter.release_read(id, MemoryTag::Cpu);
    }

    #[test]
    #[should_panic(expected = "while it is locked")]
    fn removing_locked_block_panics() {
        let arbiter = MemoryArbiter::new();
        let id = arbiter.add_memblock();
        let mut data = vec![0.0; 2];
        arbiter.write(MemoryTag::Cpu, id, region_of(&mut data)).unwrap();
        arbiter.remove_memblock(id);
    }
}
