//! Local-store accelerator memory.
//!
//! Models a co-processor with its own addressable memory: every upload and
//! download is a real copy, so stale-copy bugs in kernels or in the arbiter
//! show up as wrong numbers rather than passing silently.

use crate::backend::{DevicePtr, HostRegion, MemoryBackend};
use crate::error::{MemoryError, Result};
use crate::tag::{MemId, MemoryTag};
use log::trace;
use std::collections::HashMap;
use std::sync::Mutex;

/// Store allocations are made of u64 words so every element type we hold
/// (f32, f64, u32) is suitably aligned.
type Word = u64;

fn words_for(bytes: usize) -> usize {
    bytes.div_ceil(std::mem::size_of::<Word>())
}

/// Backend for [`MemoryTag::LocalStore`].
#[derive(Debug, Default)]
pub struct LocalStoreBackend {
    store: Mutex<HashMap<MemId, Box<[Word]>>>,
}

impl LocalStoreBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks currently holding a local-store allocation.
    pub fn allocation_count(&self) -> usize {
        self.store.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn with_store<R>(
        &self,
        id: MemId,
        f: impl FnOnce(&mut HashMap<MemId, Box<[Word]>>) -> R,
    ) -> Result<R> {
        let mut store = self.store.lock().map_err(|_| MemoryError::Transfer {
            tag: MemoryTag::LocalStore,
            id,
            message: "local store poisoned".to_string(),
        })?;
        Ok(f(&mut store))
    }

    fn ensure<'a>(
        store: &'a mut HashMap<MemId, Box<[Word]>>,
        id: MemId,
        bytes: usize,
    ) -> &'a mut Box<[Word]> {
        let words = words_for(bytes);
        let slot = store
            .entry(id)
            .or_insert_with(|| vec![0; words].into_boxed_slice());
        if slot.len() < words {
            *slot = vec![0; words].into_boxed_slice();
        }
        slot
    }
}

impl MemoryBackend for LocalStoreBackend {
    fn tag(&self) -> MemoryTag {
        MemoryTag::LocalStore
    }

    fn upload(&self, id: MemId, region: HostRegion) -> Result<()> {
        trace!("local store: upload {} ({} bytes)", id, region.len());
        self.with_store(id, |store| {
            let slot = Self::ensure(store, id, region.len());
            let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut slot[..]);
            // SAFETY: the arbiter holds the block while transferring.
            let src = unsafe { region.as_bytes() };
            dst[..src.len()].copy_from_slice(src);
        })
    }

    fn download(&self, id: MemId, region: HostRegion) -> Result<()> {
        trace!("local store: download {} ({} bytes)", id, region.len());
        self.with_store(id, |store| match store.get(&id) {
            Some(slot) => {
                let src: &[u8] = bytemuck::cast_slice(&slot[..]);
                // SAFETY: the arbiter guarantees no host reader during download.
                let dst = unsafe { region.as_bytes_mut() };
                dst.copy_from_slice(&src[..dst.len()]);
                Ok(())
            }
            None => Err(MemoryError::Transfer {
                tag: MemoryTag::LocalStore,
                id,
                message: "block has no local-store allocation".to_string(),
            }),
        })?
    }

    fn alloc(&self, id: MemId, bytes: usize) -> Result<()> {
        self.with_store(id, |store| {
            Self::ensure(store, id, bytes);
        })
    }

    fn free(&self, id: MemId) {
        if let Ok(mut store) = self.store.lock() {
            store.remove(&id);
        }
    }

    fn device_ptr(&self, id: MemId, _region: HostRegion) -> Result<DevicePtr> {
        self.with_store(id, |store| {
            store
                .get_mut(&id)
                .map(|slot| DevicePtr::Addressable(slot.as_mut_ptr().cast::<u8>()))
        })?
        .ok_or(MemoryError::Transfer {
            tag: MemoryTag::LocalStore,
            id,
            message: "block has no local-store allocation".to_string(),
        })
    }
}
