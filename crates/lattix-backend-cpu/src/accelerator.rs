//! Local-store accelerator backend.
//!
//! Kernels run on the accelerator's own memory: every operand is locked on
//! [`MemoryTag::LocalStore`], so the arbiter uploads host data before a
//! kernel and the host sees results only after a download. A solve on this
//! backend exercises the full cross-device protocol.

use lattix_memory::{LocalStoreBackend, MemoryArbiter, MemoryTag};
use lattix_solver::NumericBackend;
use std::sync::Arc;

/// Backend computing in the local store.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceleratorBackend;

impl AcceleratorBackend {
    /// Make sure `arbiter` can reach the local store, registering a
    /// [`LocalStoreBackend`] if none is present.
    pub fn new(arbiter: &Arc<MemoryArbiter>) -> Self {
        if !arbiter.has_backend(MemoryTag::LocalStore) {
            log::debug!("registering local-store memory backend");
            arbiter.register_backend(Arc::new(LocalStoreBackend::new()));
        }
        Self
    }
}

impl NumericBackend for AcceleratorBackend {
    fn name(&self) -> &str {
        "accelerator"
    }

    fn memory(&self) -> MemoryTag {
        MemoryTag::LocalStore
    }
}
