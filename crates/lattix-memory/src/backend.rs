//! Memory backends: the per-device half of the arbiter.
//!
//! A backend knows how to move the bytes of a block between host memory and
//! its device. The arbiter decides *when* to move them; backends only decide
//! *how*.

use crate::error::Result;
use crate::tag::{MemId, MemoryTag};

/// The host memory of a block, handed to backends as transfer source or
/// destination.
#[derive(Debug, Clone, Copy)]
pub struct HostRegion {
    ptr: *mut u8,
    bytes: usize,
}

// SAFETY: a region is only dereferenced while the arbiter holds a lock on its
// block, which serialises access across threads.
unsafe impl Send for HostRegion {}
unsafe impl Sync for HostRegion {}

impl HostRegion {
    /// Describe `bytes` bytes of host memory starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `bytes` bytes for as long
    /// as the region is used by the arbiter or a backend, and must be aligned
    /// for the element type stored in it.
    pub unsafe fn new(ptr: *mut u8, bytes: usize) -> Self {
        Self { ptr, bytes }
    }

    /// Start of the region.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Size of the region in bytes.
    pub fn len(&self) -> usize {
        self.bytes
    }

    /// Whether the region is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// View the region as bytes.
    ///
    /// # Safety
    ///
    /// The caller must hold a lock on the block that prevents concurrent
    /// writes to the region.
    pub unsafe fn as_bytes<'a>(&self) -> &'a [u8] {
        if self.bytes == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.bytes) }
    }

    /// View the region as mutable bytes.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the region.
    pub unsafe fn as_bytes_mut<'a>(&self) -> &'a mut [u8] {
        if self.bytes == 0 {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.bytes) }
    }
}

/// Where a locked block lives on its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePtr {
    /// Memory the host can address directly.
    Addressable(*mut u8),
    /// An opaque device buffer, looked up by block id in its backend.
    Buffer(MemId),
}

impl DevicePtr {
    /// The host-addressable pointer, if any.
    pub fn addressable(self) -> Option<*mut u8> {
        match self {
            DevicePtr::Addressable(ptr) => Some(ptr),
            DevicePtr::Buffer(_) => None,
        }
    }
}

/// Device-specific transfer and allocation primitives.
pub trait MemoryBackend: Send + Sync {
    /// Device this backend manages.
    fn tag(&self) -> MemoryTag;

    /// Copy `region` from host memory into the device copy of `id`,
    /// allocating it if needed.
    fn upload(&self, id: MemId, region: HostRegion) -> Result<()>;

    /// Copy the device copy of `id` back into `region`.
    fn download(&self, id: MemId, region: HostRegion) -> Result<()>;

    /// Make sure the device holds an allocation of `bytes` bytes for `id`.
    /// Contents are unspecified.
    fn alloc(&self, id: MemId, bytes: usize) -> Result<()>;

    /// Release the device allocation of `id`, if any.
    fn free(&self, id: MemId);

    /// Pointer to the device copy of `id`.
    fn device_ptr(&self, id: MemId, region: HostRegion) -> Result<DevicePtr>;
}

/// Host memory: the staging area every other device transfers through.
#[derive(Debug, Default)]
pub struct HostMemoryBackend;

impl MemoryBackend for HostMemoryBackend {
    fn tag(&self) -> MemoryTag {
        MemoryTag::Cpu
    }

    fn upload(&self, _id: MemId, _region: HostRegion) -> Result<()> {
        Ok(())
    }

    fn download(&self, _id: MemId, _region: HostRegion) -> Result<()> {
        Ok(())
    }

    fn alloc(&self, _id: MemId, _bytes: usize) -> Result<()> {
        Ok(())
    }

    fn free(&self, _id: MemId) {}

    fn device_ptr(&self, _id: MemId, region: HostRegion) -> Result<DevicePtr> {
        Ok(DevicePtr::Addressable(region.as_ptr()))
    }
}
