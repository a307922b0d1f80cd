//! Arbiter-registered dense vectors.

use crate::arbiter::MemoryArbiter;
use crate::backend::{DevicePtr, HostRegion};
use crate::error::{MemoryError, Result};
use crate::tag::{LockMode, MemId, MemoryTag};
use bytemuck::Pod;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

/// A dense vector whose host storage is registered with a [`MemoryArbiter`].
///
/// The elements can only be reached through lock guards, which ask the
/// arbiter for a valid copy on the requested device. Shared guards come from
/// `&self`, exclusive ones from `&mut self`.
pub struct DeviceVector<T: Pod> {
    host: NonNull<T>,
    len: usize,
    id: MemId,
    arbiter: Arc<MemoryArbiter>,
    _owns: PhantomData<Box<[T]>>,
}

// SAFETY: host storage is owned by the vector and every access goes through
// arbiter locks; `T: Pod` is itself Send + Sync.
unsafe impl<T: Pod> Send for DeviceVector<T> {}
unsafe impl<T: Pod> Sync for DeviceVector<T> {}

impl<T: Pod> DeviceVector<T> {
    /// Take ownership of `data` and register it.
    pub fn from_vec(arbiter: &Arc<MemoryArbiter>, data: Vec<T>) -> Self {
        let boxed = data.into_boxed_slice();
        let len = boxed.len();
        let raw = Box::into_raw(boxed);
        // SAFETY: Box::into_raw never returns null.
        let host = unsafe { NonNull::new_unchecked(raw.cast::<T>()) };
        Self {
            host,
            len,
            id: arbiter.add_memblock(),
            arbiter: Arc::clone(arbiter),
            _owns: PhantomData,
        }
    }

    /// A vector of `len` copies of `value`.
    pub fn filled(arbiter: &Arc<MemoryArbiter>, len: usize, value: T) -> Self {
        Self::from_vec(arbiter, vec![value; len])
    }

    /// A vector of `len` zero elements.
    pub fn zeros(arbiter: &Arc<MemoryArbiter>, len: usize) -> Self {
        Self::from_vec(arbiter, vec![T::zeroed(); len])
    }

    /// An empty placeholder.
    pub fn empty(arbiter: &Arc<MemoryArbiter>) -> Self {
        Self::from_vec(arbiter, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arbiter identity of this vector's block.
    pub fn id(&self) -> MemId {
        self.id
    }

    /// The arbiter this vector is registered with.
    pub fn arbiter(&self) -> &Arc<MemoryArbiter> {
        &self.arbiter
    }

    /// Size of the payload in bytes.
    pub fn byte_len(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    fn region(&self) -> HostRegion {
        // SAFETY: the allocation is owned by `self` and lives until drop.
        unsafe { HostRegion::new(self.host.as_ptr().cast(), self.byte_len()) }
    }

    fn acquire(&self, mode: LockMode, tag: MemoryTag) -> Result<DevicePtr> {
        self.arbiter.lock(mode, tag, self.id, self.region())
    }

    /// Shared access on `tag`.
    pub fn read(&self, tag: MemoryTag) -> Result<ReadGuard<'_, T>> {
        let ptr = self.acquire(LockMode::ReadOnly, tag)?;
        Ok(ReadGuard {
            vector: self,
            tag,
            ptr,
        })
    }

    /// Exclusive access on `tag` with valid contents.
    pub fn write(&mut self, tag: MemoryTag) -> Result<WriteGuard<'_, T>> {
        let ptr = self.acquire(LockMode::ReadWrite, tag)?;
        Ok(WriteGuard {
            vector: self,
            tag,
            ptr,
        })
    }

    /// Exclusive access on `tag` for a kernel that overwrites every element.
    /// Stale contents are not transferred.
    pub fn write_only(&mut self, tag: MemoryTag) -> Result<WriteGuard<'_, T>> {
        let ptr = self.acquire(LockMode::WriteOnly, tag)?;
        Ok(WriteGuard {
            vector: self,
            tag,
            ptr,
        })
    }

    /// Copy the current contents into a new host vector.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.read(MemoryTag::Cpu)?.as_slice()?.to_vec())
    }

    /// An independent copy registered with the same arbiter.
    pub fn copy(&self) -> Result<Self> {
        Ok(Self::from_vec(&self.arbiter, self.to_vec()?))
    }
}

impl<T: Pod> Drop for DeviceVector<T> {
    fn drop(&mut self) {
        self.arbiter.remove_memblock(self.id);
        let slice = std::ptr::slice_from_raw_parts_mut(self.host.as_ptr(), self.len);
        // SAFETY: produced by Box::into_raw in from_vec and never freed elsewhere.
        drop(unsafe { Box::from_raw(slice) });
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for DeviceVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceVector")
            .field("id", &self.id)
            .field("len", &self.len)
            .finish()
    }
}

fn addressable<T>(ptr: DevicePtr, tag: MemoryTag, id: MemId) -> Result<*mut T> {
    ptr.addressable()
        .map(|p| p.cast::<T>())
        .ok_or(MemoryError::NotAddressable { tag, id })
}

/// A held read lock. Released on drop.
pub struct ReadGuard<'a, T: Pod> {
    vector: &'a DeviceVector<T>,
    tag: MemoryTag,
    ptr: DevicePtr,
}

impl<'a, T: Pod> ReadGuard<'a, T> {
    /// Device the lock is held on.
    pub fn tag(&self) -> MemoryTag {
        self.tag
    }

    /// Block identity of the locked vector.
    pub fn id(&self) -> MemId {
        self.vector.id
    }

    /// Where the locked copy lives.
    pub fn device_ptr(&self) -> DevicePtr {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.vector.len
    }

    pub fn is_empty(&self) -> bool {
        self.vector.len == 0
    }

    /// Elements of the locked copy, if the device is host-addressable.
    pub fn as_slice(&self) -> Result<&[T]> {
        if self.vector.len == 0 {
            return Ok(&[]);
        }
        let ptr = addressable::<T>(self.ptr, self.tag, self.vector.id)?;
        // SAFETY: the read lock keeps the copy valid and unwritten.
        Ok(unsafe { std::slice::from_raw_parts(ptr, self.vector.len) })
    }
}

impl<T: Pod> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.vector.arbiter.release_read(self.vector.id, self.tag);
    }
}

/// A held write lock. Released on drop.
pub struct WriteGuard<'a, T: Pod> {
    vector: &'a mut DeviceVector<T>,
    tag: MemoryTag,
    ptr: DevicePtr,
}

impl<'a, T: Pod> WriteGuard<'a, T> {
    /// Device the lock is held on.
    pub fn tag(&self) -> MemoryTag {
        self.tag
    }

    /// Block identity of the locked vector.
    pub fn id(&self) -> MemId {
        self.vector.id
    }

    /// Where the locked copy lives.
    pub fn device_ptr(&self) -> DevicePtr {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.vector.len
    }

    pub fn is_empty(&self) -> bool {
        self.vector.len == 0
    }

    /// Elements of the locked copy, if the device is host-addressable.
    pub fn as_slice(&self) -> Result<&[T]> {
        if self.vector.len == 0 {
            return Ok(&[]);
        }
        let ptr = addressable::<T>(self.ptr, self.tag, self.vector.id)?;
        // SAFETY: the write lock gives exclusive access.
        Ok(unsafe { std::slice::from_raw_parts(ptr, self.vector.len) })
    }

    /// Mutable elements of the locked copy, if the device is
    /// host-addressable.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        if self.vector.len == 0 {
            return Ok(&mut []);
        }
        let ptr = addressable::<T>(self.ptr, self.tag, self.vector.id)?;
        // SAFETY: the write lock gives exclusive access.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr, self.vector.len) })
    }
}

impl<T: Pod> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.vector.arbiter.release_write(self.vector.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalStoreBackend;

    fn arbiter_with_local_store() -> Arc<MemoryArbiter> {
        let arbiter = MemoryArbiter::shared();
        arbiter.register_backend(Arc::new(LocalStoreBackend::new()));
        arbiter
    }

    #[test]
    fn vector_registers_and_unregisters() {
        let arbiter = MemoryArbiter::shared();
        {
            let v = DeviceVector::<f64>::zeros(&arbiter, 16);
            assert_eq!(v.len(), 16);
            assert_eq!(arbiter.block_count(), 1);
        }
        assert_eq!(arbiter.block_count(), 0);
    }

    #[test]
    fn write_then_read_on_host() {
        let arbiter = MemoryArbiter::shared();
        let mut v = DeviceVector::<f32>::zeros(&arbiter, 4);
        {
            let mut guard = v.write(MemoryTag::Cpu).unwrap();
            guard.as_mut_slice().unwrap().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        }
        assert_eq!(v.to_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn local_store_write_is_visible_on_host() {
        let arbiter = arbiter_with_local_store();
        let mut v = DeviceVector::from_vec(&arbiter, vec![1.0f64; 5]);
        {
            let mut guard = v.write(MemoryTag::LocalStore).unwrap();
            let slice = guard.as_mut_slice().unwrap();
            assert_eq!(slice, &[1.0; 5]);
            slice.iter_mut().for_each(|x| *x *= 3.0);
        }
        assert_eq!(v.to_vec().unwrap(), vec![3.0; 5]);
    }

    #[test]
    fn write_only_skips_stale_contents() {
        let arbiter = arbiter_with_local_store();
        let mut v = DeviceVector::from_vec(&arbiter, vec![7u32; 3]);
        {
            let mut guard = v.write_only(MemoryTag::LocalStore).unwrap();
            // Fresh allocation: host contents were never uploaded.
            assert_eq!(guard.as_slice().unwrap(), &[0, 0, 0]);
            guard.as_mut_slice().unwrap().copy_from_slice(&[4, 5, 6]);
        }
        assert_eq!(v.to_vec().unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn copy_is_independent() {
        let arbiter = MemoryArbiter::shared();
        let mut v = DeviceVector::from_vec(&arbiter, vec![1.0f64, 2.0]);
        let c = v.copy().unwrap();
        assert_ne!(v.id(), c.id());
        v.write(MemoryTag::Cpu).unwrap().as_mut_slice().unwrap()[0] = 9.0;
        assert_eq!(c.to_vec().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn empty_vectors_have_distinct_ids() {
        let arbiter = MemoryArbiter::shared();
        let a = DeviceVector::<f64>::empty(&arbiter);
        let b = DeviceVector::<f64>::empty(&arbiter);
        assert_ne!(a.id(), b.id());
        assert!(a.to_vec().unwrap().is_empty());
    }
}
