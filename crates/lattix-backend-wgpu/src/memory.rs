//! GPU memory behind the arbiter.
//!
//! [`WgpuMemoryBackend`] keeps one storage buffer per block. Uploads go
//! through `Queue::write_buffer`; downloads copy into a staging buffer,
//! map it and wait on the device. Kernels find a locked block's buffer with
//! [`WgpuMemoryBackend::buffer`].

use crate::context::WgpuContext;
use crate::error::WgpuError;
use lattix_memory::{DevicePtr, HostRegion, MemId, MemoryBackend, MemoryError, MemoryTag};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Buffer size for `bytes` of block data, padded to the copy alignment.
fn padded(bytes: usize) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    (bytes as u64).div_ceil(align).max(1) * align
}

fn transfer_error(id: MemId, err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Transfer {
        tag: MemoryTag::Wgpu,
        id,
        message: err.to_string(),
    }
}

type BufferTable = HashMap<MemId, Arc<wgpu::Buffer>>;

/// Backend for [`MemoryTag::Wgpu`].
pub struct WgpuMemoryBackend {
    ctx: Arc<WgpuContext>,
    buffers: Mutex<BufferTable>,
}

impl WgpuMemoryBackend {
    pub fn new(ctx: Arc<WgpuContext>) -> Self {
        Self {
            ctx,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<WgpuContext> {
        &self.ctx
    }

    /// Number of blocks with a GPU buffer.
    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// The GPU buffer of `id`. Only meaningful while the caller holds a
    /// lock on the block for [`MemoryTag::Wgpu`].
    pub fn buffer(&self, id: MemId) -> Result<Arc<wgpu::Buffer>, WgpuError> {
        self.buffers
            .lock()
            .map_err(|_| WgpuError::Buffer("buffer table poisoned".to_string()))?
            .get(&id)
            .cloned()
            .ok_or(WgpuError::MissingBuffer(id.get()))
    }

    fn table(&self, id: MemId) -> lattix_memory::Result<MutexGuard<'_, BufferTable>> {
        self.buffers
            .lock()
            .map_err(|_| transfer_error(id, "buffer table poisoned"))
    }

    /// Buffer of `id` with room for `bytes`, reallocated if too small.
    fn ensure(&self, id: MemId, bytes: usize) -> lattix_memory::Result<Arc<wgpu::Buffer>> {
        let size = padded(bytes);
        let max_buffer = self.ctx.max_buffer_size();
        if size > max_buffer {
            return Err(transfer_error(
                id,
                WgpuError::BufferTooLarge {
                    required: size,
                    max_buffer,
                },
            ));
        }

        let mut table = self.table(id)?;
        if let Some(buffer) = table.get(&id).filter(|b| b.size() >= size) {
            return Ok(Arc::clone(buffer));
        }
        log::trace!("wgpu: allocating {} bytes for {}", size, id);
        let buffer = Arc::new(self.ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lattix Block"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        table.insert(id, Arc::clone(&buffer));
        Ok(buffer)
    }
}

impl MemoryBackend for WgpuMemoryBackend {
    fn tag(&self) -> MemoryTag {
        MemoryTag::Wgpu
    }

    fn upload(&self, id: MemId, region: HostRegion) -> lattix_memory::Result<()> {
        log::trace!("wgpu: upload {} ({} bytes)", id, region.len());
        let buffer = self.ensure(id, region.len())?;
        // SAFETY: the arbiter holds the block while transferring.
        let bytes = unsafe { region.as_bytes() };
        if bytes.is_empty() {
            return Ok(());
        }
        if bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.ctx.queue().write_buffer(&buffer, 0, bytes);
        } else {
            let mut padded_bytes = bytes.to_vec();
            padded_bytes.resize(padded(bytes.len()) as usize, 0);
            self.ctx.queue().write_buffer(&buffer, 0, &padded_bytes);
        }
        Ok(())
    }

    fn download(&self, id: MemId, region: HostRegion) -> lattix_memory::Result<()> {
        log::trace!("wgpu: download {} ({} bytes)", id, region.len());
        if region.is_empty() {
            return Ok(());
        }
        let buffer = self.buffer(id).map_err(|e| transfer_error(id, e))?;
        let size = padded(region.len());
        let device = self.ctx.device();

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lattix Download Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Lattix Download Encoder"),
        });
        encoder.copy_buffer_to_buffer(&buffer, 0, &staging, 0, size);
        self.ctx.queue().submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| transfer_error(id, "failed to receive map result"))?
            .map_err(|e| transfer_error(id, format!("buffer map failed: {:?}", e)))?;

        {
            let data = slice.get_mapped_range();
            // SAFETY: the arbiter guarantees no host reader during download.
            let dst = unsafe { region.as_bytes_mut() };
            dst.copy_from_slice(&data[..dst.len()]);
        }
        staging.unmap();
        Ok(())
    }

    fn alloc(&self, id: MemId, bytes: usize) -> lattix_memory::Result<()> {
        self.ensure(id, bytes).map(|_| ())
    }

    fn free(&self, id: MemId) {
        if let Ok(mut table) = self.buffers.lock() {
            if let Some(buffer) = table.remove(&id) {
                log::trace!("wgpu: freeing {} ({} bytes)", id, buffer.size());
            }
        }
    }

    fn device_ptr(&self, id: MemId, _region: HostRegion) -> lattix_memory::Result<DevicePtr> {
        if self.table(id)?.contains_key(&id) {
            Ok(DevicePtr::Buffer(id))
        } else {
            Err(transfer_error(id, WgpuError::MissingBuffer(id.get())))
        }
    }
}
