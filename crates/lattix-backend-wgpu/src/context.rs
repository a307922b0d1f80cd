//! WebGPU device context management.

use crate::error::{Result, WgpuError};
use std::sync::Arc;

/// Native backends only; browser and GL targets lack the storage buffer
/// limits the kernels assume.
fn instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::METAL | wgpu::Backends::VULKAN | wgpu::Backends::DX12,
        ..Default::default()
    })
}

/// WebGPU context holding device and queue.
///
/// One context is shared by the memory backend and the kernels; creating a
/// second one gives a second device whose buffers the first cannot see.
pub struct WgpuContext {
    /// wgpu device for GPU operations.
    pub(crate) device: Arc<wgpu::Device>,
    /// Command queue for submitting GPU work.
    pub(crate) queue: Arc<wgpu::Queue>,
    /// Adapter info for debugging/logging.
    pub(crate) adapter_info: wgpu::AdapterInfo,
    /// Whether the device supports f64 shader operations.
    pub(crate) supports_f64: bool,
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .field("supports_f64", &self.supports_f64)
            .finish()
    }
}

impl WgpuContext {
    /// Create a new WebGPU context using the best available adapter.
    ///
    /// Prefers discrete GPUs, falls back to integrated GPUs.
    pub fn new() -> Result<Self> {
        Self::with_power_preference(wgpu::PowerPreference::HighPerformance)
    }

    /// Create a new WebGPU context with a specific power preference.
    pub fn with_power_preference(power_preference: wgpu::PowerPreference) -> Result<Self> {
        pollster::block_on(Self::new_async(power_preference))
    }

    async fn new_async(power_preference: wgpu::PowerPreference) -> Result<Self> {
        let adapter = instance()
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(WgpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU adapter: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let supports_f64 = adapter.features().contains(wgpu::Features::SHADER_F64);

        if supports_f64 {
            log::debug!("GPU supports f64 shader operations");
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lattix Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| WgpuError::DeviceInit(e.to_string()))?;

        log::info!(
            "WebGPU device ready: buffers up to {} bytes",
            device.limits().max_buffer_size
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            supports_f64,
        })
    }

    /// Check if a WebGPU-capable GPU is available on this system.
    pub fn is_available() -> bool {
        pollster::block_on(instance().request_adapter(&wgpu::RequestAdapterOptions::default()))
            .is_some()
    }

    /// Get the adapter name.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Get the backend being used (Metal, Vulkan, etc.).
    pub fn backend(&self) -> wgpu::Backend {
        self.adapter_info.backend
    }

    /// Get the underlying device.
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Get the underlying queue.
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Whether the adapter could run f64 shaders. Kernels here are f32
    /// only; this is informational.
    pub fn supports_f64(&self) -> bool {
        self.supports_f64
    }

    /// Largest block the device can hold: the smaller of the buffer size
    /// and storage binding limits.
    pub fn max_buffer_size(&self) -> u64 {
        let limits = self.device.limits();
        limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64)
    }

    /// Workgroups per dispatch dimension.
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.device.limits().max_compute_workgroups_per_dimension
    }
}
