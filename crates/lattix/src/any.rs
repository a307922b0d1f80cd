//! Runtime backend selection.

use lattix_backend_cpu::{AcceleratorBackend, MultiCoreBackend, MultiCoreConfig, SimdBackend};
use lattix_core::{BorderMask, DeviceVector, Element, MatrixView, MemoryArbiter, MemoryTag};
use lattix_solver::{ComputeBackend, NumericBackend, Result, ScalarBackend};
use std::sync::Arc;

/// Any of the compiled-in backends, chosen at runtime from a
/// [`ComputeBackend`].
pub enum AnyBackend {
    Cpu(ScalarBackend),
    Simd(SimdBackend),
    MultiCore(MultiCoreBackend),
    Accelerator(AcceleratorBackend),
    #[cfg(feature = "wgpu")]
    Wgpu(lattix_backend_wgpu::WgpuBackend),
}

macro_rules! dispatch {
    ($self:ident, $b:ident => $e:expr) => {
        match $self {
            AnyBackend::Cpu($b) => $e,
            AnyBackend::Simd($b) => $e,
            AnyBackend::MultiCore($b) => $e,
            AnyBackend::Accelerator($b) => $e,
            #[cfg(feature = "wgpu")]
            AnyBackend::Wgpu($b) => $e,
        }
    };
}

impl AnyBackend {
    /// Construct the backend `kind` names, registering device memory with
    /// `arbiter` where it needs any.
    pub fn create(kind: &ComputeBackend, arbiter: &Arc<MemoryArbiter>) -> Result<Self> {
        let backend = match kind {
            ComputeBackend::Cpu => AnyBackend::Cpu(ScalarBackend),
            ComputeBackend::Simd => AnyBackend::Simd(SimdBackend::new()),
            ComputeBackend::MultiCore { threads } => {
                let config = MultiCoreConfig {
                    threads: *threads,
                    ..MultiCoreConfig::default()
                };
                AnyBackend::MultiCore(MultiCoreBackend::new(config)?)
            }
            ComputeBackend::Accelerator => {
                AnyBackend::Accelerator(AcceleratorBackend::new(arbiter))
            }
            #[cfg(feature = "wgpu")]
            ComputeBackend::Wgpu { .. } => {
                AnyBackend::Wgpu(lattix_backend_wgpu::WgpuBackend::with_default_adapter(arbiter)?)
            }
            #[cfg(not(feature = "wgpu"))]
            ComputeBackend::Wgpu { .. } => {
                return Err(lattix_solver::Error::Backend(
                    "lattix was built without the `wgpu` feature".to_string(),
                ));
            }
        };
        log::debug!("selected {} backend", backend.kind());
        Ok(backend)
    }

    /// The backend actually running, with thread count or adapter filled in.
    pub fn kind(&self) -> ComputeBackend {
        match self {
            AnyBackend::Cpu(_) => ComputeBackend::Cpu,
            AnyBackend::Simd(_) => ComputeBackend::Simd,
            AnyBackend::MultiCore(b) => ComputeBackend::MultiCore {
                threads: Some(b.threads()),
            },
            AnyBackend::Accelerator(_) => ComputeBackend::Accelerator,
            #[cfg(feature = "wgpu")]
            AnyBackend::Wgpu(b) => ComputeBackend::Wgpu {
                adapter_name: b.adapter_name().to_string(),
            },
        }
    }
}

impl NumericBackend for AnyBackend {
    fn name(&self) -> &str {
        dispatch!(self, b => b.name())
    }

    fn memory(&self) -> MemoryTag {
        dispatch!(self, b => b.memory())
    }

    fn sum_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        dispatch!(self, b => b.sum_slices(y, x))
    }

    fn difference_slices<T: Element>(&self, y: &mut [T], a: &[T], c: &[T]) {
        dispatch!(self, b => b.difference_slices(y, a, c))
    }

    fn scaled_sum_slices<T: Element>(&self, y: &mut [T], x: &[T], alpha: T) {
        dispatch!(self, b => b.scaled_sum_slices(y, x, alpha))
    }

    fn scale_slices<T: Element>(&self, y: &mut [T], alpha: T) {
        dispatch!(self, b => b.scale_slices(y, alpha))
    }

    fn element_product_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        dispatch!(self, b => b.element_product_slices(y, x))
    }

    fn element_inverse_slices<T: Element>(&self, y: &mut [T]) {
        dispatch!(self, b => b.element_inverse_slices(y))
    }

    fn dot_slices<T: Element>(&self, x: &[T], y: &[T]) -> T {
        dispatch!(self, b => b.dot_slices(x, y))
    }

    fn fill_slices<T: Element>(&self, y: &mut [T], value: T) {
        dispatch!(self, b => b.fill_slices(y, value))
    }

    fn copy_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        dispatch!(self, b => b.copy_slices(y, x))
    }

    fn product_slices<T: Element>(&self, a: &MatrixView<'_, T>, x: &[T], y: &mut [T]) {
        dispatch!(self, b => b.product_slices(a, x, y))
    }

    fn defect_slices<T: Element>(&self, d: &mut [T], rhs: &[T], a: &MatrixView<'_, T>, x: &[T]) {
        dispatch!(self, b => b.defect_slices(d, rhs, a, x))
    }

    fn restrict_slices<T: Element>(&self, coarse: &mut [T], fine: &[T], wf: usize, wc: usize) {
        dispatch!(self, b => b.restrict_slices(coarse, fine, wf, wc))
    }

    fn prolongate_slices<T: Element>(&self, fine: &mut [T], coarse: &[T], wf: usize, wc: usize) {
        dispatch!(self, b => b.prolongate_slices(fine, coarse, wf, wc))
    }

    fn restrict<T: Element>(
        &self,
        coarse: &mut DeviceVector<T>,
        fine: &mut DeviceVector<T>,
        mask: &BorderMask,
    ) -> Result<()> {
        dispatch!(self, b => b.restrict(coarse, fine, mask))
    }

    fn prolongate<T: Element>(
        &self,
        fine: &mut DeviceVector<T>,
        coarse: &DeviceVector<T>,
        mask: &BorderMask,
    ) -> Result<()> {
        dispatch!(self, b => b.prolongate(fine, coarse, mask))
    }
}
