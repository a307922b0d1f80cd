//! The wgpu numeric backend.
//!
//! Grid transfers of `f32` vectors run as compute shaders on buffers the
//! arbiter keeps on [`MemoryTag::Wgpu`]. Everything else, and every `f64`
//! transfer, runs the host kernels on [`MemoryTag::Cpu`]; the arbiter moves
//! vectors between the two copies as they are locked.

use crate::context::WgpuContext;
use crate::error::WgpuError;
use crate::memory::WgpuMemoryBackend;
use crate::transfer::{TransferKernels, TransferOp};
use lattix_core::{BorderMask, DeviceVector, Element, ElementKind, MemoryArbiter, MemoryTag};
use lattix_solver::transfer::{self, apply_mask, grid_widths};
use lattix_solver::{NumericBackend, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// GPU backend for the V-cycle.
pub struct WgpuBackend {
    ctx: Arc<WgpuContext>,
    memory: Arc<WgpuMemoryBackend>,
    kernels: TransferKernels,
    fallback_warned: AtomicBool,
}

impl WgpuBackend {
    /// Compile the kernels on `ctx` and register its memory with `arbiter`.
    pub fn new(ctx: Arc<WgpuContext>, arbiter: &Arc<MemoryArbiter>) -> Result<Self> {
        let memory = Arc::new(WgpuMemoryBackend::new(Arc::clone(&ctx)));
        arbiter.register_backend(memory.clone());
        let kernels = TransferKernels::new(Arc::clone(&ctx))?;
        log::info!("wgpu backend on {}", ctx.adapter_name());
        Ok(Self {
            ctx,
            memory,
            kernels,
            fallback_warned: AtomicBool::new(false),
        })
    }

    /// Backend on the best available adapter.
    pub fn with_default_adapter(arbiter: &Arc<MemoryArbiter>) -> Result<Self> {
        let ctx = WgpuContext::new()?;
        Self::new(Arc::new(ctx), arbiter)
    }

    pub fn context(&self) -> &Arc<WgpuContext> {
        &self.ctx
    }

    pub fn adapter_name(&self) -> &str {
        self.ctx.adapter_name()
    }

    /// Whether transfers of `T` run on the GPU.
    fn on_device<T: Element>(&self) -> bool {
        if T::KIND == ElementKind::F32 {
            return true;
        }
        if !self.fallback_warned.swap(true, Ordering::Relaxed) {
            log::warn!(
                "wgpu kernels are f32 only; {} grid transfers run on the host",
                T::KIND.name()
            );
        }
        false
    }

    fn run(
        &self,
        op: TransferOp,
        src: lattix_memory::MemId,
        dst: lattix_memory::MemId,
        wf: usize,
        wc: usize,
    ) -> std::result::Result<(), WgpuError> {
        let src = self.memory.buffer(src)?;
        let dst = self.memory.buffer(dst)?;
        self.kernels.dispatch(op, &src, &dst, wf, wc)
    }
}

impl NumericBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn restrict<T: Element>(
        &self,
        coarse: &mut DeviceVector<T>,
        fine: &mut DeviceVector<T>,
        mask: &BorderMask,
    ) -> Result<()> {
        if !self.on_device::<T>() {
            return transfer::restrict(self, coarse, fine, mask);
        }
        let (wf, wc) = grid_widths(fine.len(), coarse.len())?;
        {
            let f = fine.read(MemoryTag::Wgpu)?;
            let c = coarse.write_only(MemoryTag::Wgpu)?;
            self.run(TransferOp::Restrict, f.id(), c.id(), wf, wc)?;
        }
        apply_mask(fine, mask, MemoryTag::Cpu)?;
        apply_mask(coarse, mask, MemoryTag::Cpu)
    }

    fn prolongate<T: Element>(
        &self,
        fine: &mut DeviceVector<T>,
        coarse: &DeviceVector<T>,
        mask: &BorderMask,
    ) -> Result<()> {
        if !self.on_device::<T>() {
            return transfer::prolongate(self, fine, coarse, mask);
        }
        let (wf, wc) = grid_widths(fine.len(), coarse.len())?;
        {
            let c = coarse.read(MemoryTag::Wgpu)?;
            let f = fine.write_only(MemoryTag::Wgpu)?;
            self.run(TransferOp::Prolongate, c.id(), f.id(), wf, wc)?;
        }
        apply_mask(fine, mask, MemoryTag::Cpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattix_core::Stencil;
    use lattix_solver::{MgConfig, MgInfo, ScalarBackend, solve_multigrid};

    /// Host and device transfers differ only in the rounding of the final
    /// division and in fused multiply-adds.
    const TRANSFER_ULPS: f32 = 8.0;

    fn assert_within_ulps(device: &[f32], host: &[f32]) {
        assert_eq!(device.len(), host.len());
        for (g, h) in device.iter().zip(host) {
            let bound = TRANSFER_ULPS * f32::EPSILON * h.abs().max(1.0);
            assert!((g - h).abs() <= bound, "{} vs {} (bound {})", g, h, bound);
        }
    }

    fn create_backend(arbiter: &Arc<MemoryArbiter>) -> Option<WgpuBackend> {
        match WgpuBackend::with_default_adapter(arbiter) {
            Ok(b) => Some(b),
            Err(_) => {
                eprintln!("Skipping test: no GPU available");
                None
            }
        }
    }

    #[test]
    fn transfers_match_host_kernels() {
        let arbiter = MemoryArbiter::shared();
        let Some(backend) = create_backend(&arbiter) else {
            return;
        };
        let mask = BorderMask::dirichlet();
        let (wf, wc) = (33, 17);
        let values: Vec<f32> = (0..wf * wf).map(|i| ((i * 7) % 13) as f32 * 0.25).collect();

        let mut fine_gpu = DeviceVector::from_vec(&arbiter, values.clone());
        let mut fine_host = DeviceVector::from_vec(&arbiter, values);
        let mut coarse_gpu = DeviceVector::zeros(&arbiter, wc * wc);
        let mut coarse_host = DeviceVector::zeros(&arbiter, wc * wc);
        backend.restrict(&mut coarse_gpu, &mut fine_gpu, &mask).unwrap();
        ScalarBackend.restrict(&mut coarse_host, &mut fine_host, &mask).unwrap();
        assert_within_ulps(&coarse_gpu.to_vec().unwrap(), &coarse_host.to_vec().unwrap());

        backend.prolongate(&mut fine_gpu, &coarse_host, &mask).unwrap();
        ScalarBackend.prolongate(&mut fine_host, &coarse_host, &mask).unwrap();
        assert_within_ulps(&fine_gpu.to_vec().unwrap(), &fine_host.to_vec().unwrap());
    }

    #[test]
    fn multigrid_converges_with_device_transfers() {
        let arbiter = MemoryArbiter::shared();
        let Some(backend) = create_backend(&arbiter) else {
            return;
        };
        let config = MgConfig::default().with_tolerance(1e-2);
        let mut info = MgInfo::<f32>::poisson(&arbiter, 5, config, Stencil::Q1).unwrap();
        let result = solve_multigrid(&backend, &mut info).unwrap();
        assert!(result.converged(), "{:?}", result);
    }

    #[test]
    fn double_precision_falls_back_to_host() {
        let arbiter = MemoryArbiter::shared();
        let Some(backend) = create_backend(&arbiter) else {
            return;
        };
        let mut info =
            MgInfo::<f64>::poisson(&arbiter, 4, MgConfig::default(), Stencil::FivePoint).unwrap();
        assert!(solve_multigrid(&backend, &mut info).unwrap().converged());
        let id = info.solution().id();
        assert!(!arbiter.status(id).unwrap().readers.contains(&MemoryTag::Wgpu));
    }
}
