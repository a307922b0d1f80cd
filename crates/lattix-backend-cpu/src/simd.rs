//! SIMD-accelerated host backend.
//!
//! Dot products and scaled sums dominate CG and the correction step; they
//! dispatch on the element type to the runtime-detected kernels of
//! `lattix-simd`. Everything else runs the reference kernels.

use bytemuck::{try_cast_slice, try_cast_slice_mut};
use lattix_core::{Element, ElementKind};
use lattix_simd::{SimdCapability, dot_f32, dot_f64, scaled_sum_f32, scaled_sum_f64};
use lattix_solver::NumericBackend;
use lattix_solver::kernels;

/// Host backend using the widest SIMD instructions the CPU supports.
#[derive(Debug, Clone, Copy)]
pub struct SimdBackend {
    capability: SimdCapability,
}

impl SimdBackend {
    /// Detect the CPU's SIMD support.
    pub fn new() -> Self {
        Self::with_capability(SimdCapability::detect())
    }

    /// Use a fixed capability level (e.g. to force the scalar path).
    pub fn with_capability(capability: SimdCapability) -> Self {
        log::debug!("SIMD backend using {} kernels", capability);
        Self { capability }
    }

    pub fn capability(&self) -> SimdCapability {
        self.capability
    }
}

impl Default for SimdBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NumericBackend for SimdBackend {
    fn name(&self) -> &str {
        "simd"
    }

    fn dot_slices<T: Element>(&self, a: &[T], b: &[T]) -> T {
        match T::KIND {
            ElementKind::F64 => {
                if let (Ok(a), Ok(b)) = (try_cast_slice::<T, f64>(a), try_cast_slice(b)) {
                    return T::val_from_f64(dot_f64(a, b, self.capability));
                }
            }
            ElementKind::F32 => {
                if let (Ok(a), Ok(b)) = (try_cast_slice::<T, f32>(a), try_cast_slice(b)) {
                    return T::val_from_f64(dot_f32(a, b, self.capability) as f64);
                }
            }
        }
        kernels::dot(a, b)
    }

    fn scaled_sum_slices<T: Element>(&self, y: &mut [T], x: &[T], alpha: T) {
        match T::KIND {
            ElementKind::F64 => {
                if let (Ok(y), Ok(x)) = (try_cast_slice_mut::<T, f64>(y), try_cast_slice(x)) {
                    return scaled_sum_f64(y, x, alpha.val_to_f64(), self.capability);
                }
            }
            ElementKind::F32 => {
                if let (Ok(y), Ok(x)) = (try_cast_slice_mut::<T, f32>(y), try_cast_slice(x)) {
                    return scaled_sum_f32(y, x, alpha.val_to_f64() as f32, self.capability);
                }
            }
        }
        kernels::scaled_sum(y, x, alpha)
    }
}
