//! SIMD-accelerated scaled sums: `y[i] += alpha * x[i]`.
//!
//! The ScaledSum kernel applies the multigrid correction and carries every
//! update of the conjugate-gradient iteration.

use crate::capability::SimdCapability;

/// Compute `y += alpha * x` for f64 vectors.
///
/// # Panics
///
/// Panics if `x` and `y` have different lengths.
#[inline]
pub fn scaled_sum_f64(y: &mut [f64], x: &[f64], alpha: f64, capability: SimdCapability) {
    assert_eq!(y.len(), x.len(), "Vector lengths must match");

    match capability {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        SimdCapability::Avx512 => unsafe { scaled_sum_f64_avx512(y, x, alpha) },
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        SimdCapability::Avx2 => unsafe { scaled_sum_f64_avx2(y, x, alpha) },
        SimdCapability::Scalar => scaled_sum_f64_scalar(y, x, alpha),
    }
}

/// Compute `y += alpha * x` for f32 vectors.
///
/// # Panics
///
/// Panics if `x` and `y` have different lengths.
#[inline]
pub fn scaled_sum_f32(y: &mut [f32], x: &[f32], alpha: f32, capability: SimdCapability) {
    assert_eq!(y.len(), x.len(), "Vector lengths must match");

    match capability {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        SimdCapability::Avx512 | SimdCapability::Avx2 => unsafe {
            scaled_sum_f32_avx2(y, x, alpha)
        },
        SimdCapability::Scalar => scaled_sum_f32_scalar(y, x, alpha),
    }
}

/// Scalar f64 scaled sum.
#[inline]
pub fn scaled_sum_f64_scalar(y: &mut [f64], x: &[f64], alpha: f64) {
    for (yi, xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// Scalar f32 scaled sum.
#[inline]
pub fn scaled_sum_f32_scalar(y: &mut [f32], x: &[f32], alpha: f32) {
    for (yi, xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn scaled_sum_f64_avx2(y: &mut [f64], x: &[f64], alpha: f64) {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let n = y.len();
    let simd_len = n / 4 * 4;
    let a_vec = _mm256_set1_pd(alpha);

    let x_ptr = x.as_ptr();
    let y_ptr = y.as_mut_ptr();

    let mut i = 0;
    while i < simd_len {
        let x_vec = _mm256_loadu_pd(x_ptr.add(i));
        let y_vec = _mm256_loadu_pd(y_ptr.add(i));
        _mm256_storeu_pd(y_ptr.add(i), _mm256_fmadd_pd(a_vec, x_vec, y_vec));
        i += 4;
    }

    for j in simd_len..n {
        y[j] += alpha * x[j];
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx512f")]
unsafe fn scaled_sum_f64_avx512(y: &mut [f64], x: &[f64], alpha: f64) {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let n = y.len();
    let simd_len = n / 8 * 8;
    let a_vec = _mm512_set1_pd(alpha);

    let x_ptr = x.as_ptr();
    let y_ptr = y.as_mut_ptr();

    let mut i = 0;
    while i < simd_len {
        let x_vec = _mm512_loadu_pd(x_ptr.add(i));
        let y_vec = _mm512_loadu_pd(y_ptr.add(i));
        _mm512_storeu_pd(y_ptr.add(i), _mm512_fmadd_pd(a_vec, x_vec, y_vec));
        i += 8;
    }

    for j in simd_len..n {
        y[j] += alpha * x[j];
    }
}

// AVX-512 machines also have AVX2+FMA, so f32 shares one implementation.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn scaled_sum_f32_avx2(y: &mut [f32], x: &[f32], alpha: f32) {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let n = y.len();
    let simd_len = n / 8 * 8;
    let a_vec = _mm256_set1_ps(alpha);

    let x_ptr = x.as_ptr();
    let y_ptr = y.as_mut_ptr();

    let mut i = 0;
    while i < simd_len {
        let x_vec = _mm256_loadu_ps(x_ptr.add(i));
        let y_vec = _mm256_loadu_ps(y_ptr.add(i));
        _mm256_storeu_ps(y_ptr.add(i), _mm256_fmadd_ps(a_vec, x_vec, y_vec));
        i += 8;
    }

    for j in simd_len..n {
        y[j] += alpha * x[j];
    }
}
