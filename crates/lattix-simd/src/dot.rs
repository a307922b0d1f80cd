//! SIMD-accelerated dot products for f64 and f32 vectors.
//!
//! Used by the SIMD numeric backend for DotProduct and Norm, which dominate
//! the conjugate-gradient coarse solve and the adaptive correction factor.

use crate::capability::SimdCapability;

/// Compute `sum(a[i] * b[i])` for f64 vectors.
///
/// # Panics
///
/// Panics if `a` and `b` have different lengths.
#[inline]
pub fn dot_f64(a: &[f64], b: &[f64], capability: SimdCapability) -> f64 {
    assert_eq!(a.len(), b.len(), "Vector lengths must match");

    match capability {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        SimdCapability::Avx512 => unsafe { dot_f64_avx512(a, b) },
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        SimdCapability::Avx2 => unsafe { dot_f64_avx2(a, b) },
        SimdCapability::Scalar => dot_f64_scalar(a, b),
    }
}

/// Compute `sum(a[i] * b[i])` for f32 vectors.
///
/// Accumulates in f32 lanes, so the result can differ from the scalar sum in
/// the last few bits.
///
/// # Panics
///
/// Panics if `a` and `b` have different lengths.
#[inline]
pub fn dot_f32(a: &[f32], b: &[f32], capability: SimdCapability) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector lengths must match");

    match capability {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        SimdCapability::Avx512 => unsafe { dot_f32_avx512(a, b) },
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        SimdCapability::Avx2 => unsafe { dot_f32_avx2(a, b) },
        SimdCapability::Scalar => dot_f32_scalar(a, b),
    }
}

/// Scalar f64 dot product.
#[inline]
pub fn dot_f64_scalar(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (ai, bi) in a.iter().zip(b.iter()) {
        sum += ai * bi;
    }
    sum
}

/// Scalar f32 dot product.
#[inline]
pub fn dot_f32_scalar(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0;
    for (ai, bi) in a.iter().zip(b.iter()) {
        sum += ai * bi;
    }
    sum
}

// ============================================================================
// AVX2 Implementation
// ============================================================================

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_f64_avx2(a: &[f64], b: &[f64]) -> f64 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let n = a.len();
    let simd_len = n / 4 * 4;
    let mut acc = _mm256_setzero_pd();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut i = 0;
    while i < simd_len {
        let a_vec = _mm256_loadu_pd(a_ptr.add(i));
        let b_vec = _mm256_loadu_pd(b_ptr.add(i));
        acc = _mm256_fmadd_pd(a_vec, b_vec, acc);
        i += 4;
    }

    let high = _mm256_extractf128_pd(acc, 1);
    let low = _mm256_castpd256_pd128(acc);
    let sum_128 = _mm_add_pd(low, high);
    let high_64 = _mm_unpackhi_pd(sum_128, sum_128);
    let sum_64 = _mm_add_sd(sum_128, high_64);

    let mut result = _mm_cvtsd_f64(sum_64);
    for j in simd_len..n {
        result += a[j] * b[j];
    }
    result
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_f32_avx2(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let n = a.len();
    let simd_len = n / 8 * 8;
    let mut acc = _mm256_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut i = 0;
    while i < simd_len {
        let a_vec = _mm256_loadu_ps(a_ptr.add(i));
        let b_vec = _mm256_loadu_ps(b_ptr.add(i));
        acc = _mm256_fmadd_ps(a_vec, b_vec, acc);
        i += 8;
    }

    // 8 -> 4 -> 2 -> 1
    let high = _mm256_extractf128_ps(acc, 1);
    let low = _mm256_castps256_ps128(acc);
    let sum4 = _mm_add_ps(low, high);
    let sum2 = _mm_add_ps(sum4, _mm_movehl_ps(sum4, sum4));
    let sum1 = _mm_add_ss(sum2, _mm_movehdup_ps(sum2));

    let mut result = _mm_cvtss_f32(sum1);
    for j in simd_len..n {
        result += a[j] * b[j];
    }
    result
}

// ============================================================================
// AVX-512 Implementation
// ============================================================================

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx512f")]
unsafe fn dot_f64_avx512(a: &[f64], b: &[f64]) -> f64 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let n = a.len();
    let simd_len = n / 8 * 8;
    let mut acc = _mm512_setzero_pd();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut i = 0;
    while i < simd_len {
        let a_vec = _mm512_loadu_pd(a_ptr.add(i));
        let b_vec = _mm512_loadu_pd(b_ptr.add(i));
        acc = _mm512_fmadd_pd(a_vec, b_vec, acc);
        i += 8;
    }

    let mut result = _mm512_reduce_add_pd(acc);
    for j in simd_len..n {
        result += a[j] * b[j];
    }
    result
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx512f")]
unsafe fn dot_f32_avx512(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let n = a.len();
    let simd_len = n / 16 * 16;
    let mut acc = _mm512_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut i = 0;
    while i < simd_len {
        let a_vec = _mm512_loadu_ps(a_ptr.add(i));
        let b_vec = _mm512_loadu_ps(b_ptr.add(i));
        acc = _mm512_fmadd_ps(a_vec, b_vec, acc);
        i += 16;
    }

    let mut result = _mm512_reduce_add_ps(acc);
    for j in simd_len..n {
        result += a[j] * b[j];
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_dot_basic() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        assert!((dot_f64_scalar(&a, &b) - 32.0).abs() < 1e-10);
    }

    #[test]
    fn f64_simd_vs_scalar_consistency() {
        let cap = SimdCapability::detect();

        for size in [1, 2, 3, 4, 5, 7, 8, 15, 16, 31, 32, 63, 64, 100, 127, 128, 256] {
            let a: Vec<f64> = (0..size).map(|i| i as f64 * 0.1).collect();
            let b: Vec<f64> = (0..size).map(|i| (size - i) as f64 * 0.3).collect();

            let scalar_result = dot_f64_scalar(&a, &b);
            let simd_result = dot_f64(&a, &b, cap);

            let scale = scalar_result.abs().max(1.0);
            assert!(
                (scalar_result - simd_result).abs() <= scale * 1e-12,
                "Size {}: Scalar {} vs SIMD {} (cap={:?})",
                size,
                scalar_result,
                simd_result,
                cap
            );
        }
    }

    #[test]
    fn f32_simd_vs_scalar_consistency() {
        let cap = SimdCapability::detect();

        for size in [1, 7, 8, 9, 16, 17, 33, 100, 255] {
            let a: Vec<f32> = (0..size).map(|i| (i as f32 * 0.37).sin()).collect();
            let b: Vec<f32> = (0..size).map(|i| (i as f32 * 0.11).cos()).collect();

            let scalar_result = dot_f32_scalar(&a, &b);
            let simd_result = dot_f32(&a, &b, cap);

            let scale = scalar_result.abs().max(1.0);
            assert!(
                (scalar_result - simd_result).abs() <= scale * 1e-4,
                "Size {}: Scalar {} vs SIMD {}",
                size,
                scalar_result,
                simd_result
            );
        }
    }

    #[test]
    fn empty_vectors() {
        let cap = SimdCapability::detect();
        let empty: Vec<f64> = vec![];
        assert_eq!(dot_f64(&empty, &empty, cap), 0.0);
        let empty32: Vec<f32> = vec![];
        assert_eq!(dot_f32(&empty32, &empty32, cap), 0.0);
    }

    #[test]
    #[should_panic(expected = "Vector lengths must match")]
    fn length_mismatch_panics() {
        dot_f64(&[1.0, 2.0], &[1.0], SimdCapability::Scalar);
    }
}
