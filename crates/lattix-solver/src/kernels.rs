//! Scalar reference kernels on host slices.
//!
//! Every backend must agree with these up to floating-point rounding.
//! Callers check lengths; the kernels only debug-assert them.

use lattix_core::{Element, MatrixView};

/// `y += x`.
pub fn sum<T: Element>(y: &mut [T], x: &[T]) {
    debug_assert_eq!(y.len(), x.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += xi;
    }
}

/// `y = a - b`.
pub fn difference<T: Element>(y: &mut [T], a: &[T], b: &[T]) {
    debug_assert_eq!(y.len(), a.len());
    debug_assert_eq!(y.len(), b.len());
    for ((yi, &ai), &bi) in y.iter_mut().zip(a).zip(b) {
        *yi = ai - bi;
    }
}

/// `y += alpha * x`.
pub fn scaled_sum<T: Element>(y: &mut [T], x: &[T], alpha: T) {
    debug_assert_eq!(y.len(), x.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// `y *= alpha`.
pub fn scale<T: Element>(y: &mut [T], alpha: T) {
    for yi in y.iter_mut() {
        *yi *= alpha;
    }
}

/// `y[i] *= x[i]`.
pub fn element_product<T: Element>(y: &mut [T], x: &[T]) {
    debug_assert_eq!(y.len(), x.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi *= xi;
    }
}

/// `y[i] = 1 / y[i]`; zero entries stay zero.
pub fn element_inverse<T: Element>(y: &mut [T]) {
    for yi in y.iter_mut() {
        if *yi != T::zero() {
            *yi = T::one() / *yi;
        }
    }
}

/// `a · b`.
pub fn dot<T: Element>(a: &[T], b: &[T]) -> T {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&ai, &bi)| ai * bi).sum()
}

pub fn fill<T: Element>(y: &mut [T], value: T) {
    y.fill(value);
}

pub fn copy<T: Element>(y: &mut [T], x: &[T]) {
    y.copy_from_slice(x);
}

/// `y = A x`.
pub fn product<T: Element>(a: &MatrixView<'_, T>, x: &[T], y: &mut [T]) {
    a.product_rows(0..y.len(), x, y);
}

/// `d = rhs - A x` for the rows `start..start + d.len()`.
pub fn defect_rows<T: Element>(
    d: &mut [T],
    start: usize,
    rhs: &[T],
    a: &MatrixView<'_, T>,
    x: &[T],
) {
    for (k, di) in d.iter_mut().enumerate() {
        let i = start + k;
        *di = rhs[i] - a.row_dot(i, x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elementwise_kernels() {
        let mut y = vec![1.0, 2.0, 3.0];
        sum(&mut y, &[1.0, 1.0, 1.0]);
        assert_eq!(y, vec![2.0, 3.0, 4.0]);

        scaled_sum(&mut y, &[1.0, 0.0, -1.0], 0.5);
        assert_eq!(y, vec![2.5, 3.0, 3.5]);

        scale(&mut y, 2.0);
        assert_eq!(y, vec![5.0, 6.0, 7.0]);

        element_product(&mut y, &[2.0, 0.5, 0.0]);
        assert_eq!(y, vec![10.0, 3.0, 0.0]);

        element_inverse(&mut y);
        assert_eq!(y, vec![0.1, 1.0 / 3.0, 0.0]);

        let mut z = vec![0.0f32; 2];
        difference(&mut z, &[3.0, 1.0], &[1.0, 4.0]);
        assert_eq!(z, vec![2.0, -3.0]);
    }

    #[test]
    fn dot_of_orthogonal_vectors_is_zero() {
        assert_eq!(dot(&[1.0, 0.0, 2.0], &[0.0, 5.0, 0.0]), 0.0);
        assert_eq!(dot(&[1.0f32, 2.0], &[3.0, 4.0]), 11.0);
    }
}
