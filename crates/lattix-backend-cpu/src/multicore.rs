//! Multi-core host backend.
//!
//! Every kernel splits its output into contiguous partitions processed on a
//! rayon pool. Partitions run the reference kernels on their own range, so
//! results equal the scalar backend's except for the summation order of dot
//! products. Vectors shorter than the minimum partition run sequentially.

use lattix_core::{Element, MatrixView};
use lattix_solver::error::{Error, Result};
use lattix_solver::{NumericBackend, kernels, transfer};
use rayon::prelude::*;

/// Configuration for the multi-core backend.
#[derive(Debug, Clone)]
pub struct MultiCoreConfig {
    /// Worker threads; `None` uses rayon's global pool.
    pub threads: Option<usize>,
    /// Smallest number of elements worth a partition of its own.
    pub min_partition: usize,
}

impl Default for MultiCoreConfig {
    fn default() -> Self {
        Self {
            threads: None,
            min_partition: 4096,
        }
    }
}

impl MultiCoreConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_min_partition(mut self, min: usize) -> Self {
        self.min_partition = min;
        self
    }
}

/// Host backend partitioning kernels across worker threads.
pub struct MultiCoreBackend {
    config: MultiCoreConfig,
    pool: Option<rayon::ThreadPool>,
}

impl MultiCoreBackend {
    pub fn new(config: MultiCoreConfig) -> Result<Self> {
        if config.min_partition == 0 {
            return Err(Error::InvalidConfig(
                "minimum partition size must be positive".to_string(),
            ));
        }
        let pool = match config.threads {
            Some(0) => {
                return Err(Error::InvalidConfig(
                    "thread count must be positive".to_string(),
                ));
            }
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("lattix-worker-{}", i))
                    .build()
                    .map_err(|e| Error::Backend(format!("failed to build thread pool: {}", e)))?,
            ),
            None => None,
        };
        let backend = Self { config, pool };
        log::info!(
            "multi-core backend: {} threads, partitions of at least {} elements",
            backend.threads(),
            backend.config.min_partition
        );
        Ok(backend)
    }

    pub fn config(&self) -> &MultiCoreConfig {
        &self.config
    }

    /// Number of worker threads kernels are spread over.
    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Partition length for `len` elements, or `None` to run sequentially.
    fn partition(&self, len: usize) -> Option<usize> {
        let threads = self.threads();
        if threads < 2 || len < 2 * self.config.min_partition {
            return None;
        }
        Some(len.div_ceil(threads).max(self.config.min_partition))
    }

    fn run<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Default for MultiCoreBackend {
    fn default() -> Self {
        Self {
            config: MultiCoreConfig::default(),
            pool: None,
        }
    }
}

impl NumericBackend for MultiCoreBackend {
    fn name(&self) -> &str {
        "multicore"
    }

    fn sum_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        match self.partition(y.len()) {
            None => kernels::sum(y, x),
            Some(chunk) => self.run(|| {
                y.par_chunks_mut(chunk)
                    .zip(x.par_chunks(chunk))
                    .for_each(|(y, x)| kernels::sum(y, x))
            }),
        }
    }

    fn difference_slices<T: Element>(&self, y: &mut [T], a: &[T], b: &[T]) {
        match self.partition(y.len()) {
            None => kernels::difference(y, a, b),
            Some(chunk) => self.run(|| {
                y.par_chunks_mut(chunk)
                    .zip(a.par_chunks(chunk).zip(b.par_chunks(chunk)))
                    .for_each(|(y, (a, b))| kernels::difference(y, a, b))
            }),
        }
    }

    fn scaled_sum_slices<T: Element>(&self, y: &mut [T], x: &[T], alpha: T) {
        match self.partition(y.len()) {
            None => kernels::scaled_sum(y, x, alpha),
            Some(chunk) => self.run(|| {
                y.par_chunks_mut(chunk)
                    .zip(x.par_chunks(chunk))
                    .for_each(|(y, x)| kernels::scaled_sum(y, x, alpha))
            }),
        }
    }

    fn scale_slices<T: Element>(&self, y: &mut [T], alpha: T) {
        match self.partition(y.len()) {
            None => kernels::scale(y, alpha),
            Some(chunk) => {
                self.run(|| y.par_chunks_mut(chunk).for_each(|y| kernels::scale(y, alpha)))
            }
        }
    }

    fn element_product_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        match self.partition(y.len()) {
            None => kernels::element_product(y, x),
            Some(chunk) => self.run(|| {
                y.par_chunks_mut(chunk)
                    .zip(x.par_chunks(chunk))
                    .for_each(|(y, x)| kernels::element_product(y, x))
            }),
        }
    }

    fn element_inverse_slices<T: Element>(&self, y: &mut [T]) {
        match self.partition(y.len()) {
            None => kernels::element_inverse(y),
            Some(chunk) => {
                self.run(|| y.par_chunks_mut(chunk).for_each(|y| kernels::element_inverse(y)))
            }
        }
    }

    fn dot_slices<T: Element>(&self, a: &[T], b: &[T]) -> T {
        match self.partition(a.len()) {
            None => kernels::dot(a, b),
            Some(chunk) => self.run(|| {
                a.par_chunks(chunk)
                    .zip(b.par_chunks(chunk))
                    .map(|(a, b)| kernels::dot(a, b))
                    .sum()
            }),
        }
    }

    fn fill_slices<T: Element>(&self, y: &mut [T], value: T) {
        match self.partition(y.len()) {
            None => kernels::fill(y, value),
            Some(chunk) => {
                self.run(|| y.par_chunks_mut(chunk).for_each(|y| kernels::fill(y, value)))
            }
        }
    }

    fn copy_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        match self.partition(y.len()) {
            None => kernels::copy(y, x),
            Some(chunk) => self.run(|| {
                y.par_chunks_mut(chunk)
                    .zip(x.par_chunks(chunk))
                    .for_each(|(y, x)| kernels::copy(y, x))
            }),
        }
    }

    fn product_slices<T: Element>(&self, a: &MatrixView<'_, T>, x: &[T], y: &mut [T]) {
        match self.partition(y.len()) {
            None => kernels::product(a, x, y),
            Some(chunk) => self.run(|| {
                y.par_chunks_mut(chunk).enumerate().for_each(|(k, out)| {
                    let start = k * chunk;
                    a.product_rows(start..start + out.len(), x, out)
                })
            }),
        }
    }

    fn defect_slices<T: Element>(&self, d: &mut [T], rhs: &[T], a: &MatrixView<'_, T>, x: &[T]) {
        match self.partition(d.len()) {
            None => kernels::defect_rows(d, 0, rhs, a, x),
            Some(chunk) => self.run(|| {
                d.par_chunks_mut(chunk)
                    .enumerate()
                    .for_each(|(k, out)| kernels::defect_rows(out, k * chunk, rhs, a, x))
            }),
        }
    }

    fn restrict_slices<T: Element>(&self, coarse: &mut [T], fine: &[T], wf: usize, wc: usize) {
        match self.partition(coarse.len()) {
            None => transfer::restrict_nodes(coarse, 0, fine, wf, wc),
            Some(chunk) => self.run(|| {
                coarse
                    .par_chunks_mut(chunk)
                    .enumerate()
                    .for_each(|(k, out)| transfer::restrict_nodes(out, k * chunk, fine, wf, wc))
            }),
        }
    }

    fn prolongate_slices<T: Element>(&self, fine: &mut [T], coarse: &[T], wf: usize, wc: usize) {
        match self.partition(fine.len()) {
            None => transfer::prolongate_nodes(fine, 0, coarse, wf, wc),
            Some(chunk) => self.run(|| {
                fine.par_chunks_mut(chunk)
                    .enumerate()
                    .for_each(|(k, out)| transfer::prolongate_nodes(out, k * chunk, coarse, wf, wc))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattix_core::poisson::{poisson_matrix, poisson_rhs};
    use lattix_core::{DeviceVector, MatrixFormat, MemoryArbiter, Stencil, SystemMatrix};
    use lattix_solver::{MgConfig, MgInfo, ScalarBackend, solve_multigrid};

    fn small_partitions(threads: usize) -> MultiCoreBackend {
        MultiCoreBackend::new(
            MultiCoreConfig::default()
                .with_threads(threads)
                .with_min_partition(16),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(MultiCoreBackend::new(MultiCoreConfig::default().with_threads(0)).is_err());
        assert!(MultiCoreBackend::new(MultiCoreConfig::default().with_min_partition(0)).is_err());
    }

    #[test]
    fn partitions_respect_minimum() {
        let backend = small_partitions(4);
        assert_eq!(backend.threads(), 4);
        assert_eq!(backend.partition(20), None);
        assert_eq!(backend.partition(40), Some(16));
        assert_eq!(backend.partition(1000), Some(250));
    }

    #[test]
    fn defect_matches_scalar_backend() {
        let arbiter = MemoryArbiter::shared();
        let backend = small_partitions(3);
        let level = 5;
        let sparse = poisson_matrix::<f64>(level, Stencil::Q1).unwrap();
        let rhs = DeviceVector::from_vec(&arbiter, poisson_rhs(level).unwrap());
        let x = DeviceVector::from_vec(
            &arbiter,
            (0..rhs.len()).map(|i| (i as f64 * 0.01).sin()).collect(),
        );

        for format in [MatrixFormat::BandedQ1, MatrixFormat::Ell] {
            let a = SystemMatrix::from_sparse(&arbiter, &sparse, format).unwrap();
            let mut d_mc = DeviceVector::zeros(&arbiter, rhs.len());
            let mut d_ref = DeviceVector::zeros(&arbiter, rhs.len());
            backend.defect(&mut d_mc, &rhs, &a, &x).unwrap();
            ScalarBackend.defect(&mut d_ref, &rhs, &a, &x).unwrap();
            assert_eq!(d_mc.to_vec().unwrap(), d_ref.to_vec().unwrap());

            let dot_mc = backend.dot(&d_mc, &x).unwrap();
            let dot_ref = ScalarBackend.dot(&d_ref, &x).unwrap();
            assert!((dot_mc - dot_ref).abs() <= 1e-12 * dot_ref.abs().max(1.0));
        }
    }

    #[test]
    fn transfers_match_scalar_backend() {
        let backend = small_partitions(4);
        let (wf, wc) = (33, 17);
        let fine: Vec<f32> = (0..wf * wf).map(|i| (i % 7) as f32).collect();
        let mut coarse_mc = vec![0.0f32; wc * wc];
        let mut coarse_ref = vec![0.0f32; wc * wc];
        backend.restrict_slices(&mut coarse_mc, &fine, wf, wc);
        ScalarBackend.restrict_slices(&mut coarse_ref, &fine, wf, wc);
        assert_eq!(coarse_mc, coarse_ref);

        let mut fine_mc = vec![0.0f32; wf * wf];
        let mut fine_ref = vec![0.0f32; wf * wf];
        backend.prolongate_slices(&mut fine_mc, &coarse_ref, wf, wc);
        ScalarBackend.prolongate_slices(&mut fine_ref, &coarse_ref, wf, wc);
        assert_eq!(fine_mc, fine_ref);
    }

    #[test]
    fn multigrid_solution_matches_scalar_backend() {
        let arbiter = MemoryArbiter::shared();
        let backend = small_partitions(4);
        let mut mc =
            MgInfo::<f64>::poisson(&arbiter, 6, MgConfig::default(), Stencil::Q1).unwrap();
        let mut reference =
            MgInfo::<f64>::poisson(&arbiter, 6, MgConfig::default(), Stencil::Q1).unwrap();
        let r_mc = solve_multigrid(&backend, &mut mc).unwrap();
        let r_ref = solve_multigrid(&ScalarBackend, &mut reference).unwrap();
        let x_mc = mc.solution().to_vec().unwrap();
        let x_ref = reference.solution().to_vec().unwrap();

        assert!(r_mc.converged() && r_ref.converged());
        for (a, b) in x_mc.iter().zip(&x_ref) {
            assert!((a - b).abs() < 1e-7);
        }
    }
}
