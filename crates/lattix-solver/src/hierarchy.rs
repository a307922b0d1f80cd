//! The multigrid level hierarchy.
//!
//! [`MgInfo`] holds, for every level `0..=max_level`, the system matrix,
//! the damped inverse diagonal and the working vectors of the V-cycle:
//! `rhs`, the iterate `x`, the prolongated correction `c`, the defect `d`
//! and scratch `temp`. Levels below `min_level` hold zero-length
//! placeholders so that vectors are indexed by level number.

use crate::cancel::CancellationToken;
use crate::error::{Error, Result, check_len};
use crate::jacobi::damped_inverse_diagonal;
use crate::scalar::ScalarBackend;
use crate::transfer::TransferKind;
use lattix_core::io;
use lattix_core::poisson::{poisson_matrix, poisson_rhs, prolongation_matrix};
use lattix_core::{
    BorderMask, DeviceVector, Element, GridKind, MAX_LEVEL, MatrixFormat, MemoryArbiter,
    SparseMatrix, Stencil, SystemMatrix,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Multigrid configuration.
#[derive(Debug, Clone)]
pub struct MgConfig {
    /// Coarsest level; solved with CG.
    pub min_level: u32,
    /// Finest level, on which the system is solved.
    pub max_level: u32,
    /// Jacobi sweeps before restriction.
    pub n_pre_smooth: usize,
    /// Jacobi sweeps after prolongation.
    pub n_post_smooth: usize,
    /// Maximum number of V-cycles.
    pub n_max_iter: usize,
    /// Iteration cap of the coarse CG solve.
    pub n_max_iter_coarse: usize,
    /// Absolute defect norm at which the cycle stops.
    pub tolerance: f64,
    /// Relative residual reduction of the coarse CG solve.
    pub tolerance_coarse: f64,
    /// Fixed step length of the coarse grid correction; `0` computes the
    /// energy-optimal step on every level.
    pub adapt_correction_factor: f64,
    /// Run exactly `n_max_iter` cycles without convergence control.
    pub is_smoother: bool,
    /// Start from a zero iterate (`d = rhs` without a product).
    pub initial_zero: bool,
    /// Skip cycling when the starting defect already meets the tolerance.
    /// When off, at least one cycle runs; cycles still stop once the defect
    /// meets the tolerance.
    pub convergence_check: bool,
    /// Jacobi damping baked into the inverse diagonals.
    pub damping: f64,
    /// How vectors move between levels.
    pub transfer: TransferKind,
    /// Polled once per cycle.
    pub cancel: Option<CancellationToken>,
}

impl Default for MgConfig {
    fn default() -> Self {
        Self {
            min_level: 1,
            max_level: 1,
            n_pre_smooth: 2,
            n_post_smooth: 2,
            n_max_iter: 64,
            n_max_iter_coarse: 256,
            tolerance: 1e-8,
            tolerance_coarse: 1e-4,
            adapt_correction_factor: 0.0,
            is_smoother: false,
            initial_zero: true,
            convergence_check: true,
            damping: 0.7,
            transfer: TransferKind::Stencil,
            cancel: None,
        }
    }
}

impl MgConfig {
    pub fn with_levels(mut self, min_level: u32, max_level: u32) -> Self {
        self.min_level = min_level;
        self.max_level = max_level;
        self
    }

    pub fn with_smoothing(mut self, pre: usize, post: usize) -> Self {
        self.n_pre_smooth = pre;
        self.n_post_smooth = post;
        self
    }

    pub fn with_max_iterations(mut self, n_max_iter: usize) -> Self {
        self.n_max_iter = n_max_iter;
        self
    }

    pub fn with_coarse_solver(mut self, max_iterations: usize, tolerance: f64) -> Self {
        self.n_max_iter_coarse = max_iterations;
        self.tolerance_coarse = tolerance;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_adapt_correction_factor(mut self, factor: f64) -> Self {
        self.adapt_correction_factor = factor;
        self
    }

    pub fn with_smoother(mut self, is_smoother: bool) -> Self {
        self.is_smoother = is_smoother;
        self
    }

    pub fn with_initial_zero(mut self, initial_zero: bool) -> Self {
        self.initial_zero = initial_zero;
        self
    }

    pub fn with_convergence_check(mut self, check: bool) -> Self {
        self.convergence_check = check;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferKind) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Check the level range and numeric parameters.
    pub fn validate(&self) -> Result<()> {
        if self.min_level > self.max_level {
            return Err(Error::InvalidConfig(format!(
                "min_level {} exceeds max_level {}",
                self.min_level, self.max_level
            )));
        }
        if self.max_level > MAX_LEVEL {
            return Err(Error::InvalidConfig(format!(
                "max_level {} exceeds the largest supported level {}",
                self.max_level, MAX_LEVEL
            )));
        }
        if !(self.damping.is_finite() && self.damping > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "damping must be positive, got {}",
                self.damping
            )));
        }
        if self.tolerance < 0.0 || self.tolerance_coarse < 0.0 {
            return Err(Error::InvalidConfig(
                "tolerances must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// A consistent multigrid hierarchy.
pub struct MgInfo<T: Element> {
    pub(crate) config: MgConfig,
    pub(crate) grid: GridKind,
    pub(crate) macro_border_mask: BorderMask,
    pub(crate) a: Vec<SystemMatrix<T>>,
    pub(crate) prolmats: Vec<Option<SystemMatrix<T>>>,
    pub(crate) resmats: Vec<Option<SystemMatrix<T>>>,
    pub(crate) diags_inverted: Vec<DeviceVector<T>>,
    pub(crate) rhs: Vec<DeviceVector<T>>,
    pub(crate) x: Vec<DeviceVector<T>>,
    pub(crate) c: Vec<DeviceVector<T>>,
    pub(crate) d: Vec<DeviceVector<T>>,
    pub(crate) temp: Vec<DeviceVector<T>>,
    arbiter: Arc<MemoryArbiter>,
}

impl<T: Element> MgInfo<T> {
    /// Generated Poisson hierarchy up to `max_level` on the unit square with
    /// homogeneous Dirichlet conditions.
    pub fn poisson(
        arbiter: &Arc<MemoryArbiter>,
        max_level: u32,
        config: MgConfig,
        stencil: Stencil,
    ) -> Result<Self> {
        let config = MgConfig {
            max_level,
            ..config
        };
        config.validate()?;
        let (min, transfer) = (config.min_level, config.transfer);

        let mut builder = MgInfoBuilder::new(arbiter, config).with_rhs(poisson_rhs(max_level)?);
        for level in min..=max_level {
            builder = builder.with_matrix(level, poisson_matrix(level, stencil)?);
            if transfer == TransferKind::Matrix && level > min {
                builder = builder.with_prolongation(level, prolongation_matrix(level)?);
            }
        }
        builder.build()
    }

    /// Read a hierarchy from a directory in the persisted layout. Matrices
    /// are stored in ELL format.
    pub fn from_directory(
        arbiter: &Arc<MemoryArbiter>,
        dir: impl AsRef<Path>,
        config: MgConfig,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        config.validate()?;
        let (min, max, transfer) = (config.min_level, config.max_level, config.transfer);

        let finest = io::read_ell::<T>(io::system_file(dir, max))?;
        let grid = [GridKind::Q1, GridKind::Q1Stacked]
            .into_iter()
            .find(|g| g.level_size(max).is_ok_and(|n| n == finest.rows()));
        let Some(grid) = grid else {
            return Err(Error::size_mismatch(
                "system matrix of the finest level",
                GridKind::Q1.level_size(max)?,
                finest.rows(),
            ));
        };
        log::debug!(
            "loading {} hierarchy levels {}..={} from {}",
            grid,
            min,
            max,
            dir.display()
        );

        let mut builder = MgInfoBuilder::new(arbiter, config)
            .with_grid(grid)
            .with_format(MatrixFormat::Ell)
            .with_rhs(io::read_exp(io::rhs_file(dir))?)
            .with_matrix(max, finest);
        for level in min..max {
            builder = builder.with_matrix(level, io::read_ell(io::system_file(dir, level))?);
        }
        if transfer == TransferKind::Matrix {
            for level in min + 1..=max {
                let p = io::read_ell(io::prolongation_file(dir, level))?;
                builder = builder.with_prolongation(level, p);
            }
        }
        builder.build()
    }

    pub fn config(&self) -> &MgConfig {
        &self.config
    }

    /// Change the configuration of a built hierarchy. The level range is
    /// fixed; a new damping recomputes the inverse diagonals.
    pub fn update_config(&mut self, update: impl FnOnce(&mut MgConfig)) -> Result<()> {
        let mut config = self.config.clone();
        update(&mut config);
        config.validate()?;
        if (config.min_level, config.max_level) != (self.config.min_level, self.config.max_level)
        {
            return Err(Error::InvalidConfig(
                "the level range of a built hierarchy cannot change".to_string(),
            ));
        }
        check_transfer(&config, self.grid, |level| {
            self.prolmats[level as usize].is_some()
        })?;
        if config.damping != self.config.damping {
            let damping = T::val_from_f64(config.damping);
            for level in config.min_level..=config.max_level {
                let l = level as usize;
                self.diags_inverted[l] =
                    damped_inverse_diagonal(&ScalarBackend, &self.a[l], damping, &self.arbiter)?;
            }
        }
        self.config = config;
        Ok(())
    }

    pub fn arbiter(&self) -> &Arc<MemoryArbiter> {
        &self.arbiter
    }

    pub fn grid(&self) -> GridKind {
        self.grid
    }

    pub fn min_level(&self) -> u32 {
        self.config.min_level
    }

    pub fn max_level(&self) -> u32 {
        self.config.max_level
    }

    pub fn macro_border_mask(&self) -> &BorderMask {
        &self.macro_border_mask
    }

    pub fn set_macro_border_mask(&mut self, mask: BorderMask) {
        self.macro_border_mask = mask;
    }

    /// Number of unknowns on `level`; zero below `min_level`.
    pub fn level_size(&self, level: u32) -> usize {
        self.x.get(level as usize).map_or(0, DeviceVector::len)
    }

    pub fn system(&self, level: u32) -> &SystemMatrix<T> {
        &self.a[level as usize]
    }

    /// Finest-level system matrix.
    pub fn finest_system(&self) -> &SystemMatrix<T> {
        self.system(self.max_level())
    }

    pub fn rhs(&self, level: u32) -> &DeviceVector<T> {
        &self.rhs[level as usize]
    }

    pub fn defect(&self, level: u32) -> &DeviceVector<T> {
        &self.d[level as usize]
    }

    /// The iterate on the finest level.
    pub fn solution(&self) -> &DeviceVector<T> {
        &self.x[self.max_level() as usize]
    }

    pub fn solution_mut(&mut self) -> &mut DeviceVector<T> {
        let max = self.max_level() as usize;
        &mut self.x[max]
    }

    /// Replace the finest-level right-hand side.
    pub fn set_rhs(&mut self, values: Vec<T>) -> Result<()> {
        let max = self.max_level() as usize;
        check_len("right-hand side", self.rhs[max].len(), values.len())?;
        self.rhs[max] = DeviceVector::from_vec(&self.arbiter, values);
        Ok(())
    }

    /// Replace the finest-level iterate.
    pub fn set_initial_guess(&mut self, values: Vec<T>) -> Result<()> {
        let max = self.max_level() as usize;
        check_len("initial guess", self.x[max].len(), values.len())?;
        self.x[max] = DeviceVector::from_vec(&self.arbiter, values);
        Ok(())
    }
}

impl<T: Element> std::fmt::Debug for MgInfo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MgInfo")
            .field("config", &self.config)
            .field("grid", &self.grid)
            .field("macro_border_mask", &self.macro_border_mask)
            .field("levels", &self.x.len())
            .finish()
    }
}

fn check_transfer(
    config: &MgConfig,
    grid: GridKind,
    has_prolongation: impl Fn(u32) -> bool,
) -> Result<()> {
    match config.transfer {
        TransferKind::Stencil if grid != GridKind::Q1 => Err(Error::InvalidConfig(format!(
            "stencil transfers need a square Q1 grid, not {}",
            grid
        ))),
        TransferKind::Matrix => {
            match (config.min_level + 1..=config.max_level).find(|&l| !has_prolongation(l)) {
                Some(level) => Err(Error::InvalidConfig(format!(
                    "matrix transfers need a prolongation matrix for level {}",
                    level
                ))),
                None => Ok(()),
            }
        }
        TransferKind::Stencil => Ok(()),
    }
}

/// Assembles an [`MgInfo`] from host matrices, validating every size.
pub struct MgInfoBuilder<T: Element> {
    arbiter: Arc<MemoryArbiter>,
    config: MgConfig,
    grid: GridKind,
    mask: BorderMask,
    format: MatrixFormat,
    matrices: BTreeMap<u32, SparseMatrix<T>>,
    prolongations: BTreeMap<u32, SparseMatrix<T>>,
    rhs: Option<Vec<T>>,
    initial_guess: Option<Vec<T>>,
}

impl<T: Element> MgInfoBuilder<T> {
    pub fn new(arbiter: &Arc<MemoryArbiter>, config: MgConfig) -> Self {
        Self {
            arbiter: Arc::clone(arbiter),
            config,
            grid: GridKind::Q1,
            mask: BorderMask::dirichlet(),
            format: MatrixFormat::BandedQ1,
            matrices: BTreeMap::new(),
            prolongations: BTreeMap::new(),
            rhs: None,
            initial_guess: None,
        }
    }

    pub fn with_grid(mut self, grid: GridKind) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_border_mask(mut self, mask: BorderMask) -> Self {
        self.mask = mask;
        self
    }

    /// Storage format of the system matrices. Transfer matrices are always
    /// stored as ELL.
    pub fn with_format(mut self, format: MatrixFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_matrix(mut self, level: u32, matrix: SparseMatrix<T>) -> Self {
        self.matrices.insert(level, matrix);
        self
    }

    /// Prolongation from `level - 1` to `level`; the restriction is its
    /// transpose.
    pub fn with_prolongation(mut self, level: u32, matrix: SparseMatrix<T>) -> Self {
        self.prolongations.insert(level, matrix);
        self
    }

    /// Finest-level right-hand side; zero if not given.
    pub fn with_rhs(mut self, rhs: Vec<T>) -> Self {
        self.rhs = Some(rhs);
        self
    }

    /// Finest-level starting iterate; zero if not given.
    pub fn with_initial_guess(mut self, x: Vec<T>) -> Self {
        self.initial_guess = Some(x);
        self
    }

    pub fn build(mut self) -> Result<MgInfo<T>> {
        self.config.validate()?;
        let (min, max) = (self.config.min_level, self.config.max_level);
        let prolongations = &self.prolongations;
        check_transfer(&self.config, self.grid, |level| {
            prolongations.contains_key(&level)
        })?;
        let arbiter = &self.arbiter;
        let damping = T::val_from_f64(self.config.damping);

        let levels = max as usize + 1;
        let mut info = MgInfo {
            config: self.config.clone(),
            grid: self.grid,
            macro_border_mask: self.mask,
            a: Vec::with_capacity(levels),
            prolmats: Vec::with_capacity(levels),
            resmats: Vec::with_capacity(levels),
            diags_inverted: Vec::with_capacity(levels),
            rhs: Vec::with_capacity(levels),
            x: Vec::with_capacity(levels),
            c: Vec::with_capacity(levels),
            d: Vec::with_capacity(levels),
            temp: Vec::with_capacity(levels),
            arbiter: Arc::clone(arbiter),
        };

        for level in 0..=max {
            let (n, a) = if level < min {
                let empty = SparseMatrix::new(0, 0);
                (0, SystemMatrix::from_sparse(arbiter, &empty, MatrixFormat::Ell)?)
            } else {
                let n = self.grid.level_size(level)?;
                let sparse = self.matrices.remove(&level).ok_or_else(|| {
                    Error::InvalidConfig(format!("no system matrix for level {}", level))
                })?;
                check_len("system matrix rows", n, sparse.rows())?;
                check_len("system matrix columns", n, sparse.cols())?;
                (n, SystemMatrix::from_sparse(arbiter, &sparse, self.format)?)
            };

            let (prolmat, resmat) = match self.prolongations.remove(&level) {
                Some(p) if self.config.transfer == TransferKind::Matrix && level > min => {
                    check_len("prolongation rows", n, p.rows())?;
                    check_len(
                        "prolongation columns",
                        self.grid.level_size(level - 1)?,
                        p.cols(),
                    )?;
                    let r = p.transpose();
                    (
                        Some(SystemMatrix::from_sparse(arbiter, &p, MatrixFormat::Ell)?),
                        Some(SystemMatrix::from_sparse(arbiter, &r, MatrixFormat::Ell)?),
                    )
                }
                _ => (None, None),
            };

            let diag = if level < min {
                DeviceVector::empty(arbiter)
            } else {
                damped_inverse_diagonal(&ScalarBackend, &a, damping, arbiter)?
            };

            info.a.push(a);
            info.prolmats.push(prolmat);
            info.resmats.push(resmat);
            info.diags_inverted.push(diag);
            for vectors in [
                &mut info.rhs,
                &mut info.x,
                &mut info.c,
                &mut info.d,
                &mut info.temp,
            ] {
                vectors.push(DeviceVector::zeros(arbiter, n));
            }
        }

        if let Some(rhs) = self.rhs.take() {
            info.set_rhs(rhs)?;
        }
        if let Some(x) = self.initial_guess.take() {
            info.set_initial_guess(x)?;
        }
        log::debug!(
            "built {} hierarchy: levels {}..={}, {} unknowns on the finest level",
            info.grid,
            min,
            max,
            info.level_size(max)
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn poisson_hierarchy_shapes() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default().with_levels(2, 0);
        let info = MgInfo::<f64>::poisson(&arbiter, 4, config, Stencil::Q1).unwrap();

        assert_eq!(info.max_level(), 4);
        for level in 0..2 {
            assert_eq!(info.level_size(level), 0);
            assert_eq!(info.system(level).rows(), 0);
        }
        for level in 2..=4 {
            let n = GridKind::Q1.level_size(level).unwrap();
            assert_eq!(info.level_size(level), n);
            assert_eq!(info.system(level).rows(), n);
            assert_eq!(info.diags_inverted[level as usize].len(), n);
        }
        assert!(info.prolmats.iter().all(Option::is_none));
        assert!(info.rhs(4).to_vec().unwrap().iter().any(|&v| v > 0.0));
        assert!(info.rhs(3).to_vec().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn matrix_transfers_build_transposes() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default()
            .with_levels(1, 3)
            .with_transfer(TransferKind::Matrix);
        let info = MgInfo::<f32>::poisson(&arbiter, 3, config, Stencil::FivePoint).unwrap();
        assert!(info.prolmats[1].is_none());
        for level in 2..=3usize {
            let p = info.prolmats[level].as_ref().unwrap().to_sparse().unwrap();
            let r = info.resmats[level].as_ref().unwrap().to_sparse().unwrap();
            assert_eq!(r, p.transpose());
        }
    }

    #[test]
    fn builder_reports_missing_and_misshapen_parts() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default().with_levels(1, 2);

        let missing = MgInfoBuilder::<f64>::new(&arbiter, config.clone())
            .with_matrix(2, poisson_matrix(2, Stencil::Q1).unwrap())
            .build();
        assert!(matches!(missing, Err(Error::InvalidConfig(_))));

        let wrong_size = MgInfoBuilder::<f64>::new(&arbiter, config.clone())
            .with_matrix(1, poisson_matrix(1, Stencil::Q1).unwrap())
            .with_matrix(2, poisson_matrix(3, Stencil::Q1).unwrap())
            .build();
        assert!(wrong_size.unwrap_err().is_size_mismatch());

        let wrong_rhs = MgInfoBuilder::<f64>::new(&arbiter, config.clone())
            .with_matrix(1, poisson_matrix(1, Stencil::Q1).unwrap())
            .with_matrix(2, poisson_matrix(2, Stencil::Q1).unwrap())
            .with_rhs(vec![1.0; 24])
            .build();
        assert!(wrong_rhs.unwrap_err().is_size_mismatch());

        let no_prolongation = MgInfoBuilder::<f64>::new(
            &arbiter,
            config.with_transfer(TransferKind::Matrix),
        )
        .with_matrix(1, poisson_matrix(1, Stencil::Q1).unwrap())
        .with_matrix(2, poisson_matrix(2, Stencil::Q1).unwrap())
        .build();
        assert!(matches!(no_prolongation, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn level_range_is_validated() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default().with_levels(3, 2);
        assert!(matches!(
            MgInfoBuilder::<f64>::new(&arbiter, config).build(),
            Err(Error::InvalidConfig(_))
        ));
        let config = MgConfig::default().with_levels(1, MAX_LEVEL + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn update_config_keeps_levels_and_recomputes_damping() {
        let arbiter = MemoryArbiter::shared();
        let mut info =
            MgInfo::<f64>::poisson(&arbiter, 2, MgConfig::default(), Stencil::FivePoint).unwrap();
        let before = info.diags_inverted[2].to_vec().unwrap();

        info.update_config(|c| c.damping = 0.35).unwrap();
        let after = info.diags_inverted[2].to_vec().unwrap();
        for (b, a) in before.iter().zip(&after) {
            assert!((b / 2.0 - a).abs() < 1e-15);
        }

        assert!(info.update_config(|c| c.min_level = 0).is_err());
        assert!(
            info.update_config(|c| c.transfer = TransferKind::Matrix)
                .is_err()
        );
        assert_eq!(info.config().damping, 0.35);
    }

    #[test]
    fn directory_round_trip() {
        let dir = tempdir().unwrap();
        io::write_poisson_directory(dir.path(), 3, Stencil::Q1).unwrap();
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default()
            .with_levels(1, 3)
            .with_transfer(TransferKind::Matrix);
        let loaded = MgInfo::<f64>::from_directory(&arbiter, dir.path(), config).unwrap();
        let generated = MgInfo::<f64>::poisson(
            &arbiter,
            3,
            MgConfig::default()
                .with_levels(1, 3)
                .with_transfer(TransferKind::Matrix),
            Stencil::Q1,
        )
        .unwrap();

        assert_eq!(loaded.grid(), GridKind::Q1);
        assert_eq!(loaded.system(3).format(), MatrixFormat::Ell);
        assert_eq!(
            loaded.system(3).to_sparse().unwrap(),
            generated.system(3).to_sparse().unwrap()
        );
        assert_eq!(
            loaded.rhs(3).to_vec().unwrap(),
            generated.rhs(3).to_vec().unwrap()
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default().with_levels(1, 2);
        let err = MgInfo::<f64>::from_directory(&arbiter, "/nonexistent/lattix", config);
        assert!(matches!(err, Err(Error::Core(lattix_core::Error::Io(_)))));
    }
}
