//! Subcommand implementations.

mod generate;
mod solve;

pub use generate::generate;
pub use solve::{load, solve};

use anyhow::{Result, bail};
use clap::Args;
use lattix::{ComputeBackend, MgConfig, MixedPrecisionConfig, Stencil, TransferKind};

/// Options shared by every command that runs a solver.
#[derive(Args, Debug, Clone)]
pub struct SolverArgs {
    /// Compute backend: cpu, simd, multicore, accelerator or wgpu
    #[arg(short, long, default_value = "cpu")]
    pub backend: String,

    /// Backend of the f64 outer loop in mixed precision
    #[arg(long, default_value = "cpu")]
    pub outer_backend: String,

    /// Worker threads for the multicore backend (default: all cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Precision: f64, f32 or mixed (f32 V-cycles under f64 defect correction)
    #[arg(short, long, default_value = "f64")]
    pub precision: String,

    /// Coarsest level of the hierarchy
    #[arg(long, default_value_t = 1)]
    pub min_level: u32,

    /// Jacobi sweeps before each coarse-grid correction
    #[arg(long, default_value_t = 2)]
    pub pre_smooth: usize,

    /// Jacobi sweeps after each coarse-grid correction
    #[arg(long, default_value_t = 2)]
    pub post_smooth: usize,

    /// Maximum number of V-cycles (per outer step in mixed precision)
    #[arg(long, default_value_t = 64)]
    pub max_iter: usize,

    /// Absolute defect tolerance of the V-cycle
    #[arg(short, long, default_value_t = 1e-8)]
    pub tolerance: f64,

    /// Jacobi damping factor
    #[arg(long, default_value_t = 0.7)]
    pub damping: f64,

    /// Fixed coarse-grid correction step; 0 chooses it adaptively
    #[arg(long, default_value_t = 0.0)]
    pub correction_factor: f64,

    /// Use explicit prolongation matrices instead of transfer stencils
    #[arg(long)]
    pub matrix_transfer: bool,

    /// Run exactly --max-iter cycles without a convergence check
    #[arg(long)]
    pub smoother: bool,

    /// Relative defect reduction of the mixed-precision outer loop
    #[arg(long, default_value_t = 1e-8)]
    pub outer_tolerance: f64,

    /// Maximum outer iterations in mixed precision
    #[arg(long, default_value_t = 16)]
    pub max_outer: usize,

    /// Fixed number of single-precision V-cycles per outer iteration
    #[arg(long, default_value_t = 4)]
    pub inner_cycles: usize,
}

/// Arithmetic the solve runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Double,
    Single,
    Mixed,
}

impl Precision {
    fn name(self) -> &'static str {
        match self {
            Precision::Double => "f64",
            Precision::Single => "f32",
            Precision::Mixed => "mixed (f32 inner, f64 outer)",
        }
    }
}

impl SolverArgs {
    pub fn compute_backend(&self) -> Result<ComputeBackend> {
        self.parse_backend(&self.backend)
    }

    pub fn outer_compute_backend(&self) -> Result<ComputeBackend> {
        self.parse_backend(&self.outer_backend)
    }

    fn parse_backend(&self, name: &str) -> Result<ComputeBackend> {
        let Some(backend) = ComputeBackend::from_name(name) else {
            bail!(
                "unknown backend '{}' (expected cpu, simd, multicore, accelerator or wgpu)",
                name
            );
        };
        Ok(match backend {
            ComputeBackend::MultiCore { .. } => ComputeBackend::MultiCore {
                threads: self.threads,
            },
            other => other,
        })
    }

    pub fn precision(&self) -> Result<Precision> {
        Ok(match self.precision.to_lowercase().as_str() {
            "f64" | "double" => Precision::Double,
            "f32" | "single" => Precision::Single,
            "mixed" => Precision::Mixed,
            other => bail!("unknown precision '{}' (expected f64, f32 or mixed)", other),
        })
    }

    pub fn transfer(&self) -> TransferKind {
        if self.matrix_transfer {
            TransferKind::Matrix
        } else {
            TransferKind::Stencil
        }
    }

    /// Hierarchy configuration for levels `min_level..=max_level`.
    pub fn config(&self, max_level: u32) -> MgConfig {
        MgConfig::default()
            .with_levels(self.min_level, max_level)
            .with_smoothing(self.pre_smooth, self.post_smooth)
            .with_max_iterations(self.max_iter)
            .with_tolerance(self.tolerance)
            .with_damping(self.damping)
            .with_adapt_correction_factor(self.correction_factor)
            .with_smoother(self.smoother)
            .with_transfer(self.transfer())
    }

    /// Configuration of the single-precision hierarchy under mixed precision.
    pub fn inner_config(&self, max_level: u32) -> MgConfig {
        self.config(max_level)
            .with_smoother(true)
            .with_max_iterations(self.inner_cycles)
    }

    pub fn mixed_config(&self) -> MixedPrecisionConfig {
        MixedPrecisionConfig::default()
            .with_outer_tolerance(self.outer_tolerance)
            .with_max_outer_iterations(self.max_outer)
    }
}

pub fn parse_stencil(name: &str) -> Result<Stencil> {
    match Stencil::from_name(name) {
        Some(stencil) => Ok(stencil),
        None => bail!("unknown stencil '{}' (expected five-point or q1)", name),
    }
}
