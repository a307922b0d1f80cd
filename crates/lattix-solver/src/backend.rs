//! Compute backend selection.
//!
//! [`ComputeBackend`] names the numeric backend a solve runs on. It lives in
//! `lattix-solver` so every crate can reference it without circular
//! dependencies; constructing the backend itself is up to the application
//! layer (see the `lattix` umbrella crate).

use lattix_memory::MemoryTag;
use std::fmt;

/// The numeric backend to run kernels on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComputeBackend {
    /// Scalar reference kernels on the host (always available).
    #[default]
    Cpu,
    /// Host kernels vectorised with AVX2/AVX-512 where available.
    Simd,
    /// Host kernels split across a fork-join worker pool.
    MultiCore {
        /// Worker threads; `None` uses the global pool.
        threads: Option<usize>,
    },
    /// Accelerator with its own local store.
    Accelerator,
    /// GPU through wgpu.
    Wgpu {
        /// Adapter name (for informational display).
        adapter_name: String,
    },
}

impl ComputeBackend {
    /// Parse a backend name from a CLI argument string.
    ///
    /// Accepts `"cpu"`, `"simd"`, `"multicore"`, `"accelerator"` and
    /// `"wgpu"` (plus a few aliases).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "cpu" | "scalar" => Some(ComputeBackend::Cpu),
            "simd" | "sse" | "avx" => Some(ComputeBackend::Simd),
            "multicore" | "mc" | "parallel" => Some(ComputeBackend::MultiCore { threads: None }),
            "accelerator" | "cell" | "local-store" => Some(ComputeBackend::Accelerator),
            "wgpu" | "gpu" => Some(ComputeBackend::Wgpu {
                adapter_name: String::new(),
            }),
            _ => None,
        }
    }

    /// Short name for display.
    pub fn name(&self) -> &str {
        match self {
            ComputeBackend::Cpu => "CPU",
            ComputeBackend::Simd => "SIMD",
            ComputeBackend::MultiCore { .. } => "MultiCore",
            ComputeBackend::Accelerator => "Accelerator",
            ComputeBackend::Wgpu { .. } => "wgpu",
        }
    }

    /// Device whose memory the backend computes on.
    pub fn memory(&self) -> MemoryTag {
        match self {
            ComputeBackend::Cpu | ComputeBackend::Simd | ComputeBackend::MultiCore { .. } => {
                MemoryTag::Cpu
            }
            ComputeBackend::Accelerator => MemoryTag::LocalStore,
            ComputeBackend::Wgpu { .. } => MemoryTag::Wgpu,
        }
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeBackend::MultiCore { threads: Some(n) } => {
                write!(f, "MultiCore ({} threads)", n)
            }
            ComputeBackend::Wgpu { adapter_name } if !adapter_name.is_empty() => {
                write!(f, "wgpu ({})", adapter_name)
            }
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_cpu() {
        assert_eq!(ComputeBackend::default(), ComputeBackend::Cpu);
    }

    #[test]
    fn from_name_variants() {
        assert_eq!(ComputeBackend::from_name("cpu"), Some(ComputeBackend::Cpu));
        assert_eq!(ComputeBackend::from_name("SIMD"), Some(ComputeBackend::Simd));
        assert_eq!(
            ComputeBackend::from_name("multicore"),
            Some(ComputeBackend::MultiCore { threads: None })
        );
        assert_eq!(
            ComputeBackend::from_name("cell"),
            Some(ComputeBackend::Accelerator)
        );
        assert!(matches!(
            ComputeBackend::from_name("gpu"),
            Some(ComputeBackend::Wgpu { .. })
        ));
    }

    #[test]
    fn from_name_invalid() {
        assert!(ComputeBackend::from_name("opencl").is_none());
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", ComputeBackend::Cpu), "CPU");
        assert_eq!(
            format!("{}", ComputeBackend::MultiCore { threads: Some(4) }),
            "MultiCore (4 threads)"
        );
        let b = ComputeBackend::Wgpu {
            adapter_name: "llvmpipe".to_string(),
        };
        assert_eq!(format!("{}", b), "wgpu (llvmpipe)");
        let b = ComputeBackend::Wgpu {
            adapter_name: String::new(),
        };
        assert_eq!(format!("{}", b), "wgpu");
    }

    #[test]
    fn memory_devices() {
        assert_eq!(ComputeBackend::Simd.memory(), MemoryTag::Cpu);
        assert_eq!(ComputeBackend::Accelerator.memory(), MemoryTag::LocalStore);
        assert_eq!(
            ComputeBackend::Wgpu {
                adapter_name: String::new()
            }
            .memory(),
            MemoryTag::Wgpu
        );
    }
}
