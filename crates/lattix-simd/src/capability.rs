//! Which vector kernel path the running CPU can take.
//!
//! The dot and scaled-sum kernels dispatch on this value; anything other
//! than x86 with AVX2+FMA always takes the scalar path.

use std::fmt;
use std::sync::OnceLock;

/// Kernel path for `dot_*` and `scaled_sum_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdCapability {
    /// 512-bit kernels. The f32 scaled sum still uses 256-bit lanes.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Avx512,
    /// 256-bit kernels with fused multiply-add.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Avx2,
    /// Plain loops.
    Scalar,
}

impl SimdCapability {
    /// Best path for this CPU. Feature detection runs once per process.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<SimdCapability> = OnceLock::new();
        *DETECTED.get_or_init(|| {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            {
                if is_x86_feature_detected!("avx512f") {
                    return SimdCapability::Avx512;
                }
                if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
                    return SimdCapability::Avx2;
                }
            }
            SimdCapability::Scalar
        })
    }

    /// Short lowercase name, as used in log lines and benchmark ids.
    pub fn name(self) -> &'static str {
        match self {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            SimdCapability::Avx512 => "avx512",
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            SimdCapability::Avx2 => "avx2",
            SimdCapability::Scalar => "scalar",
        }
    }
}

impl fmt::Display for SimdCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_is_stable() {
        assert_eq!(SimdCapability::detect(), SimdCapability::detect());
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    #[test]
    fn non_x86_takes_scalar_path() {
        assert_eq!(SimdCapability::detect(), SimdCapability::Scalar);
    }

    #[test]
    fn display_uses_short_name() {
        assert_eq!(SimdCapability::Scalar.to_string(), "scalar");
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        assert_eq!(SimdCapability::Avx2.to_string(), "avx2");
    }
}
