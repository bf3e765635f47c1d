use std::sync::OnceLock;

/// Instruction set extensions relevant to the compiled kernels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CpuFeatures {
    pub sse2: bool,
    pub sse41: bool,
    pub avx2: bool,
    pub neon: bool,
}

impl CpuFeatures {
    /// Detects the features of the running CPU. Prefer [`CpuFeatures::get`], which detects once per process.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            let cpuid = raw_cpuid::CpuId::new();
            let info = cpuid.get_feature_info();
            Self {
                sse2: info.as_ref().is_some_and(|info| info.has_sse2()),
                sse41: info.as_ref().is_some_and(|info| info.has_sse41()),
                avx2: cpuid
                    .get_extended_feature_info()
                    .is_some_and(|info| info.has_avx2()),
                neon: false,
            }
        }

        #[cfg(not(target_arch = "x86_64"))]
        Self {
            sse2: false,
            sse41: false,
            avx2: false,
            // NEON is mandatory on aarch64
            neon: cfg!(target_arch = "aarch64"),
        }
    }

    pub fn get() -> &'static Self {
        static FEATURES: OnceLock<CpuFeatures> = OnceLock::new();
        FEATURES.get_or_init(Self::detect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_stable() {
        assert_eq!(CpuFeatures::detect(), *CpuFeatures::get());
        assert!(std::ptr::eq(CpuFeatures::get(), CpuFeatures::get()));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_matches_std_detection() {
        let features = CpuFeatures::get();
        assert_eq!(features.sse41, is_x86_feature_detected!("sse4.1"));
        // Part of the x86_64 baseline
        assert!(features.sse2);
        assert!(!features.neon);
    }

    #[cfg(target_arch = "aarch64")]
    #[test]
    fn test_neon() {
        assert!(CpuFeatures::get().neon);
    }
}
