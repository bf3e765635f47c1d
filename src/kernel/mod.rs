//! Alignment kernels and their runtime selection.
//!
//! Every kernel implements the same contract: given an encoded query, a batch of encoded
//! targets, gap penalties and a flat score matrix, populate one [`RawResult`] per target and
//! return a [`Status`]. The kernels are functionally identical, they only differ in the
//! instruction set extensions the code is generated for.
//!
//! The kernels compiled into the build are kept in a registry ordered by expected throughput
//! (widest vectors first). The first one supported by the running CPU is selected once and
//! reused for the rest of the process. When none qualifies, searching fails with
//! [`Error::RuntimeUnavailable`](crate::Error::RuntimeUnavailable) instead of falling back to a
//! slow path.

use std::fmt;
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::{Algorithm, Mode, Overflow, result::AlignOp};

mod cpu;
mod dp;

pub use cpu::CpuFeatures;

/// Status code returned by a kernel, `0` on success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(0);
    /// Scores exceeded the widest supported integer range
    pub const OVERFLOW: Status = Status(1);
    /// The kernel can't run on this CPU
    pub const UNSUPPORTED: Status = Status(2);
    /// Inconsistent arguments, such as a symbol outside of the score matrix
    pub const INVALID_INPUT: Status = Status(3);
    /// The kernel reported success but left a result without a score
    pub const INCOMPLETE: Status = Status(4);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match *self {
            Self::OK => "success",
            Self::OVERFLOW => "score overflow",
            Self::UNSUPPORTED => "unsupported CPU",
            Self::INVALID_INPUT => "invalid input",
            Self::INCOMPLETE => "incomplete results",
            _ => "unknown error",
        };
        write!(f, "status {} ({reason})", self.0)
    }
}

/// Output record for one target, populated in place by the kernel.
///
/// Coordinates are 0-based and inclusive. Which fields are set depends on the [`Mode`]:
/// the score always, the end coordinates for [`Mode::End`] and [`Mode::Full`], the start
/// coordinates and the alignment only for [`Mode::Full`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResult {
    pub score: Option<i32>,
    pub query_end: Option<usize>,
    pub target_end: Option<usize>,
    pub query_start: Option<usize>,
    pub target_start: Option<usize>,
    pub alignment: Option<Vec<AlignOp>>,
}

#[derive(Debug, Clone, Copy)]
pub struct KernelArgs<'a> {
    /// Query as symbol indices
    pub query: &'a [u8],
    /// Targets as symbol indices, borrowed from the database
    pub targets: &'a [&'a [u8]],
    /// Cost of the first position of a gap
    pub gap_open: i32,
    /// Cost of every following position of a gap
    pub gap_extend: i32,
    /// Row-major `alphabet_size * alphabet_size` scores
    pub score_matrix: &'a [i32],
    pub alphabet_size: usize,
    pub mode: Mode,
    pub algorithm: Algorithm,
    pub overflow: Overflow,
}

pub trait Kernel: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn is_supported(&self, features: &CpuFeatures) -> bool;

    /// Aligns the query against every target, writing `results[i]` for `targets[i]`.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Kernel::is_supported`] returns true for the running CPU
    unsafe fn run(&self, args: &KernelArgs<'_>, results: &mut [RawResult]) -> Status;
}

macro_rules! define_kernel {
    (
        $name:ident,
        label = $label:literal,
        target_feature = $feature:literal,
        supported = |$features:ident| $supported:expr
    ) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl $name {
            #[doc = concat!("# Safety\n\nCaller must ensure that the target feature `", $feature, "` is available")]
            #[target_feature(enable = $feature)]
            unsafe fn run_impl(args: &KernelArgs<'_>, results: &mut [RawResult]) -> Status {
                dp::run(args, results)
            }
        }

        impl Kernel for $name {
            fn name(&self) -> &'static str {
                $label
            }

            fn is_supported(&self, $features: &CpuFeatures) -> bool {
                $supported
            }

            unsafe fn run(&self, args: &KernelArgs<'_>, results: &mut [RawResult]) -> Status {
                // SAFETY: the caller guarantees the target feature is available
                unsafe { Self::run_impl(args, results) }
            }
        }
    };
}

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
define_kernel!(
    Avx2Kernel,
    label = "avx2",
    target_feature = "avx2",
    supported = |features| features.avx2
);

#[cfg(all(target_arch = "x86_64", feature = "sse4"))]
define_kernel!(
    Sse41Kernel,
    label = "sse4.1",
    target_feature = "sse4.1",
    supported = |features| features.sse41
);

#[cfg(all(target_arch = "x86_64", feature = "sse2"))]
define_kernel!(
    Sse2Kernel,
    label = "sse2",
    target_feature = "sse2",
    supported = |features| features.sse2
);

#[cfg(all(target_arch = "aarch64", feature = "neon"))]
define_kernel!(
    NeonKernel,
    label = "neon",
    target_feature = "neon",
    supported = |features| features.neon
);

/// Kernels compiled into this build, fastest first
static KERNELS: &[&dyn Kernel] = &[
    #[cfg(all(target_arch = "x86_64", feature = "avx2"))]
    &Avx2Kernel,
    #[cfg(all(target_arch = "x86_64", feature = "sse4"))]
    &Sse41Kernel,
    #[cfg(all(target_arch = "x86_64", feature = "sse2"))]
    &Sse2Kernel,
    #[cfg(all(target_arch = "aarch64", feature = "neon"))]
    &NeonKernel,
];

pub fn compiled_kernels() -> &'static [&'static dyn Kernel] {
    KERNELS
}

/// Picks the first kernel in priority order which the CPU supports
pub fn select(
    kernels: &[&'static dyn Kernel],
    features: &CpuFeatures,
) -> Option<&'static dyn Kernel> {
    kernels
        .iter()
        .copied()
        .find(|kernel| kernel.is_supported(features))
}

/// The kernel used by every search in this process, or `None` if no compiled kernel runs on
/// this CPU
pub fn selected_kernel() -> Option<&'static dyn Kernel> {
    static SELECTED: OnceLock<Option<&'static dyn Kernel>> = OnceLock::new();
    *SELECTED.get_or_init(|| {
        let features = CpuFeatures::get();
        let kernel = select(KERNELS, features);
        match kernel {
            Some(kernel) => debug!(kernel = kernel.name(), ?features, "selected alignment kernel"),
            None => warn!(
                ?features,
                compiled = KERNELS.len(),
                "no compiled alignment kernel is supported by this CPU"
            ),
        }
        kernel
    })
}
