//! Affine gap dynamic programming (Gotoh) shared by every kernel.
//!
//! Rows walk the query, columns walk the target. Three values are tracked per cell:
//!
//! - `H`: best score of an alignment ending at the cell
//! - `E`: best score ending with a deletion (gap in the query, consumes the target)
//! - `F`: best score ending with an insertion (gap in the target, consumes the query)
//!
//! Opening a gap costs `gap_open` and each following position costs `gap_extend`, so a gap
//! of length N costs `gap_open + (N - 1) * gap_extend`.
//!
//! Scores are computed with the narrowest integer width first (`i8`) using saturating
//! arithmetic. When a score leaves the range where saturation can't have happened, the target
//! is recomputed with a wider integer width (`i16` then `i32`). With [`Overflow::Simple`] the
//! whole batch is recomputed as soon as one target overflows, with [`Overflow::Buckets`] only
//! the offending target is. The loops are plain scalar code, each kernel only compiles them
//! with its own target features enabled.
//!
//! Semi-global and overlap alignments start from the best score available without aligning
//! anything: `0` at the top left corner for overlap, the query entirely gapped for
//! semi-global. An end cell inside the matrix with an equal score replaces it, so those ties
//! report coordinates.
//!
//! ```text
//! query: "ACG", target: "TACGT", local
//!
//!       T  A  C  G  T
//!    0  0  0  0  0  0
//! A  0  0  2  0  0  0
//! C  0  0  0  4  1  0
//! G  0  0  0  1  6  3     <- best cell, traced back diagonally to (0, 1)
//! ```

use tracing::trace;

use super::{KernelArgs, RawResult, Status};
use crate::{Algorithm, Mode, Overflow, result::AlignOp};

// Traceback flags, one byte per cell
const SRC_DIAG: u8 = 0;
const SRC_E: u8 = 1;
const SRC_F: u8 = 2;
const SRC_STOP: u8 = 3;
const SRC_MASK: u8 = 0b11;
const E_OPENED: u8 = 1 << 2;
const F_OPENED: u8 = 1 << 3;

pub(crate) trait Lane: Copy + Ord + std::fmt::Debug {
    const ZERO: Self;
    const MIN: Self;
    const MAX: Self;
    const BITS: u32;

    fn from_i64(value: i64) -> Option<Self>;
    fn to_i64(self) -> i64;
    fn saturating_add(self, other: Self) -> Self;
    fn saturating_sub(self, other: Self) -> Self;
}

macro_rules! impl_lane {
    ($($ty:ty),*) => {
        $(
            impl Lane for $ty {
                const ZERO: Self = 0;
                const MIN: Self = <$ty>::MIN;
                const MAX: Self = <$ty>::MAX;
                const BITS: u32 = <$ty>::BITS;

                #[inline(always)]
                fn from_i64(value: i64) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }

                #[inline(always)]
                fn to_i64(self) -> i64 {
                    i64::from(self)
                }

                #[inline(always)]
                fn saturating_add(self, other: Self) -> Self {
                    <$ty>::saturating_add(self, other)
                }

                #[inline(always)]
                fn saturating_sub(self, other: Self) -> Self {
                    <$ty>::saturating_sub(self, other)
                }
            }
        )*
    };
}

impl_lane!(i8, i16, i32);

/// Kernel arguments converted to the integer width `L`
struct Params<L> {
    scores: Vec<L>,
    alphabet_size: usize,
    gap_open: L,
    gap_extend: L,
    gap_open_wide: i64,
    gap_extend_wide: i64,
    /// Any `H` inside `[lo, hi]` is exact, since adding one score or penalty can't saturate
    lo: L,
    hi: L,
}

impl<L: Lane> Params<L> {
    /// Returns `None` when the scores or penalties don't fit in `L`
    #[inline(always)]
    fn new(args: &KernelArgs<'_>) -> Option<Self> {
        let gap_open_wide = i64::from(args.gap_open);
        let gap_extend_wide = i64::from(args.gap_extend);
        let margin = args
            .score_matrix
            .iter()
            .map(|&score| i64::from(score).abs())
            .chain([gap_open_wide, gap_extend_wide])
            .max()
            .unwrap_or(0)
            + 1;

        let lo = L::from_i64(L::MIN.to_i64() + margin)?;
        let hi = L::from_i64(L::MAX.to_i64() - margin)?;
        if lo >= hi {
            return None;
        }

        Some(Self {
            scores: args
                .score_matrix
                .iter()
                .map(|&score| L::from_i64(i64::from(score)))
                .collect::<Option<Vec<_>>>()?,
            alphabet_size: args.alphabet_size,
            gap_open: L::from_i64(gap_open_wide)?,
            gap_extend: L::from_i64(gap_extend_wide)?,
            gap_open_wide,
            gap_extend_wide,
            lo,
            hi,
        })
    }

    /// Score of a gap of `len` positions on the matrix border
    #[inline(always)]
    fn border_gap(&self, len: usize) -> Option<L> {
        if len == 0 {
            return Some(L::ZERO);
        }
        let cost = self
            .gap_extend_wide
            .saturating_mul(len as i64 - 1)
            .saturating_add(self.gap_open_wide);
        L::from_i64(-cost).filter(|&score| score >= self.lo)
    }

    #[inline(always)]
    fn in_range(&self, score: L) -> bool {
        score >= self.lo && score <= self.hi
    }
}

/// Rows reused across targets to avoid reallocating per alignment
struct Scratch<L> {
    h_prev: Vec<L>,
    h_cur: Vec<L>,
    f: Vec<L>,
    trace: Vec<u8>,
}

impl<L: Lane> Scratch<L> {
    fn new() -> Self {
        Self {
            h_prev: vec![],
            h_cur: vec![],
            f: vec![],
            trace: vec![],
        }
    }

    #[inline(always)]
    fn reset(&mut self, cols: usize, cells: usize) {
        self.h_prev.clear();
        self.h_prev.resize(cols, L::ZERO);
        self.h_cur.clear();
        self.h_cur.resize(cols, L::ZERO);
        self.f.clear();
        self.f.resize(cols, L::MIN);
        self.trace.clear();
        self.trace.resize(cells, 0);
    }
}

#[derive(Debug, Clone, Copy)]
struct Best<L> {
    score: L,
    row: usize,
    col: usize,
}

impl<L: Lane> Best<L> {
    #[inline(always)]
    fn offer(&mut self, score: L, row: usize, col: usize) {
        if score > self.score {
            *self = Self { score, row, col };
        }
    }

    /// Same as [`Best::offer`], but also wins a tie against a cell on the first row or column
    #[inline(always)]
    fn offer_over_border(&mut self, score: L, row: usize, col: usize) {
        let on_border = self.row == 0 || self.col == 0;
        if score > self.score || (score == self.score && on_border) {
            *self = Self { score, row, col };
        }
    }
}

#[inline(always)]
pub(crate) fn run(args: &KernelArgs<'_>, results: &mut [RawResult]) -> Status {
    if !is_valid(args, results.len()) {
        return Status::INVALID_INPUT;
    }

    match args.overflow {
        Overflow::Simple => run_simple(args, results),
        Overflow::Buckets => run_buckets(args, results),
    }
}

fn is_valid(args: &KernelArgs<'_>, results_len: usize) -> bool {
    let size = args.alphabet_size;
    let in_alphabet = |sequence: &[u8]| sequence.iter().all(|&s| usize::from(s) < size);

    size > 0
        && args.score_matrix.len() == size * size
        && args.gap_open >= 0
        && args.gap_extend >= 0
        && results_len == args.targets.len()
        && in_alphabet(args.query)
        && args.targets.iter().all(|&target| in_alphabet(target))
}

/// Escalates every target to the next lane width as soon as one overflows
#[inline(always)]
fn run_simple(args: &KernelArgs<'_>, results: &mut [RawResult]) -> Status {
    if align_all::<i8>(args, results)
        || align_all::<i16>(args, results)
        || align_all::<i32>(args, results)
    {
        Status::OK
    } else {
        Status::OVERFLOW
    }
}

#[inline(always)]
fn align_all<L: Lane>(args: &KernelArgs<'_>, results: &mut [RawResult]) -> bool {
    let Some(params) = Params::<L>::new(args) else {
        return false;
    };
    let mut scratch = Scratch::new();

    for (index, (target, result)) in args.targets.iter().zip(results.iter_mut()).enumerate() {
        match align(&params, args, target, &mut scratch) {
            Some(aligned) => *result = aligned,
            None => {
                trace!(bits = L::BITS, target = index, "score overflow, widening all targets");
                return false;
            }
        }
    }
    true
}

/// Escalates only the targets which overflow
#[inline(always)]
fn run_buckets(args: &KernelArgs<'_>, results: &mut [RawResult]) -> Status {
    let params_8 = Params::<i8>::new(args);
    let params_16 = Params::<i16>::new(args);
    let params_32 = Params::<i32>::new(args);
    let mut scratch_8 = Scratch::new();
    let mut scratch_16 = Scratch::new();
    let mut scratch_32 = Scratch::new();

    for (index, (target, result)) in args.targets.iter().zip(results.iter_mut()).enumerate() {
        let aligned = params_8
            .as_ref()
            .and_then(|params| align(params, args, target, &mut scratch_8))
            .or_else(|| {
                trace!(bits = 16, target = index, "score overflow, widening target");
                params_16
                    .as_ref()
                    .and_then(|params| align(params, args, target, &mut scratch_16))
            })
            .or_else(|| {
                trace!(bits = 32, target = index, "score overflow, widening target");
                params_32
                    .as_ref()
                    .and_then(|params| align(params, args, target, &mut scratch_32))
            });

        match aligned {
            Some(aligned) => *result = aligned,
            None => return Status::OVERFLOW,
        }
    }
    Status::OK
}

/// Aligns the query against one target, returning `None` on overflow
#[inline(always)]
fn align<L: Lane>(
    params: &Params<L>,
    args: &KernelArgs<'_>,
    target: &[u8],
    scratch: &mut Scratch<L>,
) -> Option<RawResult> {
    let query = args.query;
    let (rows, cols) = (query.len(), target.len());
    let algorithm = args.algorithm;
    let full = args.mode == Mode::Full;
    let local = algorithm == Algorithm::Sw;
    // Skipping the start of the target (first row) is only penalized for global alignment,
    // skipping the start of the query (first column) also for semi-global alignment
    let penalize_first_row = algorithm == Algorithm::Nw;
    let penalize_first_col = matches!(algorithm, Algorithm::Nw | Algorithm::Hw);

    scratch.reset(cols + 1, if full { (rows + 1) * (cols + 1) } else { 0 });
    if penalize_first_row {
        for col in 1..=cols {
            scratch.h_prev[col] = params.border_gap(col)?;
        }
    }

    let mut best = Best {
        score: L::ZERO,
        row: 0,
        col: 0,
    };

    for row in 1..=rows {
        let query_offset = usize::from(query[row - 1]) * params.alphabet_size;
        let first = if penalize_first_col {
            params.border_gap(row)?
        } else {
            L::ZERO
        };
        scratch.h_cur[0] = first;

        let mut diag = scratch.h_prev[0];
        let mut left = first;
        let mut e = L::MIN;

        for col in 1..=cols {
            let up = scratch.h_prev[col];

            let e_open = left.saturating_sub(params.gap_open);
            let e_extend = e.saturating_sub(params.gap_extend);
            let e_opened = e_open >= e_extend;
            e = e_open.max(e_extend);

            let f_open = up.saturating_sub(params.gap_open);
            let f_extend = scratch.f[col].saturating_sub(params.gap_extend);
            let f_opened = f_open >= f_extend;
            let f = f_open.max(f_extend);

            let d = diag.saturating_add(params.scores[query_offset + usize::from(target[col - 1])]);

            let (mut h, mut src) = if d >= e && d >= f {
                (d, SRC_DIAG)
            } else if e >= f {
                (e, SRC_E)
            } else {
                (f, SRC_F)
            };
            if local && h <= L::ZERO {
                h = L::ZERO;
                src = SRC_STOP;
            }
            if !params.in_range(h) {
                return None;
            }

            if full {
                scratch.trace[row * (cols + 1) + col] = src
                    | if e_opened { E_OPENED } else { 0 }
                    | if f_opened { F_OPENED } else { 0 };
            }
            if local {
                best.offer(h, row, col);
            }

            scratch.f[col] = f;
            scratch.h_cur[col] = h;
            diag = up;
            left = h;
        }

        // Overlap alignment may end anywhere on the last column
        if algorithm == Algorithm::Ov && cols > 0 {
            best.offer_over_border(scratch.h_cur[cols], row, cols);
        }

        std::mem::swap(&mut scratch.h_prev, &mut scratch.h_cur);
    }

    // `h_prev` now holds the last row
    let last_row = &scratch.h_prev;
    match algorithm {
        Algorithm::Nw => {
            best = Best {
                score: last_row[cols],
                row: rows,
                col: cols,
            }
        }
        Algorithm::Hw => {
            best = Best {
                score: last_row[0],
                row: rows,
                col: 0,
            };
            for col in 1..=cols {
                best.offer_over_border(last_row[col], rows, col);
            }
        }
        Algorithm::Ov => {
            for col in 1..=cols {
                best.offer_over_border(last_row[col], rows, col);
            }
        }
        Algorithm::Sw => {}
    }

    let mut result = RawResult {
        score: Some(best.score.to_i64() as i32),
        ..RawResult::default()
    };

    // Nothing aligned, e.g. a local alignment without any positive score
    if args.mode == Mode::Score || best.row == 0 || best.col == 0 {
        return Some(result);
    }
    result.query_end = Some(best.row - 1);
    result.target_end = Some(best.col - 1);

    if full {
        let (ops, (query_start, target_start)) = traceback(
            &scratch.trace,
            cols + 1,
            query,
            target,
            algorithm,
            (best.row, best.col),
        );
        result.query_start = Some(query_start);
        result.target_start = Some(target_start);
        result.alignment = Some(ops);
    }

    Some(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    H,
    E,
    F,
}

/// Walks back from the end cell, returning the operations in alignment order and the
/// (0-based) start position in the query and target
fn traceback(
    trace: &[u8],
    cols: usize,
    query: &[u8],
    target: &[u8],
    algorithm: Algorithm,
    (mut row, mut col): (usize, usize),
) -> (Vec<AlignOp>, (usize, usize)) {
    let mut ops = Vec::with_capacity(row + col);
    let mut state = State::H;

    loop {
        let flags = trace[row * cols + col];
        match state {
            State::H => {
                if row == 0 || col == 0 {
                    // Leading gaps belong to the alignment when they were penalized
                    if algorithm == Algorithm::Nw {
                        ops.extend(std::iter::repeat_n(AlignOp::Deletion, col));
                        col = 0;
                    }
                    if matches!(algorithm, Algorithm::Nw | Algorithm::Hw) {
                        ops.extend(std::iter::repeat_n(AlignOp::Insertion, row));
                        row = 0;
                    }
                    break;
                }

                match flags & SRC_MASK {
                    SRC_DIAG => {
                        ops.push(if query[row - 1] == target[col - 1] {
                            AlignOp::Match
                        } else {
                            AlignOp::Mismatch
                        });
                        row -= 1;
                        col -= 1;
                    }
                    SRC_E => state = State::E,
                    SRC_F => state = State::F,
                    _ => break,
                }
            }
            State::E => {
                ops.push(AlignOp::Deletion);
                col -= 1;
                if flags & E_OPENED != 0 {
                    state = State::H;
                }
            }
            State::F => {
                ops.push(AlignOp::Insertion);
                row -= 1;
                if flags & F_OPENED != 0 {
                    state = State::H;
                }
            }
        }
    }

    ops.reverse();
    (ops, (row, col))
}
