use itertools::Itertools;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kernel::{RawResult, Status};

/// One step of an alignment trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AlignOp {
    /// Query and target symbols are identical
    Match = 0,
    /// Gap in the query, consumes one target symbol
    Deletion = 1,
    /// Gap in the target, consumes one query symbol
    Insertion = 2,
    /// Query and target symbols differ
    Mismatch = 3,
}

impl AlignOp {
    pub fn symbol(self) -> char {
        match self {
            Self::Match => 'M',
            Self::Deletion => 'D',
            Self::Insertion => 'I',
            Self::Mismatch => 'X',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'M' => Some(Self::Match),
            'D' => Some(Self::Deletion),
            'I' => Some(Self::Insertion),
            'X' => Some(Self::Mismatch),
            _ => None,
        }
    }

    /// CIGAR operation, which doesn't distinguish matches from mismatches
    pub fn cigar_class(self) -> char {
        match self {
            Self::Match | Self::Mismatch => 'M',
            op => op.symbol(),
        }
    }

    pub fn consumes_query(self) -> bool {
        self != Self::Deletion
    }

    pub fn consumes_target(self) -> bool {
        self != Self::Insertion
    }
}

/// Sequence against which [`SearchResult::coverage`] is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Query,
    Target,
}

/// Alignment of the query against one target of a [`Database`](crate::Database).
///
/// Coordinates are 0-based and inclusive, and only present when the [`Mode`](crate::Mode)
/// requested them and something was aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchResult {
    target_index: usize,
    score: i32,
    query_length: usize,
    target_length: usize,
    end: Option<(usize, usize)>,
    start: Option<(usize, usize)>,
    alignment: Option<Vec<AlignOp>>,
}

impl SearchResult {
    pub(crate) fn from_raw(
        target_index: usize,
        raw: RawResult,
        query_length: usize,
        target_length: usize,
    ) -> Result<Self> {
        let score = raw.score.ok_or(Error::Computation {
            status: Status::INCOMPLETE,
        })?;

        Ok(Self {
            target_index,
            score,
            query_length,
            target_length,
            end: raw.query_end.zip(raw.target_end),
            start: raw.query_start.zip(raw.target_start),
            alignment: raw.alignment.filter(|ops| !ops.is_empty()),
        })
    }

    /// Position of the target in the database at the time of the search
    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn query_end(&self) -> Option<usize> {
        self.end.map(|(query, _)| query)
    }

    pub fn target_end(&self) -> Option<usize> {
        self.end.map(|(_, target)| target)
    }

    pub fn query_start(&self) -> Option<usize> {
        self.start.map(|(query, _)| query)
    }

    pub fn target_start(&self) -> Option<usize> {
        self.start.map(|(_, target)| target)
    }

    pub fn query_length(&self) -> usize {
        self.query_length
    }

    pub fn target_length(&self) -> usize {
        self.target_length
    }

    /// Alignment trace, only available with [`Mode::Full`](crate::Mode::Full)
    pub fn ops(&self) -> Option<&[AlignOp]> {
        self.alignment.as_deref()
    }

    /// Alignment trace as a string of `M`, `D`, `I` and `X` symbols
    pub fn alignment(&self) -> Option<String> {
        self.ops()
            .map(|ops| ops.iter().map(|op| op.symbol()).collect())
    }

    /// Run-length encoded alignment trace, e.g. `2M1D2I`.
    ///
    /// Matches and mismatches are both reported as `M`.
    pub fn cigar(&self) -> Option<String> {
        let ops = self.ops()?;
        Some(
            ops.iter()
                .map(|op| op.cigar_class())
                .dedup_with_count()
                .map(|(count, class)| format!("{count}{class}"))
                .collect(),
        )
    }

    /// Fraction of the alignment columns which are identical
    pub fn identity(&self) -> Option<f64> {
        let ops = self.ops()?;
        let matches = ops.iter().filter(|&&op| op == AlignOp::Match).count();
        Some(matches as f64 / ops.len() as f64)
    }

    /// Fraction of the reference sequence covered by the aligned region
    pub fn coverage(&self, reference: Reference) -> Option<f64> {
        let (start, end) = self.start.zip(self.end)?;
        let (start, end, length) = match reference {
            Reference::Query => (start.0, end.0, self.query_length),
            Reference::Target => (start.1, end.1, self.target_length),
        };
        Some((end + 1 - start) as f64 / length as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(ops: &str) -> SearchResult {
        let alignment = ops
            .chars()
            .map(|c| AlignOp::from_symbol(c).unwrap())
            .collect::<Vec<_>>();
        let query_len = alignment.iter().filter(|op| op.consumes_query()).count();
        let target_len = alignment.iter().filter(|op| op.consumes_target()).count();
        let raw = RawResult {
            score: Some(1),
            query_start: Some(0),
            target_start: Some(0),
            query_end: Some(query_len.saturating_sub(1)),
            target_end: Some(target_len.saturating_sub(1)),
            alignment: Some(alignment),
        };
        SearchResult::from_raw(0, raw, query_len, target_len * 2).unwrap()
    }

    #[test]
    fn test_cigar() {
        assert_eq!(result_with("MMDII").cigar().as_deref(), Some("2M1D2I"));
        assert_eq!(result_with("MXM").cigar().as_deref(), Some("3M"));
        assert_eq!(result_with("MMDII").alignment().as_deref(), Some("MMDII"));
        assert_eq!(result_with("").cigar(), None);
        assert_eq!(result_with("").alignment(), None);
    }

    #[test]
    fn test_identity() {
        assert_eq!(result_with("MXMM").identity(), Some(0.75));
        assert_eq!(result_with("MDIM").identity(), Some(0.5));
        assert_eq!(result_with("").identity(), None);
    }

    #[test]
    fn test_coverage() {
        let result = result_with("MMDM");
        assert_eq!(result.query_length(), 3);
        assert_eq!(result.target_length(), 8);
        assert_eq!(result.coverage(Reference::Query), Some(1.0));
        assert_eq!(result.coverage(Reference::Target), Some(0.5));
    }

    #[test]
    fn test_from_raw() {
        let raw = RawResult {
            score: Some(12),
            query_end: Some(4),
            target_end: Some(9),
            ..RawResult::default()
        };
        let result = SearchResult::from_raw(3, raw, 5, 10).unwrap();
        assert_eq!(result.target_index(), 3);
        assert_eq!(result.score(), 12);
        assert_eq!((result.query_end(), result.target_end()), (Some(4), Some(9)));
        assert_eq!((result.query_start(), result.target_start()), (None, None));
        assert_eq!(result.ops(), None);
        assert_eq!(result.coverage(Reference::Query), None);
    }

    #[test]
    fn test_from_raw_without_score() {
        assert_eq!(
            SearchResult::from_raw(0, RawResult::default(), 1, 1),
            Err(Error::Computation {
                status: Status::INCOMPLETE
            })
        );
    }

    #[test]
    fn test_symbols() {
        for op in [
            AlignOp::Match,
            AlignOp::Deletion,
            AlignOp::Insertion,
            AlignOp::Mismatch,
        ] {
            assert_eq!(AlignOp::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(AlignOp::from_symbol('='), None);
        assert_eq!(AlignOp::Mismatch as u8, 3);
    }
}
