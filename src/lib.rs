//! Manyalign aligns one query sequence against every sequence of a database (many-to-one
//! pairwise alignment) with affine gap penalties. The alignment kernel is compiled for several
//! instruction sets and the best one supported by the running CPU is picked once, at the first
//! search.
//!
//! Four algorithms are supported:
//! - Global (Needleman-Wunsch): both sequences are aligned end to end
//! - Semi-global: the query is aligned end to end, gaps at the ends of the target are free
//! - Overlap: gaps at the ends of both sequences are free
//! - Local (Smith-Waterman): the best scoring pair of subsequences
//!
//! Scores are computed with the narrowest integers first and transparently recomputed with wider
//! ones when they would overflow, see [`Overflow`].
//!
//! # Example: searching a database
//!
//! ```rust
//! use manyalign::{Database, Mode, SearchConfig};
//!
//! let mut database = Database::default();
//! database.extend(["MKVLAAGIV", "MQIFVKTLT", "AAGIVALL"]).unwrap();
//!
//! let config = SearchConfig {
//!     mode: Mode::Full,
//!     ..SearchConfig::default()
//! };
//! let results = database.search("AAGIV", &config).unwrap();
//! assert_eq!(results.len(), 3);
//!
//! let best = results.iter().max_by_key(|result| result.score()).unwrap();
//! println!("{} {:?}", best.target_index(), best.cigar());
//! ```
//!
//! # Example: custom score matrix
//!
//! ```rust
//! use manyalign::{Algorithm, Database, ScoreMatrix, SearchConfig};
//!
//! let matrix = ScoreMatrix::new(
//!     "ACGT",
//!     &[[2, -1, -1, -1], [-1, 2, -1, -1], [-1, -1, 2, -1], [-1, -1, -1, 2]],
//! )
//! .unwrap();
//! let database = Database::from_sequences(["TTACGTTT", "ACT"], matrix).unwrap();
//!
//! let config = SearchConfig {
//!     algorithm: "global".parse().unwrap(),
//!     ..SearchConfig::default()
//! };
//! // or in parallel (4 threads)
//! let results = database.search_parallel("ACGT", &config, 4).unwrap();
//! assert_eq!(config.algorithm, Algorithm::Nw);
//! assert_eq!(results[1].score(), 3);
//! ```
//!
//! # Example: aligning a single pair
//!
//! ```rust
//! use manyalign::{Mode, ScoreMatrix, SearchConfig, align};
//!
//! let config = SearchConfig {
//!     mode: Mode::Full,
//!     ..SearchConfig::default()
//! };
//! let result = align("HEAGAWGHEE", "PAWHEAE", &ScoreMatrix::aa(), &config).unwrap();
//! println!("{:?}", result.alignment());
//! ```

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod alphabet;
mod r#const;
mod database;
mod error;
pub mod kernel;
mod result;
mod score_matrix;
mod search;

pub use database::Database;
pub use error::{ConfigError, Error, Result};
pub use result::{AlignOp, Reference, SearchResult};
pub use score_matrix::ScoreMatrix;
pub use search::align;

use r#const::*;

/// What the kernel computes for each target. Each mode is a superset of the previous one and
/// is slower to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// Only the score
    #[default]
    Score,
    /// The score and the end position of the alignment
    End,
    /// The score, the start and end positions and the alignment trace
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Algorithm {
    /// Global alignment (Needleman-Wunsch)
    Nw,
    /// Semi-global alignment where the query must be fully aligned, gaps at the start and end
    /// of the target are free
    Hw,
    /// Overlap alignment, gaps at the start and end of either sequence are free
    Ov,
    /// Local alignment (Smith-Waterman)
    #[default]
    Sw,
}

/// How scores which overflow the current integer width are recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Overflow {
    /// Recompute every target with wider integers as soon as one overflows
    Simple,
    /// Only recompute the targets which overflowed
    #[default]
    Buckets,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "score" => Ok(Self::Score),
            "end" => Ok(Self::End),
            "full" => Ok(Self::Full),
            _ => Err(ConfigError::UnknownMode(s.to_string()).into()),
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nw" | "global" => Ok(Self::Nw),
            "hw" | "semi-global-query-free" => Ok(Self::Hw),
            "ov" | "semi-global-free" | "overlap" => Ok(Self::Ov),
            "sw" | "local" => Ok(Self::Sw),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_string()).into()),
        }
    }
}

impl FromStr for Overflow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(Self::Simple),
            "buckets" => Ok(Self::Buckets),
            _ => Err(ConfigError::UnknownOverflow(s.to_string()).into()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Score => "score",
            Self::End => "end",
            Self::Full => "full",
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nw => "nw",
            Self::Hw => "hw",
            Self::Ov => "ov",
            Self::Sw => "sw",
        })
    }
}

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Buckets => "buckets",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchConfig {
    /// Penalty for the first position of a gap (insertion/deletion)
    pub gap_open: u16,
    /// Penalty for every following position of a gap
    pub gap_extend: u16,
    pub mode: Mode,
    /// Only affects performance, both strategies produce the same results
    pub overflow: Overflow,
    pub algorithm: Algorithm,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            gap_open: GAP_OPEN,
            gap_extend: GAP_EXTEND,
            mode: Mode::default(),
            overflow: Overflow::default(),
            algorithm: Algorithm::default(),
        }
    }
}
