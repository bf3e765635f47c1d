use crate::kernel::Status;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    /// The symbol is not part of the alphabet, and the alphabet has no wildcard. `position`
    /// is a byte offset into the input.
    #[error("invalid symbol {symbol:?} at position {position}")]
    Encoding { symbol: char, position: usize },
    #[error("no alignment kernel is available for this build and CPU")]
    RuntimeUnavailable,
    #[error("alignment kernel failed with {status}")]
    Computation { status: Status },
    #[error("index {index} out of range for database of length {len}")]
    IndexOutOfRange { index: isize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("alphabet must not be empty")]
    EmptyAlphabet,
    #[error("duplicate symbol {0:?} in alphabet")]
    DuplicateSymbol(char),
    #[error("alphabet symbol {0:?} must be uppercase")]
    LowercaseSymbol(char),
    #[error("alphabet symbol {0:?} is not ASCII")]
    NonAsciiSymbol(char),
    #[error("alphabet has {alphabet} symbols but the matrix has {rows} rows")]
    DimensionMismatch { alphabet: usize, rows: usize },
    #[error("matrix row {row} has {len} columns, expected {expected}")]
    RowLength {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("unknown score matrix {0:?}")]
    UnknownPreset(String),
    #[error("unknown search mode {0:?}, expected one of: score, end, full")]
    UnknownMode(String),
    #[error("unknown algorithm {0:?}, expected one of: nw, hw, ov, sw")]
    UnknownAlgorithm(String),
    #[error("unknown overflow strategy {0:?}, expected one of: simple, buckets")]
    UnknownOverflow(String),
    #[error("mask has {mask} entries but the database has {len} sequences")]
    MaskLength { mask: usize, len: usize },
}
