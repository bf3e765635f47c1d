use crate::alphabet::Codec;
use crate::error::{ConfigError, Result};
use crate::r#const::{AA_ALPHABET, BLOSUM50, BLOSUM62};

/// Square similarity matrix over an alphabet, immutable once built.
///
/// The matrix is shared (via `Arc`) by every [`Database`](crate::Database) built against it,
/// and the kernels read the flat score table directly, indexed by encoded symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreMatrix {
    codec: Codec,
    scores: Box<[i32]>,
}

impl ScoreMatrix {
    /// Builds a score matrix from an alphabet and one row of scores per symbol.
    ///
    /// Lowercase input is accepted when encoding sequences, but the alphabet itself must be
    /// uppercase, without duplicates, and congruent with the matrix.
    pub fn new<R: AsRef<[i32]>>(alphabet: &str, matrix: &[R]) -> Result<Self> {
        let codec = Codec::new(alphabet)?;
        let size = codec.len();
        if matrix.len() != size {
            return Err(ConfigError::DimensionMismatch {
                alphabet: size,
                rows: matrix.len(),
            }
            .into());
        }

        let mut scores = Vec::with_capacity(size * size);
        for (row, values) in matrix.iter().map(AsRef::as_ref).enumerate() {
            if values.len() != size {
                return Err(ConfigError::RowLength {
                    row,
                    len: values.len(),
                    expected: size,
                }
                .into());
            }
            scores.extend_from_slice(values);
        }

        Ok(Self {
            codec,
            scores: scores.into_boxed_slice(),
        })
    }

    /// The default amino acid matrix (BLOSUM50), where unknown residues map to `*`
    pub fn aa() -> Self {
        Self::new(AA_ALPHABET, &BLOSUM50).expect("BLOSUM50 preset is a valid score matrix")
    }

    /// Looks up a predefined matrix by name (case-insensitive)
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "BLOSUM50" => Ok(Self::aa()),
            "BLOSUM62" => Self::new(AA_ALPHABET, &BLOSUM62),
            _ => Err(ConfigError::UnknownPreset(name.to_string()).into()),
        }
    }

    pub fn alphabet(&self) -> &str {
        self.codec.symbols()
    }

    /// Number of symbols, which is also the matrix dimension
    pub fn size(&self) -> usize {
        self.codec.len()
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Row-major scores, `size() * size()` long
    pub fn as_flat(&self) -> &[i32] {
        &self.scores
    }

    pub fn matrix(&self) -> impl ExactSizeIterator<Item = &[i32]> {
        self.scores.chunks_exact(self.size())
    }

    /// Score for aligning two symbols, matched case-insensitively (and through the wildcard,
    /// if any)
    pub fn score(&self, a: u8, b: u8) -> Option<i32> {
        let a = usize::from(self.codec.encode_symbol(a)?);
        let b = usize::from(self.codec.encode_symbol(b)?);
        Some(self.scores[a * self.size() + b])
    }

    pub fn encode(&self, sequence: impl AsRef<[u8]>) -> Result<Box<[u8]>> {
        self.codec.encode(sequence.as_ref())
    }

    pub fn decode(&self, encoded: &[u8]) -> String {
        self.codec.decode(encoded)
    }
}

impl Default for ScoreMatrix {
    fn default() -> Self {
        Self::aa()
    }
}
