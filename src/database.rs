use std::sync::Arc;

use crate::error::{ConfigError, Error, Result};
use crate::{ScoreMatrix, SearchConfig, SearchResult, search};

/// Ordered collection of encoded target sequences, all encoded with the same score matrix.
///
/// Indices are positions in insertion order and are what [`SearchResult::target_index`]
/// refers to. Methods taking an `isize` index accept negative values, counting from the end.
#[derive(Debug, Clone, Default)]
pub struct Database {
    score_matrix: Arc<ScoreMatrix>,
    sequences: Vec<Box<[u8]>>,
    lengths: Vec<usize>,
}

impl Database {
    pub fn new(score_matrix: impl Into<Arc<ScoreMatrix>>) -> Self {
        Self {
            score_matrix: score_matrix.into(),
            sequences: vec![],
            lengths: vec![],
        }
    }

    pub fn from_sequences<I>(sequences: I, score_matrix: impl Into<Arc<ScoreMatrix>>) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut database = Self::new(score_matrix);
        database.extend(sequences)?;
        Ok(database)
    }

    pub fn score_matrix(&self) -> &Arc<ScoreMatrix> {
        &self.score_matrix
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Length of every sequence, in database order
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Decoded sequences, in database order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = String> + '_ {
        self.sequences
            .iter()
            .map(|sequence| self.score_matrix.decode(sequence))
    }

    /// Encoded sequences, in database order
    pub(crate) fn encoded(&self) -> &[Box<[u8]>] {
        &self.sequences
    }

    /// Encodes and appends the sequence, leaving the database untouched on failure
    pub fn append(&mut self, sequence: impl AsRef<[u8]>) -> Result<()> {
        let encoded = self.score_matrix.encode(sequence)?;
        self.lengths.push(encoded.len());
        self.sequences.push(encoded);
        Ok(())
    }

    /// Appends every sequence in order. Stops at the first sequence which can't be encoded,
    /// keeping the ones appended before it.
    pub fn extend<I>(&mut self, sequences: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let sequences = sequences.into_iter();
        let (lower, _) = sequences.size_hint();
        self.sequences.reserve(lower);
        self.lengths.reserve(lower);

        for sequence in sequences {
            self.append(sequence)?;
        }
        Ok(())
    }

    /// Inserts the sequence before `index`, clamping out of range indices to the start or end
    pub fn insert(&mut self, index: isize, sequence: impl AsRef<[u8]>) -> Result<()> {
        let encoded = self.score_matrix.encode(sequence)?;
        let len = self.len() as isize;
        let index = if index < 0 { index + len } else { index }.clamp(0, len) as usize;

        self.lengths.insert(index, encoded.len());
        self.sequences.insert(index, encoded);
        Ok(())
    }

    /// Replaces the sequence at `index`
    pub fn set(&mut self, index: isize, sequence: impl AsRef<[u8]>) -> Result<()> {
        let index = self.resolve(index)?;
        let encoded = self.score_matrix.encode(sequence)?;
        self.lengths[index] = encoded.len();
        self.sequences[index] = encoded;
        Ok(())
    }

    /// Removes the sequence at `index`, returning it decoded
    pub fn remove(&mut self, index: isize) -> Result<String> {
        let index = self.resolve(index)?;
        self.lengths.remove(index);
        let encoded = self.sequences.remove(index);
        Ok(self.score_matrix.decode(&encoded))
    }

    pub fn get(&self, index: isize) -> Result<String> {
        let index = self.resolve(index)?;
        Ok(self.score_matrix.decode(&self.sequences[index]))
    }

    pub fn clear(&mut self) {
        self.sequences = vec![];
        self.lengths = vec![];
    }

    pub fn reverse(&mut self) {
        self.sequences.reverse();
        self.lengths.reverse();
    }

    /// New database with the sequences whose mask entry is `true`
    pub fn mask(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.len() {
            return Err(ConfigError::MaskLength {
                mask: mask.len(),
                len: self.len(),
            }
            .into());
        }

        let (sequences, lengths): (Vec<_>, Vec<_>) = self
            .sequences
            .iter()
            .zip(&self.lengths)
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|((sequence, length), _)| (sequence.clone(), *length))
            .unzip();
        Ok(Self {
            score_matrix: self.score_matrix.clone(),
            sequences,
            lengths,
        })
    }

    /// New database with the sequences at the given indices, in that order
    pub fn extract(&self, indices: &[isize]) -> Result<Self> {
        let mut extracted = Self::new(self.score_matrix.clone());
        extracted.sequences.reserve(indices.len());
        extracted.lengths.reserve(indices.len());

        for &index in indices {
            let index = self.resolve(index)?;
            extracted.sequences.push(self.sequences[index].clone());
            extracted.lengths.push(self.lengths[index]);
        }
        Ok(extracted)
    }

    /// Aligns the query against every sequence, returning one result per sequence in database
    /// order
    pub fn search(&self, query: impl AsRef<[u8]>, config: &SearchConfig) -> Result<Vec<SearchResult>> {
        search::search_targets(self, query.as_ref(), config)
    }

    /// Same as [`Database::search`], splitting the sequences between `threads` threads
    pub fn search_parallel(
        &self,
        query: impl AsRef<[u8]>,
        config: &SearchConfig,
        threads: usize,
    ) -> Result<Vec<SearchResult>> {
        search::search_targets_parallel(self, query.as_ref(), config, threads)
    }

    fn resolve(&self, index: isize) -> Result<usize> {
        let len = self.len();
        let resolved = if index < 0 {
            index.checked_add_unsigned(len)
        } else {
            Some(index)
        };

        resolved
            .and_then(|index| usize::try_from(index).ok())
            .filter(|&index| index < len)
            .ok_or(Error::IndexOutOfRange { index, len })
    }
}
