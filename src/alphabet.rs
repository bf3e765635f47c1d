//! Byte to symbol index lookup, used to encode sequences before they reach the kernels.
//!
//! Every byte maps to one of three things: the index of its symbol in the alphabet
//! (case-insensitively), the index of the `*` wildcard when the alphabet declares one, or
//! nothing, in which case encoding fails.

use crate::error::{ConfigError, Error, Result};

/// Symbol which unknown bytes are mapped to, when present in the alphabet
pub const WILDCARD: u8 = b'*';

const INVALID: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    table: [u8; 256],
    symbols: Box<[u8]>,
    wildcard: Option<u8>,
}

impl Codec {
    /// Builds the lookup table, rejecting empty alphabets, non-ASCII or lowercase symbols and
    /// duplicates
    pub fn new(alphabet: &str) -> Result<Self, ConfigError> {
        if alphabet.is_empty() {
            return Err(ConfigError::EmptyAlphabet);
        }

        let mut table = [INVALID; 256];
        let mut symbols = Vec::with_capacity(alphabet.len());
        for c in alphabet.chars() {
            if !c.is_ascii() {
                return Err(ConfigError::NonAsciiSymbol(c));
            }
            if c.is_ascii_lowercase() {
                return Err(ConfigError::LowercaseSymbol(c));
            }

            let byte = c as u8;
            if table[usize::from(byte)] != INVALID {
                return Err(ConfigError::DuplicateSymbol(c));
            }

            // ASCII-only and duplicate free, so the index always fits below INVALID
            let index = symbols.len() as u8;
            table[usize::from(byte)] = index;
            table[usize::from(byte.to_ascii_lowercase())] = index;
            symbols.push(byte);
        }

        let wildcard = symbols
            .iter()
            .position(|&s| s == WILDCARD)
            .map(|i| i as u8);
        if let Some(wildcard) = wildcard {
            for entry in table.iter_mut().filter(|entry| **entry == INVALID) {
                *entry = wildcard;
            }
        }

        Ok(Self {
            table,
            symbols: symbols.into_boxed_slice(),
            wildcard,
        })
    }

    /// Number of symbols in the alphabet
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The alphabet in symbol index order
    pub fn symbols(&self) -> &str {
        // Only ASCII bytes are ever pushed into the symbols
        std::str::from_utf8(&self.symbols).unwrap_or_default()
    }

    /// Index of the wildcard symbol, if the alphabet has one
    pub fn wildcard(&self) -> Option<u8> {
        self.wildcard
    }

    #[inline]
    pub fn encode_symbol(&self, byte: u8) -> Option<u8> {
        match self.table[usize::from(byte)] {
            INVALID => None,
            index => Some(index),
        }
    }

    /// Encodes the sequence into symbol indices. Nothing is allocated for the caller when a
    /// byte can't be encoded.
    ///
    /// The error carries the byte offset of the offending symbol, and the full character
    /// starting there when it is valid UTF-8 (otherwise the raw byte).
    pub fn encode(&self, sequence: &[u8]) -> Result<Box<[u8]>> {
        sequence
            .iter()
            .enumerate()
            .map(|(position, &byte)| {
                self.encode_symbol(byte).ok_or_else(|| Error::Encoding {
                    symbol: symbol_at(sequence, position),
                    position,
                })
            })
            .collect()
    }

    /// Decodes symbol indices back to text, using the canonical (uppercase) symbols
    pub fn decode(&self, encoded: &[u8]) -> String {
        encoded
            .iter()
            .map(|&index| char::from(self.symbols[usize::from(index)]))
            .collect()
    }
}

fn symbol_at(sequence: &[u8], position: usize) -> char {
    sequence[position..]
        .utf8_chunks()
        .next()
        .and_then(|chunk| chunk.valid().chars().next())
        .unwrap_or(char::from(sequence[position]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let codec = Codec::new("ACGT").unwrap();
        let encoded = codec.encode(b"ACGTTGCA").unwrap();
        assert_eq!(&*encoded, &[0, 1, 2, 3, 3, 2, 1, 0]);
        assert_eq!(codec.decode(&encoded), "ACGTTGCA");
    }

    #[test]
    fn test_case_insensitive() {
        let codec = Codec::new("ACGT").unwrap();
        let encoded = codec.encode(b"acgT").unwrap();
        assert_eq!(codec.decode(&encoded), "ACGT");
    }

    #[test]
    fn test_invalid_symbol() {
        let codec = Codec::new("ACGT").unwrap();
        assert_eq!(
            codec.encode(b"ACNT"),
            Err(Error::Encoding {
                symbol: 'N',
                position: 2
            })
        );
        assert_eq!(codec.encode_symbol(b'N'), None);
        // Nothing maps to index 0 silently
        assert_eq!(codec.encode_symbol(0), None);
    }

    #[test]
    fn test_invalid_multibyte_symbol() {
        let codec = Codec::new("ACGT").unwrap();
        assert_eq!(
            codec.encode("AéC".as_bytes()),
            Err(Error::Encoding {
                symbol: 'é',
                position: 1
            })
        );
        // Not UTF-8, reported byte by byte
        assert_eq!(
            codec.encode(&[b'A', 0xff, b'C']),
            Err(Error::Encoding {
                symbol: 'ÿ',
                position: 1
            })
        );
    }

    #[test]
    fn test_wildcard() {
        let codec = Codec::new("ACGT*").unwrap();
        assert_eq!(codec.wildcard(), Some(4));
        let encoded = codec.encode(b"ANG?").unwrap();
        assert_eq!(&*encoded, &[0, 4, 2, 4]);
        assert_eq!(codec.decode(&encoded), "A*G*");
    }

    #[test]
    fn test_invalid_alphabets() {
        assert_eq!(Codec::new(""), Err(ConfigError::EmptyAlphabet));
        assert_eq!(Codec::new("ACGA"), Err(ConfigError::DuplicateSymbol('A')));
        assert_eq!(Codec::new("ACgT"), Err(ConfigError::LowercaseSymbol('g')));
        assert_eq!(Codec::new("ACGÅ"), Err(ConfigError::NonAsciiSymbol('Å')));
    }

    #[test]
    fn test_symbols() {
        let codec = Codec::new("ARND*").unwrap();
        assert_eq!(codec.symbols(), "ARND*");
        assert_eq!(codec.len(), 5);
    }
}
