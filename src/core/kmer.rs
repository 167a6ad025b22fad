//! Compact K-mer Model
//! ===================
//!
//! 2-bit packed k-mers (A=00, C=01, G=10, T=11) stored right-aligned in a `u64`.
//! Because every k-mer of a given length occupies the same bit width, unsigned
//! comparison of the packed value is lexicographic comparison of the symbols,
//! which is what canonicalization relies on.

use anyhow::{anyhow, Result};
use std::fmt;

/// Longest k-mer that fits the packed representation
pub const MAX_KMER_LENGTH: usize = 31;

/// Nucleotide symbols in code order
pub const NUCLEOTIDES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Encode a nucleotide into its 2-bit code, case-insensitive
#[inline]
pub fn encode_base(symbol: u8) -> Option<u64> {
    match symbol {
        b'A' | b'a' => Some(0b00),
        b'C' | b'c' => Some(0b01),
        b'G' | b'g' => Some(0b10),
        b'T' | b't' => Some(0b11),
        _ => None,
    }
}

#[inline]
pub fn decode_base(code: u64) -> u8 {
    NUCLEOTIDES[(code & 0b11) as usize]
}

#[inline]
pub fn complement_base(symbol: u8) -> u8 {
    match symbol {
        b'A' | b'a' => b'T',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        b'T' | b't' => b'A',
        other => other,
    }
}

/// True when every symbol is one of A, C, G, T (either case)
pub fn is_unambiguous_dna(sequence: &str) -> bool {
    sequence.bytes().all(|b| encode_base(b).is_some())
}

/// Reverse complement of a DNA string; non-ACGT symbols are kept as-is
pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .bytes()
        .rev()
        .map(|b| complement_base(b) as char)
        .collect()
}

/// A k-mer packed into a single machine word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KmerData {
    bits: u64,
    k: u8,
}

impl KmerData {
    /// Pack a k-mer from its textual form
    pub fn new(sequence: &str) -> Result<Self> {
        Self::from_bytes(sequence.as_bytes())
    }

    pub fn from_bytes(sequence: &[u8]) -> Result<Self> {
        let k = sequence.len();
        if k == 0 || k > MAX_KMER_LENGTH {
            return Err(anyhow!(
                "Invalid k-mer length: {} (allowed 1..={})",
                k,
                MAX_KMER_LENGTH
            ));
        }

        let mut bits = 0u64;
        for &symbol in sequence {
            let code = encode_base(symbol)
                .ok_or_else(|| anyhow!("Invalid nucleotide: {}", symbol as char))?;
            bits = (bits << 2) | code;
        }

        Ok(Self { bits, k: k as u8 })
    }

    pub(crate) fn from_raw(bits: u64, k: usize) -> Self {
        Self {
            bits: bits & Self::mask(k),
            k: k as u8,
        }
    }

    #[inline]
    fn mask(k: usize) -> u64 {
        if k >= 32 {
            u64::MAX
        } else {
            (1u64 << (2 * k)) - 1
        }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn len(&self) -> usize {
        self.k as usize
    }

    pub fn is_empty(&self) -> bool {
        self.k == 0
    }

    /// Symbol at position `index` (0-based from the left)
    pub fn symbol_at(&self, index: usize) -> u8 {
        let shift = 2 * (self.len() - 1 - index);
        decode_base(self.bits >> shift)
    }

    pub fn first_symbol(&self) -> u8 {
        self.symbol_at(0)
    }

    pub fn last_symbol(&self) -> u8 {
        decode_base(self.bits)
    }

    pub fn reverse_complement(&self) -> Self {
        let mut source = self.bits;
        let mut bits = 0u64;
        for _ in 0..self.k {
            bits = (bits << 2) | (0b11 ^ (source & 0b11));
            source >>= 2;
        }
        Self { bits, k: self.k }
    }

    /// Smaller of the k-mer and its reverse complement, plus whether the
    /// k-mer itself was already the smaller one
    pub fn canonical(&self) -> (Self, bool) {
        let rc = self.reverse_complement();
        if self.bits <= rc.bits {
            (*self, true)
        } else {
            (rc, false)
        }
    }

    /// A palindromic k-mer is its own reverse complement (even k only)
    pub fn is_palindrome(&self) -> bool {
        self.bits == self.reverse_complement().bits
    }

    /// Drop the first symbol and append `code` on the right
    pub fn shift_right(&self, code: u64) -> Self {
        Self::from_raw((self.bits << 2) | code, self.len())
    }

    /// Drop the last symbol and prepend `code` on the left
    pub fn shift_left(&self, code: u64) -> Self {
        Self {
            bits: (self.bits >> 2) | (code << (2 * (self.len() - 1))),
            k: self.k,
        }
    }

    pub fn to_sequence(&self) -> String {
        (0..self.len()).map(|i| self.symbol_at(i) as char).collect()
    }
}

impl fmt::Display for KmerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sequence())
    }
}

/// Rolling iterator over the forward k-mers of a sequence.
///
/// Yields `(position, forward, reverse_complement)` for every window. Any
/// window containing a non-ACGT symbol is skipped.
pub struct KmerWindows<'a> {
    sequence: &'a [u8],
    k: usize,
    position: usize,
    forward: u64,
    reverse: u64,
    valid_run: usize,
}

impl<'a> KmerWindows<'a> {
    pub fn new(sequence: &'a [u8], k: usize) -> Self {
        Self {
            sequence,
            k,
            position: 0,
            forward: 0,
            reverse: 0,
            valid_run: 0,
        }
    }
}

impl Iterator for KmerWindows<'_> {
    type Item = (usize, KmerData, KmerData);

    fn next(&mut self) -> Option<Self::Item> {
        if self.k == 0 || self.k > MAX_KMER_LENGTH {
            return None;
        }
        let mask = KmerData::mask(self.k);
        let high_shift = 2 * (self.k - 1);

        while self.position < self.sequence.len() {
            let symbol = self.sequence[self.position];
            self.position += 1;

            let Some(code) = encode_base(symbol) else {
                self.valid_run = 0;
                continue;
            };

            self.forward = ((self.forward << 2) | code) & mask;
            self.reverse = (self.reverse >> 2) | ((0b11 ^ code) << high_shift);
            self.valid_run += 1;

            if self.valid_run >= self.k {
                let start = self.position - self.k;
                return Some((
                    start,
                    KmerData::from_raw(self.forward, self.k),
                    KmerData::from_raw(self.reverse, self.k),
                ));
            }
        }

        None
    }
}
