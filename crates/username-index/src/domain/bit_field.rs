//! Lock-free bit field backing the Bloom filter
//!
//! Bits are packed into `AtomicU64` words. `set` is a single `fetch_or` on the
//! owning word, so concurrent sets to different bits of the same word never
//! lose an update.
//!
//! Memory ordering: `set` publishes with `Release`, `test` observes with
//! `Acquire`. Once a `set` has returned, every later `test` of that bit on any
//! thread sees it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Width of one storage word in bits
pub const WORD_BITS: usize = 64;

/// Fixed-size array of bits with atomic set and test
#[derive(Debug)]
pub struct BitField {
    /// Packed storage, `ceil(size / 64)` words
    words: Box<[AtomicU64]>,
    /// Number of addressable bits
    size: usize,
}

impl BitField {
    /// Allocate a zeroed bit field of `size` bits (at least one)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let words = (0..word_count_for(size))
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { words, size }
    }

    /// Rebuild a bit field from raw words, e.g. from a snapshot.
    ///
    /// Returns `None` when the word count does not match `size`.
    pub fn from_words(size: usize, raw: Vec<u64>) -> Option<Self> {
        if size == 0 || raw.len() != word_count_for(size) {
            return None;
        }
        let words = raw
            .into_iter()
            .map(AtomicU64::new)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Some(Self { words, size })
    }

    /// Number of addressable bits
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of storage words
    #[inline]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Set the bit at `index mod size`. Returns the previous value.
    #[inline]
    pub fn set(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        let previous = self.words[word].fetch_or(mask, Ordering::Release);
        previous & mask != 0
    }

    /// Test the bit at `index mod size`
    #[inline]
    pub fn test(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        self.words[word].load(Ordering::Acquire) & mask != 0
    }

    /// Count of set bits
    pub fn count_ones(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Copy the raw words out
    pub fn to_words(&self) -> Vec<u64> {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Acquire))
            .collect()
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, u64) {
        let bit = index % self.size;
        (bit / WORD_BITS, 1u64 << (bit % WORD_BITS))
    }
}

fn word_count_for(size: usize) -> usize {
    (size + WORD_BITS - 1) / WORD_BITS
}
