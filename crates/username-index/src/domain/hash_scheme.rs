//! Double-hashing position scheme
//!
//! Two MurmurHash3 values with different seeds, `h1` and `h2`, are combined
//! linearly: position(i) = (h1 + i * h2) mod m. One pair of hashes yields all
//! k positions.

use std::io::Cursor;

/// Seed for the first base hash
const SEED_PRIMARY: u32 = 0x9747_b28c;
/// Seed for the second base hash
const SEED_SECONDARY: u32 = 0x5bd1_e995;

/// Hash a byte string with MurmurHash3 (x64, 128-bit), keeping the low 64 bits
pub fn murmur_hash(element: &[u8], seed: u32) -> u64 {
    let mut cursor = Cursor::new(element);
    // Reading from an in-memory cursor cannot fail
    let hash = murmur3::murmur3_x64_128(&mut cursor, seed).unwrap_or(0);
    hash as u64
}

/// The pair of base hashes for an element
pub fn base_hashes(element: &[u8]) -> (u64, u64) {
    let h1 = murmur_hash(element, SEED_PRIMARY);
    // Odd step: a zero h2 would collapse every position onto h1
    let h2 = murmur_hash(element, SEED_SECONDARY) | 1;
    (h1, h2)
}

/// Derives `num_hashes` bit positions in `[0, size)` for an element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashScheme {
    num_hashes: usize,
    size: usize,
}

impl HashScheme {
    pub fn new(num_hashes: usize, size: usize) -> Self {
        Self {
            num_hashes: num_hashes.max(1),
            size: size.max(1),
        }
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Bit positions for `element`
    pub fn positions(&self, element: &[u8]) -> impl Iterator<Item = usize> {
        let (h1, h2) = base_hashes(element);
        let m = self.size as u64;

        (0..self.num_hashes as u64).map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % m) as usize)
    }
}
