//! Concurrent Bloom filter over normalized usernames
//!
//! INVARIANTS:
//! - No false negatives: once `add(u)` returns, `might_contain(u)` is true on
//!   every thread. Bits are never cleared individually.
//! - `size_bits` and `hash_count` are fixed at construction. A filter of a
//!   different size is a new instance.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::bit_field::BitField;
use super::hash_scheme::HashScheme;
use super::parameters::{calculate_fpr, calculate_optimal_parameters};
use super::username::NormalizedUsername;
use crate::error::IndexError;

/// Lifecycle state of a filter instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterState {
    /// No `add` has been made
    Empty,
    /// At least one `add` has been made
    Populated,
}

/// Bloom filter sized from a capacity and a target false positive rate
///
/// All operations take `&self`; the filter is shared between concurrent
/// callers behind an `Arc`.
#[derive(Debug)]
pub struct BloomFilter {
    bits: BitField,
    hashes: HashScheme,
    /// Designed capacity (n)
    capacity: usize,
    /// Target false positive rate (p)
    target_fpr: f64,
    /// Approximate insert count; duplicates are counted
    inserted: AtomicU64,
}

/// Serialized form of a filter
#[derive(Serialize, Deserialize)]
struct FilterSnapshot {
    size_bits: usize,
    hash_count: usize,
    capacity: usize,
    target_fpr: f64,
    inserted: u64,
    words: Vec<u64>,
}

impl BloomFilter {
    /// Create an empty filter for `capacity` elements at `target_fpr`
    pub fn new(capacity: usize, target_fpr: f64) -> Self {
        let capacity = capacity.max(1);
        let params = calculate_optimal_parameters(capacity, target_fpr);

        Self {
            bits: BitField::new(params.size_bits),
            hashes: HashScheme::new(params.hash_count, params.size_bits),
            capacity,
            target_fpr,
            inserted: AtomicU64::new(0),
        }
    }

    /// Insert a username
    ///
    /// Idempotent for membership; the insert counter still advances.
    pub fn add(&self, username: &NormalizedUsername) {
        for pos in self.hashes.positions(username.as_bytes()) {
            self.bits.set(pos);
        }
        self.inserted.fetch_add(1, Ordering::AcqRel);
    }

    /// Test membership
    ///
    /// - `false`: the username was definitely never added
    /// - `true`: the username might have been added
    pub fn might_contain(&self, username: &NormalizedUsername) -> bool {
        self.hashes
            .positions(username.as_bytes())
            .all(|pos| self.bits.test(pos))
    }

    /// Estimated false positive rate at the current population
    ///
    /// Formula: FPR = (1 - e^(-kn/m))^k
    pub fn estimated_false_positive_rate(&self) -> f64 {
        calculate_fpr(
            self.bits.size(),
            self.inserted_count() as usize,
            self.hashes.num_hashes(),
        )
    }

    /// `inserted_count / capacity`
    pub fn saturation(&self) -> f64 {
        self.inserted_count() as f64 / self.capacity as f64
    }

    pub fn state(&self) -> FilterState {
        if self.inserted_count() == 0 {
            FilterState::Empty
        } else {
            FilterState::Populated
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn target_fpr(&self) -> f64 {
        self.target_fpr
    }

    pub fn size_bits(&self) -> usize {
        self.bits.size()
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.num_hashes()
    }

    pub fn inserted_count(&self) -> u64 {
        self.inserted.load(Ordering::Acquire)
    }

    pub fn bits_set(&self) -> usize {
        self.bits.count_ones()
    }

    /// Serialize the bit array and parameters
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        let snapshot = FilterSnapshot {
            size_bits: self.bits.size(),
            hash_count: self.hashes.num_hashes(),
            capacity: self.capacity,
            target_fpr: self.target_fpr,
            inserted: self.inserted_count(),
            words: self.bits.to_words(),
        };
        bincode::serialize(&snapshot).map_err(|e| IndexError::InvalidSnapshot(e.to_string()))
    }

    /// Restore a filter from [`BloomFilter::to_bytes`] output
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let snapshot: FilterSnapshot =
            bincode::deserialize(bytes).map_err(|e| IndexError::InvalidSnapshot(e.to_string()))?;

        if snapshot.capacity == 0 || snapshot.hash_count == 0 {
            return Err(IndexError::InvalidSnapshot(
                "capacity and hash count must be non-zero".to_string(),
            ));
        }

        let bits = BitField::from_words(snapshot.size_bits, snapshot.words).ok_or_else(|| {
            IndexError::InvalidSnapshot(format!(
                "word count does not match {} bits",
                snapshot.size_bits
            ))
        })?;

        Ok(Self {
            hashes: HashScheme::new(snapshot.hash_count, bits.size()),
            bits,
            capacity: snapshot.capacity,
            target_fpr: snapshot.target_fpr,
            inserted: AtomicU64::new(snapshot.inserted),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::username::normalize;
    use proptest::prelude::*;
    use rand::distributions::Alphanumeric;
    use rand::{Rng, SeedableRng};

    fn name(raw: &str) -> NormalizedUsername {
        normalize(raw, 64).unwrap()
    }

    #[test]
    fn test_sizing_for_capacity_1000() {
        let filter = BloomFilter::new(1000, 0.01);
        assert_eq!(filter.size_bits(), 9586);
        assert_eq!(filter.hash_count(), 7);
        assert_eq!(filter.capacity(), 1000);
        assert_eq!(filter.state(), FilterState::Empty);
        assert_eq!(filter.bits_set(), 0);
    }

    #[test]
    fn test_contains_after_add() {
        let filter = BloomFilter::new(1000, 0.01);
        filter.add(&name("alice"));
        assert!(filter.might_contain(&name("alice")));
        assert_eq!(filter.state(), FilterState::Populated);
    }

    #[test]
    fn test_no_false_negatives_bulk() {
        let filter = BloomFilter::new(5000, 0.01);
        let names: Vec<NormalizedUsername> =
            (0..5000).map(|i| name(&format!("user_{:05}", i))).collect();

        for n in &names {
            filter.add(n);
        }
        for n in &names {
            assert!(filter.might_contain(n), "False negative for {}", n);
        }
    }

    #[test]
    fn test_add_is_idempotent_for_membership() {
        let once = BloomFilter::new(1000, 0.01);
        let twice = BloomFilter::new(1000, 0.01);

        once.add(&name("bob"));
        twice.add(&name("bob"));
        twice.add(&name("bob"));

        assert_eq!(once.might_contain(&name("bob")), twice.might_contain(&name("bob")));
        assert_eq!(once.bits_set(), twice.bits_set(), "same bits are set");
        assert_eq!(once.inserted_count(), 1);
        assert_eq!(twice.inserted_count(), 2, "counter is approximate");
    }

    #[test]
    fn test_false_positive_rate_bounded() {
        let capacity = 10_000;
        let target = 0.01;
        let filter = BloomFilter::new(capacity, target);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        let mut random_name = |prefix: &str| {
            let suffix: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            name(&format!("{}{}", prefix, suffix))
        };

        for _ in 0..capacity {
            filter.add(&random_name("in_"));
        }

        let trials = 100_000;
        let false_positives = (0..trials)
            .filter(|_| filter.might_contain(&random_name("out_")))
            .count();
        let observed = false_positives as f64 / trials as f64;

        assert!(
            observed <= target * 2.0,
            "Observed FPR {} exceeds 2x target {}",
            observed,
            target
        );
    }

    #[test]
    fn test_estimated_fpr_tracks_population() {
        let filter = BloomFilter::new(1000, 0.01);
        assert_eq!(filter.estimated_false_positive_rate(), 0.0);

        for i in 0..1000 {
            filter.add(&name(&format!("user{}", i)));
        }
        let fpr = filter.estimated_false_positive_rate();
        assert!(fpr > 0.008 && fpr < 0.012, "Expected ≈0.01, got {}", fpr);
    }

    #[test]
    fn test_saturation() {
        let filter = BloomFilter::new(100, 0.01);
        for i in 0..75 {
            filter.add(&name(&format!("user{}", i)));
        }
        assert!((filter.saturation() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_restores_membership() {
        let filter = BloomFilter::new(1000, 0.01);
        filter.add(&name("alice"));
        filter.add(&name("bob"));

        let bytes = filter.to_bytes().expect("serialize");
        let restored = BloomFilter::from_bytes(&bytes).expect("deserialize");

        assert!(restored.might_contain(&name("alice")));
        assert!(restored.might_contain(&name("bob")));
        assert_eq!(restored.size_bits(), filter.size_bits());
        assert_eq!(restored.hash_count(), filter.hash_count());
        assert_eq!(restored.inserted_count(), 2);
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        assert!(matches!(
            BloomFilter::from_bytes(&[1, 2, 3]),
            Err(IndexError::InvalidSnapshot(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_no_false_negatives(
            raw in prop::collection::vec("[a-zA-Z0-9_]{1,32}", 1..200),
            capacity in 1usize..500,
        ) {
            let filter = BloomFilter::new(capacity, 0.01);
            let names: Vec<NormalizedUsername> = raw.iter().map(|r| name(r)).collect();

            for n in &names {
                filter.add(n);
            }
            for n in &names {
                prop_assert!(filter.might_contain(n));
            }
        }
    }
}
