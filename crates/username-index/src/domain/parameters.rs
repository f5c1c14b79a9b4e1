//! Bloom filter sizing
//!
//! Formulas:
//! - m = ceil(-n * ln(p) / (ln(2)^2))  -- bits
//! - k = round((m / n) * ln(2))         -- hash functions
//! - FPR = (1 - e^(-k*n/m))^k

use std::f64::consts::LN_2;

/// Upper bound on k; beyond this extra hashes cost more than they save
pub const MAX_HASHES: usize = 32;

/// Bloom filter parameters
#[derive(Clone, Debug, PartialEq)]
pub struct BloomFilterParams {
    /// Number of bits in the filter
    pub size_bits: usize,
    /// Number of hash functions
    pub hash_count: usize,
    /// Expected false positive rate at full capacity
    pub expected_fpr: f64,
}

/// Calculate optimal parameters for `capacity` elements at `target_fpr`
pub fn calculate_optimal_parameters(capacity: usize, target_fpr: f64) -> BloomFilterParams {
    if capacity == 0 {
        return BloomFilterParams {
            size_bits: 1,
            hash_count: 1,
            expected_fpr: 1.0,
        };
    }

    let n = capacity as f64;
    let m = minimum_bits(capacity, target_fpr).max(1);
    let k = ((m as f64 / n) * LN_2).round() as usize;
    let k = k.clamp(1, MAX_HASHES);

    BloomFilterParams {
        size_bits: m,
        hash_count: k,
        expected_fpr: calculate_fpr(m, capacity, k),
    }
}

/// False positive rate after `n` insertions into `m` bits with `k` hashes
pub fn calculate_fpr(m: usize, n: usize, k: usize) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let exponent = -(k as f64) * (n as f64) / (m as f64);
    (1.0 - exponent.exp()).powi(k as i32)
}

/// Minimum m for `n` elements at `target_fpr`
pub fn minimum_bits(n: usize, target_fpr: f64) -> usize {
    let ln2_squared = LN_2 * LN_2;
    (-(n as f64) * target_fpr.ln() / ln2_squared).ceil() as usize
}

/// Capacity for a rebuilt filter: double the previous capacity, or enough to
/// bring the current population down to `target_load_factor`, whichever is
/// larger.
pub fn rebuild_capacity(previous_capacity: usize, inserted: u64, target_load_factor: f64) -> usize {
    let doubled = previous_capacity.saturating_mul(2);
    let by_load = if target_load_factor > 0.0 {
        (inserted as f64 / target_load_factor).ceil() as usize
    } else {
        0
    };
    doubled.max(by_load).max(1)
}

/// Capacity for a refresh rebuild (manual or periodic): keep the current
/// capacity unless the population needs more room at `target_load_factor`.
/// Never below `floor`.
pub fn refresh_capacity(
    current_capacity: usize,
    inserted: u64,
    target_load_factor: f64,
    floor: usize,
) -> usize {
    let by_load = if target_load_factor > 0.0 {
        (inserted as f64 / target_load_factor).ceil() as usize
    } else {
        0
    };
    current_capacity.max(by_load).max(floor).max(1)
}
