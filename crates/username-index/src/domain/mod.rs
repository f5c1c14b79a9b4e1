//! Domain Layer - Pure logic
//!
//! This layer contains:
//! - Atomic bit field
//! - Double-hashing position scheme
//! - Bloom filter and its sizing parameters
//! - Username normalization
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod bit_field;
pub mod bloom_filter;
pub mod config;
pub mod hash_scheme;
pub mod parameters;
pub mod username;

pub use bit_field::{BitField, WORD_BITS};
pub use bloom_filter::{BloomFilter, FilterState};
pub use config::{IndexConfig, IndexConfigBuilder};
pub use hash_scheme::HashScheme;
pub use parameters::{
    calculate_optimal_parameters, rebuild_capacity, refresh_capacity, BloomFilterParams,
};
pub use username::{normalize, NormalizedUsername};
