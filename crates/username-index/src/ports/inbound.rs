//! Inbound Ports (Driving Ports)
//!
//! The API the registration and profile-update flows use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Read-only snapshot of the live filter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Designed capacity of the live filter
    pub capacity: usize,
    /// Approximate number of inserts into the live filter
    pub inserted_count: u64,
    /// (1 - e^(-kn/m))^k at the current population
    pub estimated_false_positive_rate: f64,
    /// inserted_count / capacity
    pub saturation: f64,
    /// Filter size in bits (m)
    pub size_bits: usize,
    /// Hash functions per element (k)
    pub hash_count: usize,
    /// Bits currently set
    pub bits_set: usize,
    /// Incremented by every reset
    pub generation: u64,
    /// inserted_count of the filter installed by the last completed scan
    pub last_rebuild_count: u64,
    /// Whether a background rebuild is running
    pub rebuild_in_flight: bool,
}

/// Username existence API (Driving Port)
#[async_trait]
pub trait UsernameExistenceApi: Send + Sync {
    /// Build the filter from the authoritative store. Must complete before
    /// any query.
    async fn initialize(&self) -> Result<(), IndexError>;

    /// Whether `username` exists.
    ///
    /// A filter miss answers `false` without touching the store. A filter hit
    /// is confirmed against the store, so `true` is always store-confirmed.
    /// A store failure or timeout is an error, never `false`.
    async fn check_username_exists(&self, username: &str) -> Result<bool, IndexError>;

    /// Record a username. Call only after the store has durably committed it.
    ///
    /// Returns `NotReady` before the index is ready, with one exception: while
    /// the first `initialize` scan is in flight, the username is journaled into
    /// the filter being built and `Ok(())` is returned. Such a name is present
    /// as soon as that `initialize` completes.
    fn add_username(&self, username: &str) -> Result<(), IndexError>;

    /// Raw filter answer without the store fallback. Diagnostics only.
    fn might_exist(&self, username: &str) -> Result<bool, IndexError>;

    fn get_stats(&self) -> Result<IndexStats, IndexError>;

    /// Replace the live filter with an empty one at the configured capacity.
    /// Does not touch the store.
    fn reset(&self);
}
