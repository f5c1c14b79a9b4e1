//! # Username Index
//!
//! Probabilistic username existence index: a Bloom filter in front of the
//! authoritative user store, so that most availability checks during
//! registration never reach the database.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `BloomFilter`: Concurrent filter over normalized usernames
//!   - `BitField`: Lock-free bit array
//!   - `HashScheme`: Double-hashing position derivation
//!   - `IndexConfig` / `IndexConfigBuilder`: Configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `UsernameExistenceApi`: Driving port (registration flow)
//!   - `AuthoritativeStore`: Driven port (user table)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `ExistenceIndexService`: Implements `UsernameExistenceApi`
//!
//! - **Adapters Layer** (`adapters/`): Store implementations
//!   - `InMemoryUserStore`: Process-local store
//!
//! ## Invariants
//!
//! - No false negatives: a username added to the live filter is reported as
//!   possibly present until the next reset.
//! - `check_username_exists` never answers `true` without the store
//!   confirming it, and never answers `false` because the store failed.
//! - A rebuild never exposes a partially populated filter.
//!
//! ## Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use username_index::{ExistenceIndexService, InMemoryUserStore, UsernameExistenceApi};
//!
//! let store = Arc::new(InMemoryUserStore::with_usernames(["alice", "bob"]));
//! let index = ExistenceIndexService::new(store.clone());
//! index.initialize().await?;
//!
//! if !index.check_username_exists("carol").await? {
//!     store.insert("carol");
//!     index.add_username("carol")?;
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::InMemoryUserStore;
pub use domain::{
    normalize, BloomFilter, FilterState, IndexConfig, IndexConfigBuilder, NormalizedUsername,
};
pub use error::{IndexError, StoreError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use ports::{AuthoritativeStore, IndexStats, UsernameExistenceApi, UsernameStream};
pub use service::ExistenceIndexService;
