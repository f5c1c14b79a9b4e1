//! Adapters Layer (Driven Adapters)
//!
//! Implementations of the authoritative store port.
//!
//! - `InMemoryUserStore` - process-local store for tests, demos and tooling.
//!   Production deployments implement `AuthoritativeStore` against their
//!   user table.

pub mod in_memory_store;

pub use in_memory_store::InMemoryUserStore;
