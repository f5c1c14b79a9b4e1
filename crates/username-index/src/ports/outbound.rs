//! Outbound Ports (Driven Ports)
//!
//! The authoritative store is the relational table with a uniqueness
//! constraint on username. The index only ever reads from it.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StoreError;

/// Lazy, finite sequence of every stored username
pub type UsernameStream<'a> = BoxStream<'a, Result<String, StoreError>>;

/// Authoritative username store (Driven Port)
///
/// Implemented by the surrounding application against its user table.
/// `exists` receives the normalized (trimmed, lower-cased) username and must
/// compare against the store using the same normalization.
#[async_trait]
pub trait AuthoritativeStore: Send + Sync {
    /// Stream all existing usernames. Used only by initialize and rebuild.
    async fn stream_all_usernames(&self) -> Result<UsernameStream<'_>, StoreError>;

    /// Definitive existence check for one normalized username
    async fn exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Row count hint used to size the initial filter.
    ///
    /// Returning `None` sizes the filter from the configured minimum.
    async fn estimated_count(&self) -> Result<Option<usize>, StoreError> {
        Ok(None)
    }
}
