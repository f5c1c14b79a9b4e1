//! Error types for the username existence index

use thiserror::Error;

/// Errors surfaced by the existence index to its callers
#[derive(Debug, Error)]
pub enum IndexError {
    /// A query or insert arrived before `initialize()` completed
    #[error("Existence index is not ready: initialize() has not completed")]
    NotReady,

    /// The authoritative store failed or timed out
    #[error("Authoritative store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Empty or oversized username, rejected before hashing
    #[error("Invalid username: {reason}")]
    InvalidUsername { reason: String },

    #[error("Invalid index configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid filter snapshot: {0}")]
    InvalidSnapshot(String),
}

impl IndexError {
    /// Caller errors are surfaced immediately and never retried
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            IndexError::NotReady | IndexError::InvalidUsername { .. }
        )
    }
}

/// Errors from authoritative store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Timeout")]
    Timeout,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_maps_to_store_unavailable() {
        let err: IndexError = StoreError::Timeout.into();
        assert!(matches!(err, IndexError::StoreUnavailable(StoreError::Timeout)));
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_caller_errors_classified() {
        assert!(IndexError::NotReady.is_caller_error());
        assert!(IndexError::InvalidUsername {
            reason: "empty".to_string()
        }
        .is_caller_error());
        assert!(!IndexError::InvalidConfig("x".to_string()).is_caller_error());
    }
}
