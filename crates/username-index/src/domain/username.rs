//! Username normalization
//!
//! Every path that touches the filter or the store goes through
//! [`normalize`]: trim surrounding whitespace, then lower-case. Hashing a
//! differently normalized form on insert and on lookup would produce false
//! negatives.

use std::fmt;

use crate::error::IndexError;

/// A trimmed, lower-cased, length-checked username
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NormalizedUsername(String);

impl NormalizedUsername {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedUsername {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUsername {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize `raw`, rejecting empty results and anything over `max_len` bytes
pub fn normalize(raw: &str, max_len: usize) -> Result<NormalizedUsername, IndexError> {
    let normalized = raw.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(IndexError::InvalidUsername {
            reason: "username is empty".to_string(),
        });
    }

    if normalized.len() > max_len {
        return Err(IndexError::InvalidUsername {
            reason: format!(
                "username is {} bytes, maximum is {}",
                normalized.len(),
                max_len
            ),
        });
    }

    Ok(NormalizedUsername(normalized))
}
