//! In-memory authoritative store
//!
//! A `HashSet` of case-folded usernames standing in for a user table with a
//! case-insensitive unique index. Counts every call and can inject latency
//! and failures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::ports::{AuthoritativeStore, UsernameStream};

/// Process-local username store
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    usernames: RwLock<HashSet<String>>,
    exists_calls: AtomicU64,
    scans: AtomicU64,
    exists_latency: RwLock<Option<Duration>>,
    scan_latency: RwLock<Option<Duration>>,
    unavailable: AtomicBool,
    failing_scans: AtomicU32,
}

fn canonical(username: &str) -> String {
    username.trim().to_lowercase()
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `usernames`
    pub fn with_usernames<I, T>(usernames: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let store = Self::new();
        {
            let mut set = store.usernames.write();
            for name in usernames {
                set.insert(canonical(name.as_ref()));
            }
        }
        store
    }

    /// Commit a username. Returns `false` if it was already taken.
    pub fn insert(&self, username: &str) -> bool {
        self.usernames.write().insert(canonical(username))
    }

    /// Delete a username. Returns `false` if it was absent.
    pub fn remove(&self, username: &str) -> bool {
        self.usernames.write().remove(&canonical(username))
    }

    pub fn contains(&self, username: &str) -> bool {
        self.usernames.read().contains(&canonical(username))
    }

    pub fn len(&self) -> usize {
        self.usernames.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.usernames.read().is_empty()
    }

    /// Number of `exists` calls served so far
    pub fn exists_calls(&self) -> u64 {
        self.exists_calls.load(Ordering::SeqCst)
    }

    /// Number of full scans started so far
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }

    /// Delay every `exists` call
    pub fn set_exists_latency(&self, latency: Option<Duration>) {
        *self.exists_latency.write() = latency;
    }

    /// Delay the start of every scan
    pub fn set_scan_latency(&self, latency: Option<Duration>) {
        *self.scan_latency.write() = latency;
    }

    /// Make every call fail with a connection error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `count` scans with a connection error
    pub fn fail_next_scans(&self, count: u32) {
        self.failing_scans.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionError(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn take_scan_failure(&self) -> bool {
        self.failing_scans
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AuthoritativeStore for InMemoryUserStore {
    async fn stream_all_usernames(&self) -> Result<UsernameStream<'_>, StoreError> {
        self.scans.fetch_add(1, Ordering::SeqCst);

        let latency = *self.scan_latency.read();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        self.check_available()?;
        if self.take_scan_failure() {
            return Err(StoreError::ConnectionError("injected scan failure".to_string()));
        }

        let names: Vec<String> = self.usernames.read().iter().cloned().collect();
        debug!(count = names.len(), "Streaming usernames from in-memory store");

        Ok(futures::stream::iter(names.into_iter().map(Ok)).boxed())
    }

    async fn exists(&self, username: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.exists_latency.read();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        self.check_available()?;
        Ok(self.contains(username))
    }

    async fn estimated_count(&self) -> Result<Option<usize>, StoreError> {
        self.check_available()?;
        Ok(Some(self.len()))
    }
}
