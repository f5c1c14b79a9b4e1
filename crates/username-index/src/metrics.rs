//! Operational counters for the existence index
//!
//! Tracks how often the filter sheds a store round-trip, how often the
//! fallback runs, and how often the fallback disproves a filter hit.
//!
//! ## Usage
//!
//! ```ignore
//! let snapshot = service.metrics();
//! println!("store calls avoided: {}", snapshot.fast_path_negatives);
//! println!("observed FPR: {:.4}", snapshot.observed_false_positive_rate());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free counters, shared by all callers of one service
#[derive(Debug, Default)]
pub struct Metrics {
    /// Lookups answered `false` by the filter alone
    pub fast_path_negatives: AtomicU64,
    /// Lookups that reached the authoritative store
    pub fallback_lookups: AtomicU64,
    /// Fallbacks where the store confirmed existence
    pub fallback_confirmed: AtomicU64,
    /// Fallbacks where the store denied existence (filter false positive)
    pub false_positives: AtomicU64,
    /// Failed or timed-out store calls
    pub store_errors: AtomicU64,
    /// `add_username` calls applied to a filter
    pub inserts: AtomicU64,
    /// Scans that installed a new filter
    pub rebuilds_completed: AtomicU64,
    /// Background rebuilds abandoned after exhausting retries
    pub rebuilds_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fast_path(&self) {
        self.fast_path_negatives.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed fallback and what the store answered
    pub fn record_fallback(&self, exists: bool) {
        self.fallback_lookups.fetch_add(1, Ordering::Relaxed);
        if exists {
            self.fallback_confirmed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.false_positives.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a failed fallback; the attempt still counts as a lookup
    pub fn record_fallback_error(&self) {
        self.fallback_lookups.fetch_add(1, Ordering::Relaxed);
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rebuild_completed(&self) {
        self.rebuilds_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rebuild_failed(&self) {
        self.rebuilds_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fast_path_negatives: self.fast_path_negatives.load(Ordering::Relaxed),
            fallback_lookups: self.fallback_lookups.load(Ordering::Relaxed),
            fallback_confirmed: self.fallback_confirmed.load(Ordering::Relaxed),
            false_positives: self.false_positives.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            rebuilds_completed: self.rebuilds_completed.load(Ordering::Relaxed),
            rebuilds_failed: self.rebuilds_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub fast_path_negatives: u64,
    pub fallback_lookups: u64,
    pub fallback_confirmed: u64,
    pub false_positives: u64,
    pub store_errors: u64,
    pub inserts: u64,
    pub rebuilds_completed: u64,
    pub rebuilds_failed: u64,
}

impl MetricsSnapshot {
    /// Share of existence checks that never touched the store
    pub fn fast_path_ratio(&self) -> f64 {
        let total = self.fast_path_negatives + self.fallback_lookups;
        if total > 0 {
            self.fast_path_negatives as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Share of store-disproved hits among lookups for absent names.
    ///
    /// Absent names end either on the fast path or as a false positive.
    pub fn observed_false_positive_rate(&self) -> f64 {
        let absent = self.fast_path_negatives + self.false_positives;
        if absent > 0 {
            self.false_positives as f64 / absent as f64
        } else {
            0.0
        }
    }
}
