//! Existence Index Service
//!
//! Owns the live Bloom filter, the fallback to the authoritative store, and
//! the scan lifecycle (initialize, saturation-triggered and periodic rebuild,
//! reset).
//!
//! ## Concurrency
//!
//! - Queries and inserts share the live filter through an `Arc`; the bit
//!   field is lock-free.
//! - A scan builds a brand-new filter off to the side. The swap is a single
//!   pointer replacement under a write lock, so readers never see a partially
//!   built filter.
//! - Inserts arriving while a scan is in flight are also written to a journal
//!   that is replayed into the new filter under the swap lock, so a username
//!   committed after the scan passed it is still present after the swap.
//! - Scans are serialized by an async mutex. Saturation-triggered rebuild
//!   requests arriving while one is in flight are no-ops.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::domain::{
    normalize, rebuild_capacity, refresh_capacity, BloomFilter, IndexConfig, NormalizedUsername,
};
use crate::error::{IndexError, StoreError};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::ports::{AuthoritativeStore, IndexStats, UsernameExistenceApi};

/// What prompted a rebuild; decides how the new filter is sized
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RebuildReason {
    /// Saturation crossed the threshold: grow to at least twice the capacity
    Saturated,
    /// Manual or periodic: resync with the store, grow only if the population needs it
    Refresh,
}

/// Result of a completed scan
enum ScanOutcome {
    Installed(Arc<BloomFilter>),
    /// The index was reset while scanning; the result was discarded
    Superseded,
}

/// Username existence index
///
/// Implements the `UsernameExistenceApi` port over an injected
/// `AuthoritativeStore`. Cloning yields another handle to the same index.
pub struct ExistenceIndexService<S: AuthoritativeStore> {
    inner: Arc<IndexState<S>>,
}

impl<S: AuthoritativeStore> Clone for ExistenceIndexService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct IndexState<S> {
    /// Authoritative store (driven port)
    store: Arc<S>,
    config: IndexConfig,
    /// Live filter; `None` until the first scan installs one
    active: RwLock<Option<Arc<BloomFilter>>>,
    /// Inserts recorded while a scan is in flight
    journal: Mutex<Vec<NormalizedUsername>>,
    journaling: AtomicBool,
    /// Serializes scans
    scan_lock: tokio::sync::Mutex<()>,
    rebuild_in_flight: AtomicBool,
    /// Capacity chosen by the last initialize; reset restores it
    base_capacity: AtomicUsize,
    last_rebuild_count: AtomicU64,
    generation: AtomicU64,
    metrics: Metrics,
}

impl<S: AuthoritativeStore + 'static> ExistenceIndexService<S> {
    /// Create a service with the default configuration
    pub fn new(store: Arc<S>) -> Self {
        Self::build(store, IndexConfig::default())
    }

    /// Create a service with a custom configuration
    pub fn with_config(store: Arc<S>, config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        Ok(Self::build(store, config))
    }

    fn build(store: Arc<S>, config: IndexConfig) -> Self {
        Self {
            inner: Arc::new(IndexState {
                store,
                base_capacity: AtomicUsize::new(config.minimum_capacity),
                config,
                active: RwLock::new(None),
                journal: Mutex::new(Vec::new()),
                journaling: AtomicBool::new(false),
                scan_lock: tokio::sync::Mutex::new(()),
                rebuild_in_flight: AtomicBool::new(false),
                last_rebuild_count: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                metrics: Metrics::new(),
            }),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// Whether a filter has been installed
    pub fn is_ready(&self) -> bool {
        self.inner.active.read().is_some()
    }

    pub fn is_rebuild_in_flight(&self) -> bool {
        self.inner.rebuild_in_flight.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Serialized copy of the live filter, for offline inspection
    pub fn export_snapshot(&self) -> Result<Vec<u8>, IndexError> {
        self.inner.current()?.to_bytes()
    }

    /// `check_username_exists` with a caller-supplied fallback timeout
    pub async fn check_username_exists_within(
        &self,
        username: &str,
        limit: Duration,
    ) -> Result<bool, IndexError> {
        let state = &self.inner;
        let username = state.normalize(username)?;
        let filter = state.current()?;

        if !filter.might_contain(&username) {
            state.metrics.record_fast_path();
            debug!(username = %username, "Filter miss, username is free");
            return Ok(false);
        }

        match timeout(limit, state.store.exists(username.as_str())).await {
            Ok(Ok(exists)) => {
                state.metrics.record_fallback(exists);
                debug!(username = %username, exists, "Filter hit checked against store");
                Ok(exists)
            }
            Ok(Err(e)) => {
                state.metrics.record_fallback_error();
                warn!(username = %username, error = %e, "Store fallback failed");
                Err(e.into())
            }
            Err(_) => {
                state.metrics.record_fallback_error();
                warn!(
                    username = %username,
                    timeout_ms = limit.as_millis() as u64,
                    "Store fallback timed out"
                );
                Err(IndexError::StoreUnavailable(StoreError::Timeout))
            }
        }
    }

    /// Schedule a background rebuild that resyncs the filter with the store.
    ///
    /// The new filter keeps the current capacity unless the population needs
    /// more room at `target_load_factor`. Returns `None` when the index is not
    /// ready, a rebuild is already in flight, or no Tokio runtime is available.
    pub fn request_rebuild(&self) -> Option<JoinHandle<()>> {
        self.schedule_rebuild(RebuildReason::Refresh)
    }

    fn schedule_rebuild(&self, reason: RebuildReason) -> Option<JoinHandle<()>> {
        let state = &self.inner;

        if !self.is_ready() {
            debug!("Rebuild requested before initialize, ignoring");
            return None;
        }

        if state
            .rebuild_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(?reason, "Rebuild already in flight");
            return None;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                state.rebuild_in_flight.store(false, Ordering::Release);
                warn!(?reason, "No async runtime available, rebuild not scheduled");
                return None;
            }
        };

        let state = Arc::clone(state);
        Some(runtime.spawn(async move {
            state.run_rebuild(reason).await;
        }))
    }

    /// Request a rebuild every `rebuild_interval` until `shutdown` flips to
    /// `true` or its sender is dropped.
    ///
    /// Returns `None` when no interval is configured or no runtime is available.
    pub fn spawn_periodic_rebuild(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        let period = self.inner.config.rebuild_interval?;
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let service = self.clone();

        Some(runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!(period_secs = period.as_secs(), "Periodic rebuild tick");
                        service.request_rebuild();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Periodic rebuild stopped");
        }))
    }
}

impl<S: AuthoritativeStore + 'static> IndexState<S> {
    fn normalize(&self, raw: &str) -> Result<NormalizedUsername, IndexError> {
        normalize(raw, self.config.max_username_len)
    }

    fn current(&self) -> Result<Arc<BloomFilter>, IndexError> {
        self.active.read().clone().ok_or(IndexError::NotReady)
    }

    fn over_threshold(&self, filter: &BloomFilter) -> bool {
        filter.saturation() > self.config.rebuild_threshold
    }

    /// Row count hint from the store; failures fall back to zero
    async fn expected_count(&self) -> usize {
        match timeout(self.config.fallback_timeout, self.store.estimated_count()).await {
            Ok(Ok(Some(count))) => count,
            Ok(Ok(None)) => 0,
            Ok(Err(e)) => {
                warn!(error = %e, "Count hint unavailable, sizing from minimum capacity");
                0
            }
            Err(_) => {
                warn!("Count hint timed out, sizing from minimum capacity");
                0
            }
        }
    }

    /// Stream every stored username into a fresh filter
    async fn populate(&self, capacity: usize) -> Result<BloomFilter, IndexError> {
        let started = Instant::now();
        let filter = BloomFilter::new(capacity, self.config.target_fpr);
        let mut stream = self.store.stream_all_usernames().await?;

        let mut streamed = 0usize;
        let mut skipped = 0usize;
        while let Some(item) = stream.next().await {
            let raw = item?;
            match self.normalize(&raw) {
                Ok(username) => {
                    filter.add(&username);
                    streamed += 1;
                }
                Err(e) => {
                    // Never queryable, so never needed in the filter
                    debug!(error = %e, "Skipping stored username");
                    skipped += 1;
                }
            }
        }

        debug!(
            streamed,
            skipped,
            capacity,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan complete"
        );
        Ok(filter)
    }

    /// Build a new filter from the store and swap it in
    async fn scan_and_install(&self, capacity: usize) -> Result<ScanOutcome, IndexError> {
        let generation = self.generation.load(Ordering::SeqCst);
        self.journal.lock().clear();
        self.journaling.store(true, Ordering::SeqCst);

        let scanned = match timeout(self.config.scan_timeout, self.populate(capacity)).await {
            Ok(result) => result,
            Err(_) => Err(IndexError::StoreUnavailable(StoreError::Timeout)),
        };

        let filter = match scanned {
            Ok(filter) => filter,
            Err(e) => {
                self.journaling.store(false, Ordering::SeqCst);
                self.journal.lock().clear();
                if matches!(e, IndexError::StoreUnavailable(_)) {
                    self.metrics.record_store_error();
                }
                return Err(e);
            }
        };

        // Inserts hold the read lock, so none is mid-flight past this point
        let mut active = self.active.write();
        self.journaling.store(false, Ordering::SeqCst);
        let pending = std::mem::take(&mut *self.journal.lock());

        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(ScanOutcome::Superseded);
        }

        for username in &pending {
            filter.add(username);
        }

        let filter = Arc::new(filter);
        *active = Some(Arc::clone(&filter));
        drop(active);

        self.last_rebuild_count
            .store(filter.inserted_count(), Ordering::Release);
        self.metrics.record_rebuild_completed();
        debug!(replayed = pending.len(), "Journal replayed into new filter");

        Ok(ScanOutcome::Installed(filter))
    }

    /// Background rebuild with retry. Clears `rebuild_in_flight` on exit.
    async fn run_rebuild(&self, reason: RebuildReason) {
        let _scan = self.scan_lock.lock().await;

        let capacity = match self.current() {
            Ok(filter) => match reason {
                RebuildReason::Saturated => rebuild_capacity(
                    filter.capacity(),
                    filter.inserted_count(),
                    self.config.target_load_factor,
                ),
                RebuildReason::Refresh => refresh_capacity(
                    filter.capacity(),
                    filter.inserted_count(),
                    self.config.target_load_factor,
                    self.base_capacity.load(Ordering::Acquire),
                ),
            },
            Err(_) => {
                self.rebuild_in_flight.store(false, Ordering::Release);
                return;
            }
        };

        info!(capacity, ?reason, "Rebuilding username existence index");
        let max_attempts = self.config.rebuild_max_attempts;
        let mut attempt = 0u32;

        loop {
            match self.scan_and_install(capacity).await {
                Ok(ScanOutcome::Installed(filter)) => {
                    info!(
                        capacity = filter.capacity(),
                        size_bits = filter.size_bits(),
                        hash_count = filter.hash_count(),
                        inserted = filter.inserted_count(),
                        "Rebuilt filter installed"
                    );
                    if self.over_threshold(&filter) {
                        warn!(
                            saturation = filter.saturation(),
                            "Rebuilt filter is already saturated"
                        );
                    }
                    break;
                }
                Ok(ScanOutcome::Superseded) => {
                    info!("Rebuild discarded, index was reset while scanning");
                    break;
                }
                Err(IndexError::StoreUnavailable(e)) if attempt + 1 < max_attempts => {
                    let delay = self.config.backoff_delay(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Rebuild scan failed, previous filter stays live; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        attempts = attempt + 1,
                        error = %e,
                        "Rebuild abandoned, previous filter stays live"
                    );
                    self.metrics.record_rebuild_failed();
                    break;
                }
            }
        }

        self.rebuild_in_flight.store(false, Ordering::Release);
    }
}

#[async_trait]
impl<S: AuthoritativeStore + 'static> UsernameExistenceApi for ExistenceIndexService<S> {
    async fn initialize(&self) -> Result<(), IndexError> {
        let state = &self.inner;
        let scan = state.scan_lock.lock().await;

        let expected = state.expected_count().await;
        let capacity = expected.max(state.config.minimum_capacity);
        info!(
            capacity,
            expected,
            target_fpr = state.config.target_fpr,
            "Initializing username existence index"
        );

        let filter = match state.scan_and_install(capacity).await? {
            ScanOutcome::Installed(filter) => filter,
            ScanOutcome::Superseded => {
                info!("Initialization discarded, index was reset while scanning");
                return Ok(());
            }
        };
        state.base_capacity.store(capacity, Ordering::Release);
        drop(scan);

        info!(
            size_bits = filter.size_bits(),
            hash_count = filter.hash_count(),
            inserted = filter.inserted_count(),
            "Username existence index ready"
        );

        if state.over_threshold(&filter) {
            warn!(
                saturation = filter.saturation(),
                "Initial scan overshot capacity, scheduling rebuild"
            );
            self.schedule_rebuild(RebuildReason::Saturated);
        }

        Ok(())
    }

    async fn check_username_exists(&self, username: &str) -> Result<bool, IndexError> {
        self.check_username_exists_within(username, self.inner.config.fallback_timeout)
            .await
    }

    fn add_username(&self, username: &str) -> Result<(), IndexError> {
        let state = &self.inner;
        let username = state.normalize(username)?;

        let saturated = {
            let active = state.active.read();
            let journaled = state.journaling.load(Ordering::SeqCst);
            if journaled {
                state.journal.lock().push(username.clone());
            }

            match active.as_ref() {
                Some(filter) => {
                    filter.add(&username);
                    state.metrics.record_insert();
                    state.over_threshold(filter)
                }
                // Picked up by the scan in flight
                None if journaled => false,
                None => return Err(IndexError::NotReady),
            }
        };

        if saturated {
            debug!("Saturation threshold crossed");
            self.schedule_rebuild(RebuildReason::Saturated);
        }

        Ok(())
    }

    fn might_exist(&self, username: &str) -> Result<bool, IndexError> {
        let username = self.inner.normalize(username)?;
        Ok(self.inner.current()?.might_contain(&username))
    }

    fn get_stats(&self) -> Result<IndexStats, IndexError> {
        let state = &self.inner;
        let filter = state.current()?;

        Ok(IndexStats {
            capacity: filter.capacity(),
            inserted_count: filter.inserted_count(),
            estimated_false_positive_rate: filter.estimated_false_positive_rate(),
            saturation: filter.saturation(),
            size_bits: filter.size_bits(),
            hash_count: filter.hash_count(),
            bits_set: filter.bits_set(),
            generation: state.generation.load(Ordering::Acquire),
            last_rebuild_count: state.last_rebuild_count.load(Ordering::Acquire),
            rebuild_in_flight: state.rebuild_in_flight.load(Ordering::Acquire),
        })
    }

    fn reset(&self) {
        let state = &self.inner;
        let mut active = state.active.write();

        if active.is_none() {
            debug!("Reset before initialize, index stays not ready");
            return;
        }

        let capacity = state.base_capacity.load(Ordering::Acquire);
        let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *active = Some(Arc::new(BloomFilter::new(
            capacity,
            state.config.target_fpr,
        )));
        state.last_rebuild_count.store(0, Ordering::Release);

        warn!(
            generation,
            capacity,
            "Existence index reset, filter no longer reflects the store until re-initialized"
        );
    }
}
