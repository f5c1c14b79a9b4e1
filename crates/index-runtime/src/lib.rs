//! # Index Runtime
//!
//! Wires an `ExistenceIndexService` to an `InMemoryUserStore` seeded from a
//! newline-delimited username file.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (from env)
//! 2. Seed the store from the username file
//! 3. Initialize the index (full scan)
//! 4. Start the periodic rebuild task, if configured
//! 5. Serve registrations and existence checks

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use username_index::{
    ExistenceIndexService, InMemoryUserStore, IndexConfig, IndexStats,
    MetricsSnapshot, UsernameExistenceApi,
};

/// Outcome of one existence check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub username: String,
    /// Raw filter answer; `None` when the username was rejected
    pub filter_hit: Option<bool>,
    /// Store-confirmed answer; `None` on error
    pub exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one registration attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationReport {
    pub username: String,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Full run output
#[derive(Debug, Serialize)]
pub struct RuntimeReport {
    pub registrations: Vec<RegistrationReport>,
    pub checks: Vec<CheckReport>,
    pub stats: IndexStats,
    pub metrics: MetricsSnapshot,
}

/// Read a newline-delimited username file.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn load_usernames(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read username file {}", path.display()))?;

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// The index and its store, with the background tasks they need.
pub struct IndexRuntime {
    store: Arc<InMemoryUserStore>,
    index: ExistenceIndexService<InMemoryUserStore>,
    shutdown_tx: watch::Sender<bool>,
    periodic: Option<JoinHandle<()>>,
}

impl IndexRuntime {
    pub fn new<I, T>(usernames: I, config: IndexConfig) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let store = Arc::new(InMemoryUserStore::with_usernames(usernames));
        let index = ExistenceIndexService::with_config(Arc::clone(&store), config)
            .context("Invalid index configuration")?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            store,
            index,
            shutdown_tx,
            periodic: None,
        })
    }

    pub fn index(&self) -> &ExistenceIndexService<InMemoryUserStore> {
        &self.index
    }

    pub fn store(&self) -> &Arc<InMemoryUserStore> {
        &self.store
    }

    /// Initialize the index and start periodic rebuilds
    pub async fn start(&mut self) -> Result<()> {
        info!(seeded = self.store.len(), "Starting index runtime");

        self.index
            .initialize()
            .await
            .context("Failed to initialize username index")?;

        self.periodic = self
            .index
            .spawn_periodic_rebuild(self.shutdown_tx.subscribe());
        if let Some(period) = self.index.config().rebuild_interval {
            info!(period_secs = period.as_secs(), "Periodic rebuild enabled");
        }

        Ok(())
    }

    /// Register `username` the way a signup flow does: check, commit to the
    /// store, then record in the index.
    pub async fn register(&self, username: &str) -> RegistrationReport {
        let rejected = |reason: String| RegistrationReport {
            username: username.to_string(),
            registered: false,
            reason: Some(reason),
        };

        match self.index.check_username_exists(username).await {
            Ok(true) => return rejected("already taken".to_string()),
            Ok(false) => {}
            Err(e) => return rejected(e.to_string()),
        }

        // The store's uniqueness check is the final arbiter
        if !self.store.insert(username) {
            return rejected("already taken".to_string());
        }

        if let Err(e) = self.index.add_username(username) {
            warn!(username, error = %e, "Committed username not recorded in index");
        }

        RegistrationReport {
            username: username.to_string(),
            registered: true,
            reason: None,
        }
    }

    pub async fn check(&self, username: &str) -> CheckReport {
        let filter_hit = self.index.might_exist(username).ok();
        let (exists, error) = match self.index.check_username_exists(username).await {
            Ok(exists) => (Some(exists), None),
            Err(e) => (None, Some(e.to_string())),
        };

        CheckReport {
            username: username.to_string(),
            filter_hit,
            exists,
            error,
        }
    }

    /// Register then check each name, and collect stats
    pub async fn run(&self, register: &[String], check: &[String]) -> Result<RuntimeReport> {
        let mut registrations = Vec::with_capacity(register.len());
        for username in register {
            registrations.push(self.register(username).await);
        }

        let mut checks = Vec::with_capacity(check.len());
        for username in check {
            checks.push(self.check(username).await);
        }

        let stats = self.index.get_stats().context("Index not ready")?;

        Ok(RuntimeReport {
            registrations,
            checks,
            stats,
            metrics: self.index.metrics(),
        })
    }

    /// Stop background tasks
    pub async fn shutdown(self) -> Result<()> {
        // No receivers just means no periodic task is running
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.periodic {
            handle.await.context("Periodic rebuild task panicked")?;
        }
        info!("Index runtime stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn config() -> IndexConfig {
        IndexConfig::default().with_minimum_capacity(1000)
    }

    #[test]
    fn test_load_usernames_skips_blanks_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# seed users\nalice\n\n  bob  \n#carol").unwrap();

        let names = load_usernames(file.path()).unwrap();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_load_usernames_missing_file() {
        let err = load_usernames(Path::new("/nonexistent/usernames.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read username file"));
    }

    #[tokio::test]
    async fn test_register_and_check() {
        let mut runtime = IndexRuntime::new(["alice"], config()).unwrap();
        runtime.start().await.unwrap();

        let report = runtime
            .run(
                &["bob".to_string(), "ALICE".to_string()],
                &["alice".to_string(), "bob".to_string(), " ".to_string()],
            )
            .await
            .unwrap();

        assert!(report.registrations[0].registered);
        assert!(!report.registrations[1].registered);
        assert_eq!(report.checks[0].exists, Some(true));
        assert_eq!(report.checks[1].exists, Some(true));
        assert_eq!(report.checks[2].exists, None);
        assert!(report.checks[2].error.is_some());
        assert_eq!(report.stats.inserted_count, 2);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_before_start_fails() {
        let runtime = IndexRuntime::new(["alice"], config()).unwrap();
        assert!(runtime.run(&[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_periodic_rebuild() {
        let config = config();
        let config = IndexConfig {
            rebuild_interval: Some(Duration::from_millis(10)),
            ..config
        };
        let mut runtime = IndexRuntime::new(["alice"], config).unwrap();
        runtime.start().await.unwrap();
        assert!(runtime.periodic.is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;
        runtime.shutdown().await.unwrap();
    }

    #[test]
    fn test_report_serializes() {
        let report = CheckReport {
            username: "alice".to_string(),
            filter_hit: Some(true),
            exists: Some(true),
            error: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["exists"], true);
        assert!(json.get("error").is_none());
    }
}
