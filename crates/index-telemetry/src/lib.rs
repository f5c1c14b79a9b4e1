//! # Index Telemetry
//!
//! Log setup for the username existence index and the tools built on it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use index_telemetry::{init_tracing, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_tracing(&config)?;
//!
//!     // Application code; `tracing` events are now emitted
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `UI_SERVICE_NAME` | `username-index` | Service name in the startup log |
//! | `UI_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `UI_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |
//! | `UI_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{build_filter, init_tracing, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
