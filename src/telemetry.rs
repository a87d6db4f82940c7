//! Tracing Setup
//!
//! `TigerStyle`: Optional, idempotent, never panics.
//!
//! The library only emits `tracing` events and spans. Binaries and tests
//! that want to see them call [`init_tracing`] once; later calls, or calls
//! after another subscriber was installed, are no-ops.
//!
//! ## Usage
//!
//! ```rust
//! use strata_memory::telemetry::{init_tracing, init_tracing_with, TelemetryConfig};
//!
//! // `RUST_LOG`, falling back to `strata_memory=info`
//! init_tracing();
//!
//! // Or configure explicitly
//! let config = TelemetryConfig::builder()
//!     .default_filter("strata_memory=debug")
//!     .with_target(false)
//!     .build();
//! let installed = init_tracing_with(&config).unwrap();
//! assert!(!installed); // a subscriber is already in place
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG` - Filter directives, overriding the default filter

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::constants::TELEMETRY_FILTER_DEFAULT;

/// Telemetry configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// Filter directives could not be parsed
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter {
        /// The rejected directives
        filter: String,
        /// Parser message
        reason: String,
    },
}

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Include the event target in output
    pub with_target: bool,
    /// Route output through the test writer (captured by `cargo test`)
    pub test_writer: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: TELEMETRY_FILTER_DEFAULT.to_string(),
            with_target: true,
            test_writer: false,
        }
    }
}

impl TelemetryConfig {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    fn filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.default_filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: self.default_filter.clone(),
            reason: e.to_string(),
        })
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    default_filter: Option<String>,
    with_target: Option<bool>,
    test_writer: Option<bool>,
}

impl TelemetryConfigBuilder {
    /// Set the fallback filter directives.
    #[must_use]
    pub fn default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = Some(filter.into());
        self
    }

    /// Show or hide event targets.
    #[must_use]
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = Some(with_target);
        self
    }

    /// Write through the test harness capture.
    #[must_use]
    pub fn test_writer(mut self, test_writer: bool) -> Self {
        self.test_writer = Some(test_writer);
        self
    }

    /// Build the `TelemetryConfig`
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let default = TelemetryConfig::default();
        TelemetryConfig {
            default_filter: self.default_filter.unwrap_or(default.default_filter),
            with_target: self.with_target.unwrap_or(default.with_target),
            test_writer: self.test_writer.unwrap_or(default.test_writer),
        }
    }
}

/// Install a fmt subscriber with the default configuration.
///
/// Returns whether this call installed it. An invalid `RUST_LOG` falls back
/// to the default filter.
pub fn init_tracing() -> bool {
    init_tracing_with(&TelemetryConfig::default()).unwrap_or(false)
}

/// Install a fmt subscriber.
///
/// # Returns
///
/// `Ok(true)` if installed, `Ok(false)` if a global subscriber already
/// existed.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidFilter` if `RUST_LOG` is unset and the
/// default filter does not parse.
pub fn init_tracing_with(config: &TelemetryConfig) -> Result<bool> {
    let filter = config.filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = if config.test_writer {
        builder.with_test_writer().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(default_filter = %config.default_filter, "tracing initialized");
    }
    Ok(installed)
}
