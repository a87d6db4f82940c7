//! Substrate Configuration
//!
//! `TigerStyle`: Sensible defaults, builder pattern, explicit over implicit.
//!
//! # Environment
//!
//! [`SubstrateConfig::from_env`] reads:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `STRATA_DIMENSION` | `dimensions` |
//! | `STRATA_CAPACITY` | `capacity` |
//! | `STRATA_DEFAULT_K` | `default_k` |
//! | `STRATA_RELATED_LIMIT` | `related_limit` |
//! | `STRATA_BACKEND_TIMEOUT_MS` | `backend_timeout` |
//! | `STRATA_EMBEDDING_MODEL` | `embedding_model` |
//! | `STRATA_IDLE_MIGRATION_MS` | `idle_migration_after` |
//! | `STRATA_PERSISTENT_PATH` | enables L2 on disk at this root |
//! | `STRATA_PERSISTENT_NAMESPACE` | L2 namespace (requires the path) |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    BACKEND_TIMEOUT_MS_DEFAULT, BACKEND_TIMEOUT_MS_MAX, EMBEDDING_MODEL_DEFAULT,
    FAST_CACHE_RECORDS_COUNT_DEFAULT, FAST_CACHE_RECORDS_COUNT_MAX, PERSISTENT_NAMESPACE_BYTES_MAX,
    PERSISTENT_NAMESPACE_DEFAULT, SEARCH_RELATED_COUNT_DEFAULT, SEARCH_RESULTS_COUNT_DEFAULT,
    SEARCH_RESULTS_COUNT_MAX, VECTOR_DIMENSIONS_COUNT_DEFAULT, VECTOR_DIMENSIONS_COUNT_MAX,
};
use crate::memory::PersistentError;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors from configuration and substrate assembly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A field is out of range
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong
        message: String,
    },

    /// An environment variable could not be parsed
    #[error("invalid environment variable {var}={value:?}: {message}")]
    Env {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Parse message
        message: String,
    },

    /// A required component was not supplied to the builder
    #[error("missing component: {component}")]
    MissingComponent {
        /// Component name
        component: &'static str,
    },

    /// Embedder and configuration disagree on the vector dimension
    #[error("embedder produces {embedder} dimensions but config expects {config}")]
    DimensionMismatch {
        /// Configured dimension
        config: usize,
        /// Embedder dimension
        embedder: usize,
    },

    /// The persistent store could not be opened
    #[error("persistent store: {0}")]
    Persistent(#[from] PersistentError),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

// =============================================================================
// PersistentConfig
// =============================================================================

/// L2 settings. Present in [`SubstrateConfig`] means L2 is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentConfig {
    /// Namespace records are written under.
    ///
    /// Default: `"default"`
    pub namespace: String,

    /// Directory for the file-backed store. `None` keeps L2 in memory.
    ///
    /// Default: None
    pub root: Option<PathBuf>,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            namespace: PERSISTENT_NAMESPACE_DEFAULT.to_string(),
            root: None,
        }
    }
}

impl PersistentConfig {
    /// In-memory L2 in the default namespace.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed L2 rooted at `root`.
    #[must_use]
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

// =============================================================================
// SubstrateConfig
// =============================================================================

/// Configuration for a [`Substrate`](super::Substrate).
///
/// `TigerStyle`:
/// - Sensible defaults via Default impl
/// - Builder pattern for customization
/// - All fields public for transparency
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use strata_memory::{PersistentConfig, SubstrateConfig};
///
/// let config = SubstrateConfig::default()
///     .with_dimensions(4)
///     .with_capacity(2)
///     .with_backend_timeout(Duration::from_millis(500))
///     .with_persistent(PersistentConfig::in_memory());
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SubstrateConfig {
    /// Vector dimension.
    ///
    /// Default: 384
    pub dimensions: usize,

    /// Fast cache capacity in records.
    ///
    /// Default: 10,000
    pub capacity: usize,

    /// Results returned by `search` when the options leave `k` unset.
    ///
    /// Default: 5
    pub default_k: usize,

    /// Related concepts attached to each search result at most.
    ///
    /// Default: 10
    pub related_limit: usize,

    /// Timeout for every embedder and index call.
    ///
    /// Default: 5 seconds
    pub backend_timeout: Duration,

    /// Model name passed to the embedder.
    ///
    /// Default: `"all-minilm-l6-v2"`
    pub embedding_model: String,

    /// L2 settings. `None` disables L2.
    ///
    /// Default: None
    pub persistent: Option<PersistentConfig>,

    /// `consolidate` moves records idle at least this long from L1 to L2.
    /// `None` (or no L2) limits consolidation to the stats refresh.
    ///
    /// Default: None
    pub idle_migration_after: Option<Duration>,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        Self {
            dimensions: VECTOR_DIMENSIONS_COUNT_DEFAULT,
            capacity: FAST_CACHE_RECORDS_COUNT_DEFAULT,
            default_k: SEARCH_RESULTS_COUNT_DEFAULT,
            related_limit: SEARCH_RELATED_COUNT_DEFAULT,
            backend_timeout: Duration::from_millis(BACKEND_TIMEOUT_MS_DEFAULT),
            embedding_model: EMBEDDING_MODEL_DEFAULT.to_string(),
            persistent: None,
            idle_migration_after: None,
        }
    }
}

impl SubstrateConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the vector dimension.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set the fast cache capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the default `k`.
    #[must_use]
    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    /// Set the per-result related concept cap.
    #[must_use]
    pub fn with_related_limit(mut self, limit: usize) -> Self {
        self.related_limit = limit;
        self
    }

    /// Set the backend timeout.
    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Set the embedding model name.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Enable L2.
    #[must_use]
    pub fn with_persistent(mut self, persistent: PersistentConfig) -> Self {
        self.persistent = Some(persistent);
        self
    }

    /// Disable L2.
    #[must_use]
    pub fn without_persistent(mut self) -> Self {
        self.persistent = None;
        self
    }

    /// Migrate records idle for `idle` during `consolidate`.
    #[must_use]
    pub fn with_idle_migration(mut self, idle: Duration) -> Self {
        self.idle_migration_after = Some(idle);
        self
    }

    /// Whether L2 is enabled.
    #[must_use]
    pub fn persistent_enabled(&self) -> bool {
        self.persistent.is_some()
    }

    /// Check every field against its limits.
    ///
    /// # Errors
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimensions == 0 || self.dimensions > VECTOR_DIMENSIONS_COUNT_MAX {
            return Err(ConfigError::invalid(
                "dimensions",
                format!("{} not in 1..={VECTOR_DIMENSIONS_COUNT_MAX}", self.dimensions),
            ));
        }
        if self.capacity == 0 || self.capacity > FAST_CACHE_RECORDS_COUNT_MAX {
            return Err(ConfigError::invalid(
                "capacity",
                format!("{} not in 1..={FAST_CACHE_RECORDS_COUNT_MAX}", self.capacity),
            ));
        }
        if self.default_k == 0 || self.default_k > SEARCH_RESULTS_COUNT_MAX {
            return Err(ConfigError::invalid(
                "default_k",
                format!("{} not in 1..={SEARCH_RESULTS_COUNT_MAX}", self.default_k),
            ));
        }
        let timeout_ms = self.backend_timeout.as_millis();
        if timeout_ms == 0 || timeout_ms > u128::from(BACKEND_TIMEOUT_MS_MAX) {
            return Err(ConfigError::invalid(
                "backend_timeout",
                format!("{timeout_ms} ms not in 1..={BACKEND_TIMEOUT_MS_MAX} ms"),
            ));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::invalid("embedding_model", "must not be empty"));
        }
        if let Some(persistent) = &self.persistent {
            let len = persistent.namespace.len();
            if len == 0 || len > PERSISTENT_NAMESPACE_BYTES_MAX {
                return Err(ConfigError::invalid(
                    "persistent.namespace",
                    format!("{len} bytes not in 1..={PERSISTENT_NAMESPACE_BYTES_MAX}"),
                ));
            }
        }
        Ok(())
    }

    /// Defaults overridden by `STRATA_*` environment variables.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a variable cannot be parsed or the result
    /// fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    ///
    /// # Errors
    /// As for [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "STRATA_DIMENSION")? {
            config.dimensions = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATA_CAPACITY")? {
            config.capacity = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATA_DEFAULT_K")? {
            config.default_k = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATA_RELATED_LIMIT")? {
            config.related_limit = v;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "STRATA_BACKEND_TIMEOUT_MS")? {
            config.backend_timeout = Duration::from_millis(ms);
        }
        if let Some(model) = lookup("STRATA_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "STRATA_IDLE_MIGRATION_MS")? {
            config.idle_migration_after = Some(Duration::from_millis(ms));
        }

        let namespace = lookup("STRATA_PERSISTENT_NAMESPACE");
        match (lookup("STRATA_PERSISTENT_PATH"), namespace) {
            (Some(path), namespace) => {
                let mut persistent = PersistentConfig::on_disk(path);
                if let Some(namespace) = namespace {
                    persistent = persistent.with_namespace(namespace);
                }
                config.persistent = Some(persistent);
            }
            (None, Some(namespace)) => {
                return Err(ConfigError::Env {
                    var: "STRATA_PERSISTENT_NAMESPACE",
                    value: namespace,
                    message: "requires STRATA_PERSISTENT_PATH".to_string(),
                });
            }
            (None, None) => {}
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::Env {
            var,
            value: raw.clone(),
            message: e.to_string(),
        })
}
