//! Memory Errors - Caller-Facing Error Taxonomy
//!
//! `TigerStyle`: One enum for callers, explicit conversion from each layer.
//!
//! Backend errors carry the name of the substrate operation that hit them
//! (`"store"`, `"search"`, `"consolidate"`, `"embed"`).

use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use crate::memory::{MetadataError, PersistentError};

/// Errors from substrate operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Rejected before any tier was touched
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong
        message: String,
    },

    /// Embedding or index service unreachable or timed out
    #[error("backend unavailable during {operation}: {message}")]
    BackendUnavailable {
        /// Substrate operation that failed
        operation: &'static str,
        /// Backend message
        message: String,
    },

    /// Embedder returned an unusable result
    #[error("embedding failed during {operation}: {message}")]
    EmbeddingFailed {
        /// Substrate operation that failed
        operation: &'static str,
        /// What was wrong with the result
        message: String,
    },

    /// Fast cache is full and there is no overflow tier to evict into
    #[error("capacity exceeded: fast cache holds {capacity} records and no overflow tier is available")]
    CapacityExceeded {
        /// Fast cache capacity
        capacity: usize,
    },

    /// Record not found in the persistent store
    #[error("record not found: {id}")]
    NotFound {
        /// Missing id
        id: String,
    },

    /// Persistent store I/O failed
    #[error("persistent store failed during {operation}: {message}")]
    PersistentStore {
        /// Substrate operation that failed
        operation: &'static str,
        /// Store message
        message: String,
    },

    /// The substrate task behind a handle has stopped
    #[error("substrate has shut down")]
    Shutdown,
}

impl MemoryError {
    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a backend unavailable error.
    #[must_use]
    pub fn backend_unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            operation,
            message: message.into(),
        }
    }

    /// Create an embedding failure.
    #[must_use]
    pub fn embedding_failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            operation,
            message: message.into(),
        }
    }

    /// Create a persistent store failure.
    #[must_use]
    pub fn persistent(operation: &'static str, message: impl Into<String>) -> Self {
        Self::PersistentStore {
            operation,
            message: message.into(),
        }
    }

    /// Classify an embedder error.
    #[must_use]
    pub fn from_embedding(operation: &'static str, err: &EmbeddingError) -> Self {
        match err {
            EmbeddingError::EmptyInput | EmbeddingError::InvalidRequest { .. } => {
                Self::invalid_input(err.to_string())
            }
            e if e.is_unavailable() => Self::backend_unavailable(operation, e.to_string()),
            e => Self::embedding_failed(operation, e.to_string()),
        }
    }

    /// Classify an index error.
    #[must_use]
    pub fn from_index(operation: &'static str, err: &IndexError) -> Self {
        if err.is_invalid_request() {
            Self::invalid_input(err.to_string())
        } else {
            Self::backend_unavailable(operation, err.to_string())
        }
    }

    /// Classify a persistent store error.
    #[must_use]
    pub fn from_persistent(operation: &'static str, err: &PersistentError) -> Self {
        Self::persistent(operation, err.to_string())
    }

    /// Whether an automatic retry is safe.
    ///
    /// Failed embeds, searches and consolidations left no side effects. A
    /// failed store may have been assigned an id by the index, so it is
    /// never reported as retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BackendUnavailable { operation, .. } | Self::PersistentStore { operation, .. } => {
                *operation != "store"
            }
            _ => false,
        }
    }

    /// Name of the substrate operation, for errors that carry one.
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::BackendUnavailable { operation, .. }
            | Self::EmbeddingFailed { operation, .. }
            | Self::PersistentStore { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

impl From<MetadataError> for MemoryError {
    fn from(err: MetadataError) -> Self {
        Self::invalid_input(format!("malformed metadata: {err}"))
    }
}

/// Result alias for substrate operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
