//! Vector Index - Id Assignment and Nearest-Neighbor Search
//!
//! `TigerStyle`: Trait-based abstraction, simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    VectorIndex Trait                         │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴────────┐
//! │ SimVectorIndex  │           │ external index  │
//! │   (testing)     │           │  (production)   │
//! └─────────────────┘           └─────────────────┘
//! ```

mod sim;

pub use sim::SimVectorIndex;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::Metadata;

// =============================================================================
// Error Types
// =============================================================================

/// Errors from a vector index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Index unreachable
    #[error("index unavailable: {message}")]
    Unavailable {
        /// Reason
        message: String,
    },

    /// Request timed out at the index
    #[error("index request timed out")]
    Timeout,

    /// Persisting a vector failed
    #[error("store failed: {message}")]
    StoreFailed {
        /// Reason
        message: String,
    },

    /// Search failed
    #[error("search failed: {message}")]
    SearchFailed {
        /// Reason
        message: String,
    },

    /// Statistics call failed
    #[error("stats failed: {message}")]
    StatsFailed {
        /// Reason
        message: String,
    },

    /// Vector has the wrong number of components
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the index
        expected: usize,
        /// Dimension supplied
        actual: usize,
    },

    /// Invalid request parameters
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what was invalid
        message: String,
    },
}

impl IndexError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a store failure.
    #[must_use]
    pub fn store_failed(message: impl Into<String>) -> Self {
        Self::StoreFailed {
            message: message.into(),
        }
    }

    /// Create a search failure.
    #[must_use]
    pub fn search_failed(message: impl Into<String>) -> Self {
        Self::SearchFailed {
            message: message.into(),
        }
    }

    /// Create a stats failure.
    #[must_use]
    pub fn stats_failed(message: impl Into<String>) -> Self {
        Self::StatsFailed {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// The request was rejected for its own content rather than a service failure.
    #[must_use]
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::InvalidRequest { .. }
        )
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Record id
    pub id: String,
    /// Similarity (0.0 to 1.0, higher = more similar)
    pub score: f32,
    /// Metadata stored alongside the vector
    pub payload: Metadata,
}

/// Backend statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of vectors held by the index
    pub vector_count: usize,
    /// Vector dimension
    pub dimensions: usize,
    /// Searches served
    pub query_count: u64,
}

impl IndexStats {
    /// Stats as a string-keyed map of JSON values.
    #[must_use]
    pub fn as_map(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("vector_count".to_string(), Value::from(self.vector_count)),
            ("dimensions".to_string(), Value::from(self.dimensions)),
            ("query_count".to_string(), Value::from(self.query_count)),
        ])
    }
}

// =============================================================================
// VectorIndex Trait
// =============================================================================

/// Vector persistence and similarity search.
#[async_trait]
pub trait VectorIndex: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a vector with metadata and return its new id.
    ///
    /// Ids are never reused.
    ///
    /// # Errors
    /// Returns [`IndexError`] if the vector is rejected or the service fails.
    async fn store_vector(&self, vector: &[f32], metadata: &Metadata)
        -> Result<String, IndexError>;

    /// Return up to `k` hits ordered by descending score.
    ///
    /// # Errors
    /// Returns [`IndexError`] if `k` is zero, the query is malformed, or the service fails.
    async fn search_vectors(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError>;

    /// Current backend statistics.
    ///
    /// # Errors
    /// Returns [`IndexError`] if the service fails.
    async fn memory_stats(&self) -> Result<IndexStats, IndexError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_as_map() {
        let stats = IndexStats {
            vector_count: 3,
            dimensions: 4,
            query_count: 9,
        };

        let map = stats.as_map();

        assert_eq!(map.get("vector_count"), Some(&Value::from(3)));
        assert_eq!(map.get("dimensions"), Some(&Value::from(4)));
        assert_eq!(map.get("query_count"), Some(&Value::from(9)));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_invalid_request_classification() {
        assert!(IndexError::invalid_request("k").is_invalid_request());
        assert!(IndexError::DimensionMismatch {
            expected: 4,
            actual: 3
        }
        .is_invalid_request());
        assert!(!IndexError::Timeout.is_invalid_request());
        assert!(!IndexError::store_failed("disk").is_invalid_request());
    }
}
