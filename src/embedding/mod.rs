//! Embedder Trait - Text to Fixed-Dimension Vectors
//!
//! `TigerStyle`: Simulation-first embedding generation.
//!
//! The embedding model itself lives outside this crate. The substrate only
//! sees the [`Embedder`] capability; [`SimEmbedder`] is the deterministic
//! stand-in used by tests and by `Substrate::sim`.
//!
//! # Architecture
//!
//! ```text
//! Embedder (trait)
//! └── SimEmbedder   (always available, deterministic, fault injection)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use strata_memory::embedding::{Embedder, SimEmbedder};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let embedder = SimEmbedder::new(42, 8);
//! let vector = embedder.embed("Alice works at Acme", "sim").await.unwrap();
//! assert_eq!(vector.len(), 8);
//! # });
//! ```

mod sim;

pub use sim::SimEmbedder;

use async_trait::async_trait;

// =============================================================================
// Error Types
// =============================================================================

/// Errors from embedding providers.
///
/// `TigerStyle`: Explicit variants for all failure modes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbeddingError {
    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Service unreachable
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Reason for unavailability
        message: String,
    },

    /// Provider answered with something unusable
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of what was invalid
        message: String,
    },

    /// Invalid request parameters (unknown model, oversized text)
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what was invalid
        message: String,
    },

    /// Empty input provided
    #[error("Empty input provided")]
    EmptyInput,

    /// Dimension mismatch in returned embedding
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: usize,
        /// Actual dimensions received
        actual: usize,
    },
}

impl EmbeddingError {
    /// Create a service unavailable error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
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

    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// The service could not be reached or did not answer in time.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ServiceUnavailable { .. })
    }

    /// Retrying the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_unavailable()
    }
}

// =============================================================================
// Embedder Trait
// =============================================================================

/// Text embedding capability.
///
/// Implementations must return vectors of exactly [`dimensions`](Self::dimensions)
/// components; the fast cache rejects anything else.
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug + 'static {
    /// Embed `text` with the named model.
    ///
    /// # Errors
    /// Returns [`EmbeddingError`] if the text is empty or the service fails.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Number of components in every returned vector.
    fn dimensions(&self) -> usize;

    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Whether this is a simulation provider.
    fn is_simulation(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(EmbeddingError::Timeout.is_unavailable());
        assert!(EmbeddingError::service_unavailable("down").is_unavailable());
        assert!(!EmbeddingError::EmptyInput.is_unavailable());
        assert!(!EmbeddingError::dimension_mismatch(4, 3).is_unavailable());
    }

    #[test]
    fn test_retryable_matches_unavailable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(!EmbeddingError::invalid_response("garbage").is_retryable());
        assert!(!EmbeddingError::invalid_request("model").is_retryable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            EmbeddingError::dimension_mismatch(384, 12).to_string(),
            "Dimension mismatch: expected 384, got 12"
        );
    }
}
