//! Simulated Embedder for Deterministic Testing
//!
//! `TigerStyle`: Deterministic, reproducible embeddings for DST.
//!
//! # Algorithm
//!
//! 1. Hash seed + model + text to get a per-text seed
//! 2. Use `DeterministicRng` to generate components in [-1, 1)
//! 3. Normalize to a unit vector (L2 norm = 1)
//!
//! Same seed, model and text always give the same vector, so storing a text
//! and searching for it again yields a perfect match.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Embedder, EmbeddingError};
use crate::constants::VECTOR_DIMENSIONS_COUNT_MAX;
use crate::dst::{DeterministicRng, FaultInjector, FaultType};

// =============================================================================
// SimEmbedder
// =============================================================================

/// In-memory embedder for deterministic simulation testing.
#[derive(Clone, Debug)]
pub struct SimEmbedder {
    /// Base seed mixed into every hash
    seed: u64,
    /// Embedding dimensions
    dimensions: usize,
    /// Fault injector (optional for DST)
    fault_injector: Option<Arc<FaultInjector>>,
}

impl SimEmbedder {
    /// Create a simulated embedder producing `dimensions`-component vectors.
    ///
    /// # Panics
    /// Panics if `dimensions` is zero or above `VECTOR_DIMENSIONS_COUNT_MAX`.
    #[must_use]
    pub fn new(seed: u64, dimensions: usize) -> Self {
        assert!(dimensions > 0, "dimensions must be positive");
        assert!(
            dimensions <= VECTOR_DIMENSIONS_COUNT_MAX,
            "dimensions {dimensions} exceeds max {VECTOR_DIMENSIONS_COUNT_MAX}"
        );

        Self {
            seed,
            dimensions,
            fault_injector: None,
        }
    }

    /// Enable fault injection at the `"embed"` fault point.
    #[must_use]
    pub fn with_faults(mut self, fault_injector: Arc<FaultInjector>) -> Self {
        self.fault_injector = Some(fault_injector);
        self
    }

    fn hash_text(&self, text: &str, model: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        model.hash(&mut hasher);
        text.hash(&mut hasher);
        hasher.finish()
    }

    fn generate(&self, text: &str, model: &str) -> Vec<f32> {
        let mut rng = DeterministicRng::new(self.hash_text(text, model));

        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.next_signed_f32())
            .collect();

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        // Postconditions
        debug_assert!(
            {
                let check: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                (check - 1.0).abs() < 0.001
            },
            "embedding must be normalized to unit vector"
        );
        debug_assert_eq!(vector.len(), self.dimensions);

        vector
    }
}

#[async_trait]
impl Embedder for SimEmbedder {
    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        if let Some(injector) = &self.fault_injector {
            match injector.should_inject("embed") {
                Some(FaultType::EmbeddingTimeout) => return Err(EmbeddingError::Timeout),
                Some(FaultType::EmbeddingServiceUnavailable) => {
                    return Err(EmbeddingError::service_unavailable(
                        "injected: embedding service unavailable",
                    ));
                }
                // A malformed answer: right shape of call, wrong shape of data.
                Some(FaultType::EmbeddingInvalidResponse) => {
                    return Ok(vec![0.0; self.dimensions / 2]);
                }
                _ => {}
            }
        }

        Ok(self.generate(text, model))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "sim"
    }

    fn is_simulation(&self) -> bool {
        true
    }
}
