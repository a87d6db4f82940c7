//! FaultInjector - Probabilistic Fault Injection
//!
//! TigerStyle: Explicit fault injection for chaos testing.
//!
//! Simulated components ask the injector at named fault points
//! (`"embed"`, `"index_store"`, `"index_search"`, `"index_stats"`,
//! `"cold_store_write"`, `"cold_store_read"`). A registered fault only fires at
//! the points its [`FaultType`] belongs to.

use std::collections::HashMap;
use std::sync::Mutex;

use super::rng::DeterministicRng;
use crate::constants::DST_FAULT_PROBABILITY_MAX;

/// Types of faults that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    // =========================================================================
    // Embedding Service Faults
    // =========================================================================
    /// Embedding request times out
    EmbeddingTimeout,
    /// Embedding service is unreachable
    EmbeddingServiceUnavailable,
    /// Embedding service answers with garbage (wrong dimension)
    EmbeddingInvalidResponse,

    // =========================================================================
    // Vector Index Faults
    // =========================================================================
    /// Persisting a vector fails
    IndexStoreFail,
    /// Nearest-neighbor search fails
    IndexSearchFail,
    /// Statistics call fails
    IndexStatsFail,
    /// Every index call fails as unreachable
    IndexUnavailable,

    // =========================================================================
    // Persistent Store (L2) Faults
    // =========================================================================
    /// Writing a cold record fails
    ColdStoreWriteFail,
    /// Reading a cold record fails
    ColdStoreReadFail,
}

impl FaultType {
    /// Stable name of the fault type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmbeddingTimeout => "embedding_timeout",
            Self::EmbeddingServiceUnavailable => "embedding_service_unavailable",
            Self::EmbeddingInvalidResponse => "embedding_invalid_response",
            Self::IndexStoreFail => "index_store_fail",
            Self::IndexSearchFail => "index_search_fail",
            Self::IndexStatsFail => "index_stats_fail",
            Self::IndexUnavailable => "index_unavailable",
            Self::ColdStoreWriteFail => "cold_store_write_fail",
            Self::ColdStoreReadFail => "cold_store_read_fail",
        }
    }

    /// Whether this fault can fire at the given fault point.
    #[must_use]
    pub fn applies_to(&self, operation: &str) -> bool {
        match self {
            Self::EmbeddingTimeout
            | Self::EmbeddingServiceUnavailable
            | Self::EmbeddingInvalidResponse => operation == "embed",
            Self::IndexStoreFail => operation == "index_store",
            Self::IndexSearchFail => operation == "index_search",
            Self::IndexStatsFail => operation == "index_stats",
            Self::IndexUnavailable => operation.starts_with("index_"),
            Self::ColdStoreWriteFail => operation == "cold_store_write",
            Self::ColdStoreReadFail => operation == "cold_store_read",
        }
    }
}

/// Configuration for a specific fault.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// The type of fault
    pub fault_type: FaultType,
    /// Probability of injection (0.0 to 1.0)
    pub probability: f64,
    /// Maximum number of injections (None = unlimited)
    pub max_injections: Option<u64>,
}

impl FaultConfig {
    /// Create a new fault configuration.
    ///
    /// # Panics
    /// Panics if probability is not in [0, 1].
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "probability must be in [0, {DST_FAULT_PROBABILITY_MAX}], got {probability}"
        );

        Self {
            fault_type,
            probability,
            max_injections: None,
        }
    }

    /// Stop injecting after `max` hits.
    ///
    /// # Panics
    /// Panics if `max` is zero.
    #[must_use]
    pub fn with_max_injections(mut self, max: u64) -> Self {
        assert!(max > 0, "max_injections must be positive");
        self.max_injections = Some(max);
        self
    }
}

/// Fault injector shared (via `Arc`) by every simulated component of a run.
///
/// Interior mutability lets it be consulted through `&self`.
#[derive(Debug)]
pub struct FaultInjector {
    rng: Mutex<DeterministicRng>,
    configs: Vec<FaultConfig>,
    injection_counts: Mutex<HashMap<FaultType, u64>>,
}

impl FaultInjector {
    /// Create an injector with no faults registered.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            configs: Vec::new(),
            injection_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fault. Must happen before the injector is shared.
    pub fn register(&mut self, config: FaultConfig) {
        self.injection_counts
            .get_mut()
            .expect("fault injector lock poisoned")
            .entry(config.fault_type)
            .or_insert(0);
        self.configs.push(config);
    }

    /// Roll for a fault at `operation`.
    ///
    /// Returns the first registered fault that applies to the operation,
    /// is under its injection limit, and wins its probability roll.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        for config in &self.configs {
            if !config.fault_type.applies_to(operation) {
                continue;
            }

            let mut counts = self
                .injection_counts
                .lock()
                .expect("fault injector lock poisoned");
            let count = counts.entry(config.fault_type).or_insert(0);
            if config.max_injections.is_some_and(|max| *count >= max) {
                continue;
            }

            let fire = self
                .rng
                .lock()
                .expect("fault injector lock poisoned")
                .next_bool(config.probability);

            if fire {
                *count += 1;
                tracing::debug!(
                    operation,
                    fault = config.fault_type.as_str(),
                    "injecting fault"
                );
                return Some(config.fault_type);
            }
        }

        None
    }

    /// Injection counts keyed by fault name.
    #[must_use]
    pub fn injection_stats(&self) -> HashMap<String, u64> {
        self.injection_counts
            .lock()
            .expect("fault injector lock poisoned")
            .iter()
            .map(|(fault, count)| (fault.as_str().to_string(), *count))
            .collect()
    }

    /// Total number of injected faults.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        self.injection_counts
            .lock()
            .expect("fault injector lock poisoned")
            .values()
            .sum()
    }
}

/// Builder for [`FaultInjector`].
#[derive(Debug)]
pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    configs: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    /// Create a builder with the given RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            configs: Vec::new(),
        }
    }

    /// Add a fault configuration.
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Build the injector.
    #[must_use]
    pub fn build(self) -> FaultInjector {
        let mut injector = FaultInjector::new(self.rng);
        for config in self.configs {
            injector.register(config);
        }
        injector
    }
}
