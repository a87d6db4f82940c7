//! Simulation - DST Test Harness
//!
//! `TigerStyle`: Simulation harness that provides deterministic environment.

use std::future::Future;
use std::sync::Arc;

use super::clock::SimClock;
use super::config::SimConfig;
use super::fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
use super::rng::DeterministicRng;
use crate::embedding::SimEmbedder;
use crate::index::SimVectorIndex;
use crate::memory::SimPersistentStore;
use crate::substrate::{ConfigError, Substrate, SubstrateConfig};

/// Environment provided to simulation tests.
///
/// `TigerStyle`: All simulation resources in one place.
#[derive(Debug)]
pub struct SimEnvironment {
    /// Simulation configuration
    pub config: SimConfig,
    /// Simulated clock
    pub clock: SimClock,
    /// Deterministic RNG
    pub rng: DeterministicRng,
    /// Fault injector shared by every backend this environment creates
    pub faults: Arc<FaultInjector>,
}

impl SimEnvironment {
    /// Advance simulated time in milliseconds.
    pub fn advance_time_ms(&self, ms: u64) -> u64 {
        self.clock.advance_ms(ms)
    }

    /// Get current simulated time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Embedder seeded from the simulation, wired to its faults.
    #[must_use]
    pub fn embedder(&self, dimensions: usize) -> SimEmbedder {
        SimEmbedder::new(self.config.seed(), dimensions).with_faults(Arc::clone(&self.faults))
    }

    /// Vector index wired to the simulation's faults.
    #[must_use]
    pub fn index(&self, dimensions: usize) -> SimVectorIndex {
        SimVectorIndex::new(dimensions).with_faults(Arc::clone(&self.faults))
    }

    /// In-memory L2 wired to the simulation's faults.
    #[must_use]
    pub fn cold_store(&self) -> SimPersistentStore {
        SimPersistentStore::new().with_faults(Arc::clone(&self.faults))
    }

    /// Substrate whose backends and clock all belong to this simulation.
    ///
    /// When the config enables L2 it is an in-memory store in the configured
    /// namespace; the root path is ignored.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the config is invalid.
    pub fn substrate(&self, config: SubstrateConfig) -> Result<Substrate, ConfigError> {
        let dimensions = config.dimensions;
        let cold_store = config.persistent.as_ref().map(|persistent| {
            SimPersistentStore::with_namespace(persistent.namespace.clone())
                .with_faults(Arc::clone(&self.faults))
        });

        let mut builder = Substrate::builder()
            .with_config(config)
            .with_embedder(Arc::new(self.embedder(dimensions)))
            .with_index(Arc::new(self.index(dimensions)))
            .with_clock(Arc::new(self.clock.clone()));
        if let Some(store) = cold_store {
            builder = builder.with_persistent_store(Arc::new(store));
        }
        builder.build()
    }
}

/// DST simulation harness.
///
/// `TigerStyle`:
/// - Single seed controls all randomness
/// - Faults are registered explicitly
/// - Environment is provided to test closure
///
/// # Example
///
/// ```rust
/// use strata_memory::dst::{SimConfig, Simulation};
/// use strata_memory::{Metadata, SubstrateConfig};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let sim = Simulation::new(SimConfig::with_seed(42)).with_embedding_faults(0.1);
///
/// sim.run(|env| async move {
///     let mut substrate = env.substrate(SubstrateConfig::default().with_dimensions(8))?;
///     // May fail with an injected fault; never panics.
///     let _ = substrate.store("Alice works at Acme", Metadata::new()).await;
///     env.advance_time_ms(1_000);
///     Ok::<(), strata_memory::ConfigError>(())
/// })
/// .await
/// .unwrap();
/// # });
/// ```
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    fault_configs: Vec<FaultConfig>,
}

impl Simulation {
    /// Create a new simulation with the given configuration.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            fault_configs: Vec::new(),
        }
    }

    /// Register a fault to inject during simulation.
    ///
    /// `TigerStyle`: Fluent API for fault registration.
    #[must_use]
    pub fn with_fault(mut self, fault_config: FaultConfig) -> Self {
        self.fault_configs.push(fault_config);
        self
    }

    /// Add embedder timeouts and outages.
    #[must_use]
    pub fn with_embedding_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::EmbeddingTimeout, probability))
            .with_fault(FaultConfig::new(
                FaultType::EmbeddingServiceUnavailable,
                probability,
            ))
    }

    /// Add index store, search and stats failures.
    #[must_use]
    pub fn with_index_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::IndexStoreFail, probability))
            .with_fault(FaultConfig::new(FaultType::IndexSearchFail, probability))
            .with_fault(FaultConfig::new(FaultType::IndexStatsFail, probability))
    }

    /// Add L2 read and write failures.
    #[must_use]
    pub fn with_cold_store_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::ColdStoreWriteFail, probability))
            .with_fault(FaultConfig::new(FaultType::ColdStoreReadFail, probability))
    }

    /// Run the simulation with the given test function.
    ///
    /// `TigerStyle`: Test function receives environment and returns Result.
    ///
    /// # Errors
    /// Returns any error from the test function.
    pub async fn run<F, Fut, E>(self, test_fn: F) -> Result<(), E>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let env = self.build();
        let seed = env.config.seed();
        let faults = Arc::clone(&env.faults);

        let result = test_fn(env).await;

        let injected = faults.total_injections();
        if injected > 0 {
            tracing::debug!(seed, injected, stats = ?faults.injection_stats(), "simulation faults");
        }
        result
    }

    /// Build the simulation environment without running a test.
    ///
    /// Useful for custom test setups.
    #[must_use]
    pub fn build(self) -> SimEnvironment {
        let mut rng = DeterministicRng::new(self.config.seed());
        let clock = SimClock::new();

        let mut fault_builder = FaultInjectorBuilder::new(rng.fork());
        for fault_config in self.fault_configs {
            fault_builder = fault_builder.with_fault(fault_config);
        }
        let faults = Arc::new(fault_builder.build());

        SimEnvironment {
            config: self.config,
            clock,
            rng,
            faults,
        }
    }
}

/// Create a simulation with optional seed.
///
/// `TigerStyle`: Factory function for common case.
#[must_use]
pub fn create_simulation(seed: Option<u64>) -> Simulation {
    let config = match seed {
        Some(s) => SimConfig::with_seed(s),
        None => SimConfig::from_env_or_random(),
    };
    Simulation::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::memory::{Metadata, PersistentStore, VectorRecord};
    use crate::substrate::PersistentConfig;

    #[tokio::test]
    async fn test_basic_simulation() {
        let sim = Simulation::new(SimConfig::with_seed(42));

        sim.run(|env| async move {
            let mut substrate = env.substrate(SubstrateConfig::default().with_dimensions(8))?;
            env.advance_time_ms(1_000);
            let stored = substrate.store("hello", Metadata::new()).await.unwrap();

            assert_eq!(stored.timestamp.timestamp_millis(), 1_000);
            assert_eq!(env.now_ms(), 1_000);
            Ok::<(), ConfigError>(())
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_simulation_determinism() {
        let draw = |seed| {
            let mut env = Simulation::new(SimConfig::with_seed(seed)).build();
            (0..10).map(|_| env.rng.next_u64()).collect::<Vec<_>>()
        };

        assert_eq!(draw(12345), draw(12345));
        assert_ne!(draw(12345), draw(54321));
    }

    #[test]
    fn test_create_simulation() {
        let env = create_simulation(Some(42)).build();
        assert_eq!(env.config.seed(), 42);
        assert_eq!(env.now_ms(), 0);
    }

    #[test]
    fn test_fluent_api() {
        let sim = Simulation::new(SimConfig::with_seed(42))
            .with_embedding_faults(0.1)
            .with_index_faults(0.05)
            .with_cold_store_faults(0.01);

        assert_eq!(sim.fault_configs.len(), 7);
    }

    /// The environment's backends must share the registered faults.
    #[tokio::test]
    async fn test_faults_reach_backends() {
        let sim = Simulation::new(SimConfig::with_seed(42))
            .with_fault(FaultConfig::new(FaultType::EmbeddingServiceUnavailable, 1.0))
            .with_fault(FaultConfig::new(FaultType::ColdStoreWriteFail, 1.0));

        sim.run(|env| async move {
            let mut substrate = env.substrate(SubstrateConfig::default().with_dimensions(8))?;
            let err = substrate.store("x", Metadata::new()).await.unwrap_err();
            assert!(matches!(err, MemoryError::BackendUnavailable { .. }));

            let record = VectorRecord {
                id: "vec-1".into(),
                vector: vec![1.0],
                content: "x".into(),
                created_at_ms: 0,
                metadata: Metadata::new(),
                sequence: 1,
            };
            assert!(env.cold_store().put(&record).await.is_err());
            assert_eq!(env.faults.total_injections(), 2);
            Ok::<(), ConfigError>(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_substrate_l2_uses_configured_namespace() {
        let env = Simulation::new(SimConfig::with_seed(1)).build();
        let substrate = env
            .substrate(
                SubstrateConfig::default()
                    .with_dimensions(8)
                    .with_persistent(PersistentConfig::on_disk("/unused").with_namespace("sim-ns")),
            )
            .unwrap();

        let store = substrate.persistent().unwrap();
        assert_eq!(store.name(), "sim");
        assert_eq!(store.namespace(), "sim-ns");
    }
}
