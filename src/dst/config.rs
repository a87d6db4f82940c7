//! SimConfig - Simulation Configuration
//!
//! TigerStyle: One seed per run, logged so any failure can be replayed with
//! `DST_SEED=<seed>`.

use std::env;

use rand::Rng;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    seed: u64,
}

impl SimConfig {
    /// Create config with an explicit seed.
    ///
    /// ```
    /// use strata_memory::dst::SimConfig;
    /// assert_eq!(SimConfig::with_seed(12345).seed(), 12345);
    /// ```
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Use `DST_SEED` when set, otherwise a random seed.
    ///
    /// The random seed is logged so the run can be replayed.
    ///
    /// # Panics
    /// Panics if `DST_SEED` is set but is not a valid u64.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = match env::var("DST_SEED") {
            Ok(raw) => raw
                .parse::<u64>()
                .unwrap_or_else(|_| panic!("DST_SEED must be a valid u64, got: {raw}")),
            Err(_) => {
                let seed = rand::thread_rng().gen::<u64>();
                tracing::info!(seed, "DST: generated random seed (replay with DST_SEED={seed})");
                seed
            }
        };

        Self::with_seed(seed)
    }

    /// The seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_env_or_random()
    }
}
