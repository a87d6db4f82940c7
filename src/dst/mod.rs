//! DST - Deterministic Simulation Testing
//!
//! TigerBeetle/FoundationDB-style deterministic simulation testing framework.
//!
//! # Philosophy
//!
//! > "If you're not testing with fault injection, you're not testing."
//!
//! One seed drives the embedder, the fault injector and the operation mix,
//! and time only moves when the test moves it.
//!
//! # Usage
//!
//! ```rust
//! use strata_memory::dst::{FaultConfig, FaultType, SimConfig, Simulation};
//! use strata_memory::{Metadata, SubstrateConfig};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let sim = Simulation::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::IndexStoreFail, 0.1));
//!
//! sim.run(|env| async move {
//!     let mut substrate = env.substrate(SubstrateConfig::default().with_dimensions(16))?;
//!     for i in 0..10 {
//!         let _ = substrate.store(&format!("note {i}"), Metadata::new()).await;
//!         env.advance_time_ms(1_000);
//!     }
//!     Ok::<(), strata_memory::ConfigError>(())
//! })
//! .await
//! .unwrap();
//! # });
//! ```
//!
//! Run with explicit seed for reproducibility:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod clock;
mod config;
mod fault;
mod property;
mod rng;
mod simulation;

pub use clock::{Clock, SimClock, SystemClock};
pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use property::{
    test_seeds, PropertyTest, PropertyTestFailure, PropertyTestResult, PropertyTestable,
    TimeAdvanceConfig,
};
pub use rng::DeterministicRng;
pub use simulation::{create_simulation, SimEnvironment, Simulation};
