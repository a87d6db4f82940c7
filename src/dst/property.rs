//! Property-Based Testing for DST
//!
//! TigerStyle: Random operation sequences with invariant checking.
//!
//! Operations are async because the system under test (a substrate over
//! simulated backends) is async. Invariants are checked synchronously after
//! every operation against a pure read of the state.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use strata_memory::dst::{DeterministicRng, PropertyTest, PropertyTestable, SimClock};
//!
//! struct Counter { value: i64, max: i64 }
//!
//! #[derive(Debug, Clone)]
//! enum CounterOp { Increment(i64), Reset }
//!
//! #[async_trait]
//! impl PropertyTestable for Counter {
//!     type Operation = CounterOp;
//!
//!     fn generate_operation(&self, rng: &mut DeterministicRng) -> CounterOp {
//!         if rng.next_bool(0.8) { CounterOp::Increment(3) } else { CounterOp::Reset }
//!     }
//!
//!     async fn apply_operation(&mut self, op: &CounterOp, _clock: &SimClock) {
//!         match op {
//!             CounterOp::Increment(n) => self.value = (self.value + n).min(self.max),
//!             CounterOp::Reset => self.value = 0,
//!         }
//!     }
//!
//!     fn check_invariants(&self) -> Result<(), String> {
//!         if self.value > self.max {
//!             return Err(format!("value {} above max {}", self.value, self.max));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test_block_on(async {
//! let result = PropertyTest::new(42)
//!     .with_max_operations(100)
//!     .run(Counter { value: 0, max: 10 })
//!     .await;
//! assert!(result.is_success());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::fmt::Debug;

use async_trait::async_trait;

use super::clock::SimClock;
use super::rng::DeterministicRng;
use crate::constants::DST_SIMULATION_STEPS_MAX;

/// Default number of operations per property test run.
const PROPERTY_TEST_OPERATIONS_COUNT_DEFAULT: u64 = 100;

/// Trait for systems that can be property-tested.
#[async_trait]
pub trait PropertyTestable: Send {
    /// The type of operations that can be performed.
    type Operation: Debug + Clone + Send + Sync;

    /// Generate a random operation based on current state.
    fn generate_operation(&self, rng: &mut DeterministicRng) -> Self::Operation;

    /// Apply an operation to the state.
    ///
    /// Operations are allowed to fail (for example under fault injection);
    /// a failure is only a bug if it breaks an invariant.
    async fn apply_operation(&mut self, op: &Self::Operation, clock: &SimClock);

    /// Check that all invariants hold.
    ///
    /// # Errors
    /// Returns a description of the first violated invariant.
    fn check_invariants(&self) -> Result<(), String>;

    /// Describe the current state for failure reports.
    fn describe_state(&self) -> String {
        String::from("(state description not implemented)")
    }
}

/// Result of a property test run.
#[derive(Debug)]
pub struct PropertyTestResult {
    /// Number of operations successfully executed
    pub operations_executed: u64,
    /// Seed used for reproduction
    pub seed: u64,
    /// Failure details, if any
    pub failure: Option<PropertyTestFailure>,
}

impl PropertyTestResult {
    /// Check if the test passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Check if the test failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Panic with reproduction details if the run failed.
    ///
    /// # Panics
    /// Panics if the test failed.
    pub fn assert_success(self) {
        if let Some(failure) = self.failure {
            panic!(
                "Property test failed!\n\
                 Seed: {} (use this to reproduce)\n\
                 Operation #{}: {}\n\
                 Invariant violation: {}\n\
                 State: {}",
                self.seed,
                failure.operation_index,
                failure.operation,
                failure.message,
                failure.state_description
            );
        }
    }
}

/// Details of a property test failure.
#[derive(Debug)]
pub struct PropertyTestFailure {
    /// Index of the failing operation (0-based)
    pub operation_index: u64,
    /// The operation that caused the failure
    pub operation: String,
    /// The invariant violation message
    pub message: String,
    /// Description of the state at failure
    pub state_description: String,
}

/// Configuration for time advancement during property tests.
#[derive(Debug, Clone)]
pub struct TimeAdvanceConfig {
    /// Minimum time to advance per operation (ms)
    pub min_ms: u64,
    /// Maximum time to advance per operation (ms)
    pub max_ms: u64,
    /// Probability of advancing time (0.0 to 1.0)
    pub probability: f64,
}

impl Default for TimeAdvanceConfig {
    fn default() -> Self {
        Self {
            min_ms: 0,
            max_ms: 1000,
            probability: 0.5,
        }
    }
}

impl TimeAdvanceConfig {
    /// No time advancement.
    #[must_use]
    pub fn none() -> Self {
        Self {
            min_ms: 0,
            max_ms: 0,
            probability: 0.0,
        }
    }

    /// Always advance by a fixed amount.
    #[must_use]
    pub fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
            probability: 1.0,
        }
    }

    /// Advance by a random amount in `[min_ms, max_ms]` with the given probability.
    ///
    /// # Panics
    /// Panics if probability is outside [0, 1] or `min_ms > max_ms`.
    #[must_use]
    pub fn random(min_ms: u64, max_ms: u64, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1], got {probability}"
        );
        assert!(min_ms <= max_ms, "min_ms ({min_ms}) must be <= max_ms ({max_ms})");
        Self {
            min_ms,
            max_ms,
            probability,
        }
    }

    fn next_advance(&self, rng: &mut DeterministicRng) -> Option<u64> {
        if self.probability <= 0.0 || !rng.next_bool(self.probability) {
            return None;
        }
        if self.min_ms == self.max_ms {
            return Some(self.min_ms);
        }
        let span = self.max_ms - self.min_ms;
        Some(self.min_ms + rng.next_u64() % (span + 1))
    }
}

/// Property-based test runner.
///
/// TigerStyle:
/// - Deterministic via seed
/// - Explicit operation count limits
/// - Invariant checking after each operation
/// - Time advancement control
#[derive(Debug)]
pub struct PropertyTest {
    seed: u64,
    max_operations: u64,
    time_config: TimeAdvanceConfig,
    clock: SimClock,
    check_invariants_before: bool,
}

impl PropertyTest {
    /// Create a new property test with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_operations: PROPERTY_TEST_OPERATIONS_COUNT_DEFAULT,
            time_config: TimeAdvanceConfig::default(),
            clock: SimClock::new(),
            check_invariants_before: true,
        }
    }

    /// Set the maximum number of operations to run.
    ///
    /// # Panics
    /// Panics if max exceeds `DST_SIMULATION_STEPS_MAX`.
    #[must_use]
    pub fn with_max_operations(mut self, max: u64) -> Self {
        assert!(
            max <= DST_SIMULATION_STEPS_MAX,
            "max_operations {max} exceeds DST_SIMULATION_STEPS_MAX {DST_SIMULATION_STEPS_MAX}"
        );
        self.max_operations = max;
        self
    }

    /// Configure time advancement between operations.
    #[must_use]
    pub fn with_time_advance(mut self, config: TimeAdvanceConfig) -> Self {
        self.time_config = config;
        self
    }

    /// Drive this clock instead of a fresh one.
    ///
    /// Share the clock the system under test reads so advancement is visible to it.
    #[must_use]
    pub fn with_clock(mut self, clock: SimClock) -> Self {
        self.clock = clock;
        self
    }

    /// Disable checking invariants before the first operation.
    #[must_use]
    pub fn skip_initial_invariant_check(mut self) -> Self {
        self.check_invariants_before = false;
        self
    }

    /// Run the property test.
    pub async fn run<T: PropertyTestable>(self, mut state: T) -> PropertyTestResult {
        let mut rng = DeterministicRng::new(self.seed);

        if self.check_invariants_before {
            if let Err(message) = state.check_invariants() {
                return PropertyTestResult {
                    operations_executed: 0,
                    seed: self.seed,
                    failure: Some(PropertyTestFailure {
                        operation_index: 0,
                        operation: "(initial state)".to_string(),
                        message: format!("Initial state violates invariants: {message}"),
                        state_description: state.describe_state(),
                    }),
                };
            }
        }

        for i in 0..self.max_operations {
            if let Some(advance) = self.time_config.next_advance(&mut rng) {
                self.clock.advance_ms(advance);
            }

            let op = state.generate_operation(&mut rng);
            let op_debug = format!("{op:?}");
            state.apply_operation(&op, &self.clock).await;

            if let Err(message) = state.check_invariants() {
                return PropertyTestResult {
                    operations_executed: i + 1,
                    seed: self.seed,
                    failure: Some(PropertyTestFailure {
                        operation_index: i,
                        operation: op_debug,
                        message,
                        state_description: state.describe_state(),
                    }),
                };
            }
        }

        PropertyTestResult {
            operations_executed: self.max_operations,
            seed: self.seed,
            failure: None,
        }
    }

    /// Run the property test, panicking on failure.
    ///
    /// # Panics
    /// Panics if any invariant is violated.
    pub async fn run_and_assert<T: PropertyTestable>(self, state: T) {
        self.run(state).await.assert_success();
    }
}

/// Generate test seeds: the fixed edge cases `[0, 1, 42]` followed by
/// random seeds.
///
/// # Panics
/// Panics if `count < 3`.
#[must_use]
pub fn test_seeds(count: usize) -> Vec<u64> {
    assert!(count >= 3, "need at least 3 seeds for edge cases");

    let mut seeds = vec![0, 1, 42];
    let mut rng = DeterministicRng::new(rand::random());
    while seeds.len() < count {
        seeds.push(rng.next_u64());
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BoundedCounter {
        value: i64,
        min: i64,
        max: i64,
        last_seen_ms: u64,
    }

    #[derive(Debug, Clone)]
    enum CounterOp {
        Increment(i64),
        Decrement(i64),
        Reset,
    }

    #[async_trait]
    impl PropertyTestable for BoundedCounter {
        type Operation = CounterOp;

        fn generate_operation(&self, rng: &mut DeterministicRng) -> CounterOp {
            let amount = i64::try_from(rng.next_usize(1, 20)).unwrap();
            match rng.next_usize(0, 2) {
                0 => CounterOp::Increment(amount),
                1 => CounterOp::Decrement(amount),
                _ => CounterOp::Reset,
            }
        }

        async fn apply_operation(&mut self, op: &CounterOp, clock: &SimClock) {
            self.last_seen_ms = clock.now_ms();
            match op {
                CounterOp::Increment(n) => self.value = (self.value + n).min(self.max),
                CounterOp::Decrement(n) => self.value = (self.value - n).max(self.min),
                CounterOp::Reset => self.value = 0,
            }
        }

        fn check_invariants(&self) -> Result<(), String> {
            if self.value < self.min || self.value > self.max {
                return Err(format!("value {} out of bounds", self.value));
            }
            Ok(())
        }

        fn describe_state(&self) -> String {
            format!("BoundedCounter {{ value: {} }}", self.value)
        }
    }

    /// Deliberately broken: increments ignore the bound.
    struct BrokenCounter {
        value: i64,
        max: i64,
    }

    #[async_trait]
    impl PropertyTestable for BrokenCounter {
        type Operation = i64;

        fn generate_operation(&self, rng: &mut DeterministicRng) -> i64 {
            i64::try_from(rng.next_usize(1, 10)).unwrap()
        }

        async fn apply_operation(&mut self, op: &i64, _clock: &SimClock) {
            self.value += op;
        }

        fn check_invariants(&self) -> Result<(), String> {
            if self.value > self.max {
                return Err(format!("value {} above max {}", self.value, self.max));
            }
            Ok(())
        }
    }

    fn counter() -> BoundedCounter {
        BoundedCounter {
            value: 0,
            min: -50,
            max: 50,
            last_seen_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_bounded_counter_passes() {
        let result = PropertyTest::new(42)
            .with_max_operations(500)
            .run(counter())
            .await;

        assert!(result.is_success());
        assert_eq!(result.operations_executed, 500);
    }

    #[tokio::test]
    async fn test_broken_counter_fails_with_seed() {
        let result = PropertyTest::new(7)
            .with_max_operations(1000)
            .run(BrokenCounter { value: 0, max: 20 })
            .await;

        assert!(result.is_failure());
        assert_eq!(result.seed, 7);
        let failure = result.failure.unwrap();
        assert!(failure.message.contains("above max"));
    }

    #[tokio::test]
    async fn test_fixed_time_advance_reaches_state() {
        let clock = SimClock::new();
        let result = PropertyTest::new(1)
            .with_max_operations(10)
            .with_time_advance(TimeAdvanceConfig::fixed(100))
            .with_clock(clock.clone())
            .run(counter())
            .await;

        assert!(result.is_success());
        assert_eq!(clock.now_ms(), 1_000);
    }

    #[tokio::test]
    async fn test_no_time_advance() {
        let clock = SimClock::new();
        PropertyTest::new(1)
            .with_max_operations(10)
            .with_time_advance(TimeAdvanceConfig::none())
            .with_clock(clock.clone())
            .run_and_assert(counter())
            .await;

        assert_eq!(clock.now_ms(), 0);
    }

    #[tokio::test]
    async fn test_initial_invariant_violation() {
        let result = PropertyTest::new(1)
            .run(BrokenCounter { value: 100, max: 20 })
            .await;

        assert_eq!(result.operations_executed, 0);
        assert!(result.failure.unwrap().message.contains("Initial state"));
    }

    #[tokio::test]
    async fn test_skip_initial_invariant_check() {
        let result = PropertyTest::new(1)
            .with_max_operations(1)
            .skip_initial_invariant_check()
            .run(BrokenCounter { value: 100, max: 20 })
            .await;

        let failure = result.failure.unwrap();
        assert_eq!(failure.operation_index, 0);
        assert!(!failure.message.contains("Initial state"));
    }

    #[test]
    fn test_seeds_include_edge_cases() {
        let seeds = test_seeds(5);
        assert_eq!(seeds.len(), 5);
        assert_eq!(&seeds[..3], &[0, 1, 42]);
    }

    #[test]
    #[should_panic(expected = "min_ms")]
    fn test_random_time_config_invalid_range() {
        let _ = TimeAdvanceConfig::random(10, 5, 0.5);
    }
}
