//! DeterministicRng - Seeded Random Number Generator
//!
//! TigerStyle: ChaCha20-based RNG. Every random decision in a simulation
//! (fault rolls, generated vectors, generated operations) flows through here.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Golden-ratio increment used to derive fork seeds.
const FORK_SEED_INCREMENT: u64 = 0x9E37_79B9_7F4A_7C15;

/// A deterministic random number generator.
///
/// Same seed, same sequence. [`fork`](Self::fork) derives independent
/// streams so components do not perturb each other's sequences.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha20Rng,
    seed: u64,
    forks: u64,
}

impl DeterministicRng {
    /// Create a new RNG with the given seed.
    ///
    /// ```
    /// use strata_memory::dst::DeterministicRng;
    /// let mut rng = DeterministicRng::new(42);
    /// assert!(rng.next_float() < 1.0);
    /// ```
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
            forks: 0,
        }
    }

    /// The seed this RNG was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Random float in [0, 1).
    pub fn next_float(&mut self) -> f64 {
        let value = self.rng.gen::<f64>();
        debug_assert!((0.0..1.0).contains(&value), "float must be in [0, 1)");
        value
    }

    /// Random float in [-1, 1), as used for vector components.
    pub fn next_signed_f32(&mut self) -> f32 {
        #[allow(clippy::cast_possible_truncation)]
        let value = (self.next_float() * 2.0 - 1.0) as f32;
        value
    }

    /// Random u64.
    pub fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Random usize in [min, max] (inclusive).
    ///
    /// # Panics
    /// Panics if min > max.
    pub fn next_usize(&mut self, min: usize, max: usize) -> usize {
        assert!(min <= max, "min ({min}) must be <= max ({max})");
        self.rng.gen_range(min..=max)
    }

    /// Random boolean that is true with the given probability.
    ///
    /// # Panics
    /// Panics if probability is not in [0, 1].
    pub fn next_bool(&mut self, probability: f64) -> bool {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1], got {probability}"
        );
        self.next_float() < probability
    }

    /// Pick an element of a non-empty slice.
    ///
    /// # Panics
    /// Panics if the slice is empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        assert!(!items.is_empty(), "cannot choose from empty slice");
        let index = self.next_usize(0, items.len() - 1);
        &items[index]
    }

    /// Derive an independent RNG from this one.
    pub fn fork(&mut self) -> Self {
        self.forks += 1;
        let fork_seed = self
            .seed
            .wrapping_add(self.forks.wrapping_mul(FORK_SEED_INCREMENT));
        Self::new(fork_seed)
    }
}
