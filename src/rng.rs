//! Deterministic random stream used to lay out the forest.
//!
//! The generator is a 32-bit counter: every draw bumps the state by a fixed odd
//! increment and mixes the result through a few xor-shift/multiply rounds. Two
//! generators built from the same seed yield the same sequence forever, which
//! is what makes every launch reproduce the same forest.

use rand_core::{RngCore, SeedableRng, impls};

/// Seed used for the forest layout. Changing it changes every tree.
pub const FOREST_SEED: u32 = 0x5EED_F0E5;

const INCREMENT: u32 = 0x6D2B_79F5;

/// Seeded counter-based pseudo-random generator.
///
/// Implements [`RngCore`] and [`SeedableRng`], so draws go through
/// [`rand::Rng`].
///
/// # Example
///
/// ```
/// use canopy::SeededRng;
/// use rand::Rng;
///
/// let mut a = SeededRng::new(7);
/// let mut b = SeededRng::new(7);
/// assert_eq!(a.random::<f32>(), b.random::<f32>());
///
/// let v = a.random_range(2.0f32..3.0);
/// assert!((2.0..3.0).contains(&v));
/// ```
#[derive(Clone, Debug)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }
}

impl RngCore for SeededRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst)
    }
}

impl SeedableRng for SeededRng {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

impl Default for SeededRng {
    fn default() -> Self {
        Self::new(FOREST_SEED)
    }
}
