//! Random number generator abstraction for determinism.
//!
//! In production, this wraps a real RNG. In tests a seeded or scripted
//! implementation is injected so role shuffles are repeatable.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Abstraction over random number generation.
pub trait DeterministicRng: Send + Sync {
    /// Generate a random `u32` in the range `[min, max]` inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;

    /// Generate a random `f64` in `[0.0, 1.0)`.
    fn next_f64(&mut self) -> f64;
}

/// Production RNG backed by an OS-seeded [`StdRng`].
#[derive(Debug)]
pub struct SystemRng(StdRng);

impl SystemRng {
    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_os() -> Self {
        Self(StdRng::from_os_rng())
    }

    /// Creates a generator with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl DeterministicRng for SystemRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.0.random_range(min..=max)
    }

    fn next_f64(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_stays_in_range_and_repeats() {
        let mut a = SystemRng::seeded(7);
        let mut b = SystemRng::seeded(7);

        for _ in 0..100 {
            let x = a.next_u32_range(3, 9);
            assert!((3..=9).contains(&x));
            assert_eq!(x, b.next_u32_range(3, 9));
        }
    }

    #[test]
    fn test_degenerate_range_returns_min() {
        let mut rng = SystemRng::seeded(1);
        assert_eq!(rng.next_u32_range(5, 5), 5);
        assert_eq!(rng.next_u32_range(6, 2), 6);
    }
}
