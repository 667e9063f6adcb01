//! Injectable randomness for scoring noise and queue shuffling

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of uniform draws in `[0, 1)`
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;

    /// Uniform index in `0..upper`; `upper` must be non-zero
    fn next_index(&self, upper: usize) -> usize {
        let idx = (self.next_f64() * upper as f64) as usize;
        idx.min(upper.saturating_sub(1))
    }
}

/// Thread-local entropy, used in production
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible stream from a fixed seed
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen::<f64>()
    }
}

/// Always returns the same value; pins noise terms in tests
#[derive(Debug, Clone, Copy)]
pub struct ConstantRandom(pub f64);

impl RandomSource for ConstantRandom {
    fn next_f64(&self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Fisher-Yates shuffle driven by `rng`
pub fn shuffle<T>(items: &mut [T], rng: &dyn RandomSource) {
    for i in (1..items.len()).rev() {
        let j = rng.next_index(i + 1);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_index_stays_in_bounds() {
        let high = ConstantRandom(0.999_999);
        assert_eq!(high.next_index(5), 4);
        let low = ConstantRandom(0.0);
        assert_eq!(low.next_index(5), 0);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let rng = SeededRandom::new(7);
        let mut items: Vec<u32> = (0..50).collect();
        shuffle(&mut items, &rng);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let a = SeededRandom::new(42);
        let b = SeededRandom::new(42);
        for _ in 0..10 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }

    #[test]
    fn test_thread_random_range() {
        let rng = ThreadRandom;
        for _ in 0..100 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
