//! Injectable uniform random source for seed and candidate sampling.

use rand::{Rng, RngCore};

/// Source of uniform samples in `[0, 1)`.
///
/// Any `rand` generator qualifies; tests pass a seeded
/// [`rand::rngs::StdRng`] for reproducible rounds.
pub trait RandomSource {
    /// Next sample in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick_index(&mut self, len: usize) -> usize {
        let idx = (self.next_unit() * len as f64) as usize;
        idx.min(len.saturating_sub(1))
    }
}

impl<R: RngCore> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}
