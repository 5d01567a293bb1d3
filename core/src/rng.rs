//! Deterministic random number generation.
//!
//! RULE: Nothing in the pipeline may call any platform RNG.
//! All randomness flows through StageRng instances derived
//! from the single seed on the PipelineConfig.
//!
//! Each stage gets its own RNG stream, seeded deterministically
//! from (seed XOR slot index). This means:
//!   - Adding a new stage never changes existing stages' streams.
//!   - Re-running one stage in isolation reproduces its output.

use rand::{seq::SliceRandom, Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single pipeline stage.
pub struct StageRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StageRng {
    /// Create a stage RNG from the pipeline seed and a stable
    /// slot index. The index must never change once assigned.
    pub fn new(seed: u64, slot_index: u64) -> Self {
        let derived_seed = seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll a u64 in [0, n). Panics if n is 0.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        self.inner.gen_range(0..n)
    }

    /// Roll an integer in [lo, hi] inclusive.
    pub fn range_inclusive(&mut self, lo: u64, hi: u64) -> u64 {
        self.inner.gen_range(lo..=hi)
    }

    /// Roll a float in [lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick one element of a non-empty slice uniformly.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.inner.gen_range(0..items.len())]
    }

    /// In-place uniform shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }
}

/// All stage RNGs for a single pipeline run, indexed by stable slot.
pub struct RngBank {
    seed: u64,
}

impl RngBank {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn for_stage(&self, slot: StageSlot) -> StageRng {
        StageRng::new(self.seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stage slot assignments.
/// NEVER reorder or remove entries, only append.
/// Reordering changes every stage's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StageSlot {
    Synthesizer = 0,
    Split = 1,
    Forest = 2,
}

impl StageSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Synthesizer => "synthesizer",
            Self::Split => "split",
            Self::Forest => "forest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let bank = RngBank::new(42);
        let mut a = bank.for_stage(StageSlot::Synthesizer);
        let mut b = bank.for_stage(StageSlot::Synthesizer);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn slots_are_independent_streams() {
        let bank = RngBank::new(42);
        let mut a = bank.for_stage(StageSlot::Split);
        let mut b = bank.for_stage(StageSlot::Forest);
        let xs: Vec<u64> = (0..8).map(|_| a.next_u64()).collect();
        let ys: Vec<u64> = (0..8).map(|_| b.next_u64()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StageRng::new(7, 0);
        let mut v: Vec<usize> = (0..100).collect();
        rng.shuffle(&mut v);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let mut a: Vec<usize> = (0..50).collect();
        let mut b = a.clone();
        StageRng::new(42, 1).shuffle(&mut a);
        StageRng::new(42, 1).shuffle(&mut b);
        assert_eq!(a, b);
        assert_ne!(a, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn ranges_stay_in_bounds() {
        let mut rng = StageRng::new(3, 0);
        let items = ["a", "b", "c"];
        for _ in 0..500 {
            let x = rng.range_inclusive(1, 72);
            assert!((1..=72).contains(&x));
            assert!(rng.next_u64_below(10) < 10);
            assert!(items.contains(rng.pick(&items)));
        }
    }
}
