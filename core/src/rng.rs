//! Deterministic random number generation.
//!
//! RULE: Nothing in the generator may call any platform RNG.
//! All randomness flows through StreamRng instances derived
//! from the single master seed of the run.
//!
//! Every player owns one stream per slot, seeded from
//! (master_seed, slot, player_index). This means:
//!   - A player's output never depends on any other player.
//!   - Output is identical regardless of worker count or scheduling.
//!   - Adding a new slot never changes existing streams.

use rand::{RngCore, SeedableRng};
use rand_distr::{Distribution, Exp1, StandardNormal};
use rand_pcg::Pcg64Mcg;

use crate::types::PlayerIndex;

const GOLDEN: u64 = 0x9e37_79b9_7f4a_7c15;

/// A named, deterministic RNG for one (slot, player) pair.
pub struct StreamRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StreamRng {
    /// Create a stream from the master seed and a stable stream key.
    pub fn new(master_seed: u64, stream_key: u64) -> Self {
        let derived_seed = master_seed ^ stream_key.wrapping_mul(GOLDEN);
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

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Roll an integer in [lo, hi] inclusive.
    pub fn int_in(&mut self, lo: i64, hi: i64) -> i64 {
        assert!(hi >= lo, "empty integer range");
        lo + self.next_u64_below((hi - lo + 1) as u64) as i64
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform float in [lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Draw one value from any `rand_distr` distribution on this stream.
    pub fn sample<D: Distribution<f64>>(&mut self, dist: D) -> f64 {
        dist.sample(&mut self.inner)
    }

    pub fn standard_normal(&mut self) -> f64 {
        self.sample(StandardNormal)
    }

    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        mean + std * self.standard_normal()
    }

    /// Exponential draw with the given mean.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        mean * self.sample(Exp1)
    }

    /// Pick an index with probability proportional to its weight.
    /// Non-positive weights are never chosen unless all are non-positive.
    pub fn weighted_index(&mut self, weights: &[f64]) -> usize {
        assert!(!weights.is_empty(), "weights must not be empty");
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return self.next_u64_below(weights.len() as u64) as usize;
        }
        let roll = self.next_f64() * total;
        let mut cumulative = 0.0;
        let mut last_positive = 0;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            cumulative += w;
            last_positive = i;
            if roll < cumulative {
                return i;
            }
        }
        last_positive
    }
}

/// All per-player RNG streams for a single run.
#[derive(Debug, Clone, Copy)]
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_player(&self, slot: StreamSlot, index: PlayerIndex) -> StreamRng {
        let key = (index as u64)
            .wrapping_mul(StreamSlot::COUNT)
            .wrapping_add(slot as u64)
            .wrapping_add(1);
        StreamRng::new(self.master_seed, key).with_name(slot.name())
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries — only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Player = 0,
    Markers = 1,
    Bets = 2,
}

impl StreamSlot {
    const COUNT: u64 = 3;

    pub fn name(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Markers => "markers",
            Self::Bets => "bets",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let bank = RngBank::new(42);
        let mut a = bank.for_player(StreamSlot::Bets, 7);
        let mut b = bank.for_player(StreamSlot::Bets, 7);
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn slots_and_players_are_independent_streams() {
        let bank = RngBank::new(42);
        let first = |slot, idx| bank.for_player(slot, idx).next_u64();
        assert_ne!(first(StreamSlot::Player, 0), first(StreamSlot::Markers, 0));
        assert_ne!(first(StreamSlot::Bets, 0), first(StreamSlot::Bets, 1));
        assert_ne!(first(StreamSlot::Player, 1), first(StreamSlot::Bets, 0));
    }

    #[test]
    fn standard_normal_has_unit_moments() {
        let mut rng = StreamRng::new(7, 1);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| rng.standard_normal()).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn exponential_mean_scales_with_argument() {
        let mut rng = StreamRng::new(5, 2);
        let n = 20_000;
        let mean = (0..n).map(|_| rng.exponential(4.0)).sum::<f64>() / n as f64;
        assert!((mean - 4.0).abs() < 0.15, "mean {mean}");
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let mut rng = StreamRng::new(3, 3);
        for _ in 0..500 {
            let i = rng.weighted_index(&[0.0, 1.0, 0.0, 2.0]);
            assert!(i == 1 || i == 3);
        }
    }
}
