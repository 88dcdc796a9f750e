//! xorshift64* random number generator
//!
//! A fast, high-quality PRNG that is deterministic and suitable for
//! simulation purposes. Same seed → same sequence, which is what makes
//! event logs and KPI reports reproducible across runs and platforms.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use fairway_dispatch::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let value = rng.next();
/// let range_value = rng.range(0, 100); // [0, 100)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
    /// Cached second draw from the last Box-Muller pair
    gauss_spare: Option<f64>,
}

impl RngManager {
    /// Create a new RNG with the given seed.
    ///
    /// A zero seed is mapped to 1 (xorshift requirement: state must be
    /// non-zero).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self {
            state,
            gauss_spare: None,
        }
    }

    /// Generate the next random u64 value, advancing the internal state.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        // xorshift64* algorithm
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate a random value in `[min, max)`.
    ///
    /// # Panics
    /// Panics if `min >= max`.
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");

        let value = self.next();
        let range_size = (max - min) as u64;
        min + (value % range_size) as i64
    }

    /// Generate a random f64 in `[0.0, 1.0)`.
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Generate a random f64 uniformly in `[lo, hi)`.
    ///
    /// # Panics
    /// Panics if `lo > hi`.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        assert!(lo <= hi, "lo must not exceed hi");
        lo + self.next_f64() * (hi - lo)
    }

    /// Sample a normally distributed f64 via the Box-Muller transform.
    ///
    /// Consumes two uniform draws per pair of outputs; the spare output is
    /// cached so consecutive calls stay cheap and deterministic.
    pub fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        if let Some(z) = self.gauss_spare.take() {
            return mean + std_dev * z;
        }
        // Reject u1 == 0 so ln() stays finite.
        let mut u1 = self.next_f64();
        while u1 <= f64::EPSILON {
            u1 = self.next_f64();
        }
        let u2 = self.next_f64();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.gauss_spare = Some(radius * theta.sin());
        mean + std_dev * radius * theta.cos()
    }

    /// Bernoulli draw: returns true with probability `p` (clamped to [0, 1]).
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.next_f64() < p.clamp(0.0, 1.0)
    }

    /// Get the current RNG state (for checkpointing/replay).
    pub fn get_state(&self) -> u64 {
        self.state
    }
}
