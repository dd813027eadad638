//! xorshift64* random number generator
//!
//! Fast, deterministic PRNG used for every random choice the simulator makes:
//! tie-breaking among equally valued actions, sampling an action from a
//! softmax policy, and drawing outcomes from a [`Distribution`].
//!
//! # Determinism
//!
//! Same seed → same sequence of random numbers → same simulation run.
//!
//! [`Distribution`]: crate::models::Distribution

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use tom_simulator_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let value = rng.next();
/// let index = rng.range(0, 3); // [0, 3)
/// assert!((0..3).contains(&index));
/// # let _ = value;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// A zero seed is replaced by 1 (xorshift cannot leave the zero state).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random value in range [min, max)
    ///
    /// # Panics
    /// Panics if min >= max
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");

        let value = self.next();
        let range_size = (max - min) as u64;
        min + (value % range_size) as i64
    }

    /// Get current RNG state (for replay)
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Generate random f64 in range [0.0, 1.0)
    ///
    /// # Example
    /// ```
    /// use tom_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(12345);
    /// let probability = rng.next_f64();
    /// assert!(probability >= 0.0 && probability < 1.0);
    /// ```
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Pick an index proportionally to `weights`
    ///
    /// Weights need not sum to one. Returns `None` when the slice is empty or
    /// holds no positive weight. A single candidate is returned without
    /// advancing the generator, so deterministic choices leave the sequence
    /// untouched.
    pub fn choose_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let positive: Vec<usize> = weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(|(i, _)| i)
            .collect();

        match positive.len() {
            0 => None,
            1 => Some(positive[0]),
            _ => {
                let total: f64 = positive.iter().map(|&i| weights[i]).sum();
                let target = self.next_f64() * total;
                let mut cumulative = 0.0;
                for &i in &positive {
                    cumulative += weights[i];
                    if target < cumulative {
                        return Some(i);
                    }
                }
                positive.last().copied()
            }
        }
    }
}
