//! Environment traits for vectorized classic-control simulations.
//!
//! This module provides:
//! - [`Environment`] trait for vectorized environment implementations
//! - [`StepResult`] for borrowing step outputs without copying
//! - [`ResetMask`] for selective environment reset with O(k) iteration

// ============================================================================
// StepResult - Zero-copy step result access
// ============================================================================

/// Result of a single vectorized step.
///
/// Borrows the environment's internal buffers. Observations of finished
/// replicas are their terminal observations; nothing is reset until
/// [`Environment::reset_envs`] is called.
#[derive(Debug)]
pub struct StepResult<'a> {
    /// Flat observation buffer: [obs0, obs1, ...]
    pub observations: &'a [f32],
    /// Reward for each environment
    pub rewards: &'a [f32],
    /// Terminal flags (1 = terminated, 0 = not)
    pub terminals: &'a [u8],
    /// Truncation flags (1 = truncated, 0 = not)
    pub truncations: &'a [u8],
    /// Number of parallel environments
    pub num_envs: usize,
    /// Observation size per environment
    pub obs_size: usize,
}

impl<'a> StepResult<'a> {
    /// Check if environment terminated.
    #[inline]
    pub fn is_terminal(&self, env_idx: usize) -> bool {
        self.terminals[env_idx] != 0
    }

    /// Check if environment was truncated.
    #[inline]
    pub fn is_truncated(&self, env_idx: usize) -> bool {
        self.truncations[env_idx] != 0
    }

    /// Check if episode ended (terminal or truncated).
    #[inline]
    pub fn is_done(&self, env_idx: usize) -> bool {
        self.is_terminal(env_idx) || self.is_truncated(env_idx)
    }
}

// ============================================================================
// ResetMask - Packed bitmask for selective reset
// ============================================================================

/// Bitmask for selective environment reset.
///
/// Each bit represents one environment (1 = reset, 0 = keep), packed 64
/// environments per `u64` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetMask {
    chunks: Vec<u64>,
    num_envs: usize,
}

impl ResetMask {
    /// Create an empty mask (no environments to reset).
    pub fn new(num_envs: usize) -> Self {
        Self {
            chunks: vec![0u64; num_envs.div_ceil(64)],
            num_envs,
        }
    }

    /// Create a mask with every environment set.
    pub fn all(num_envs: usize) -> Self {
        let mut mask = Self::new(num_envs);
        for i in 0..num_envs {
            mask.set(i);
        }
        mask
    }

    /// Create mask from terminal/truncation buffers.
    ///
    /// An environment is marked for reset if either flag is set.
    pub fn from_done_flags(terminals: &[u8], truncations: &[u8]) -> Self {
        debug_assert_eq!(terminals.len(), truncations.len());
        let mut mask = Self::new(terminals.len());
        for (i, (&t, &tr)) in terminals.iter().zip(truncations.iter()).enumerate() {
            if t != 0 || tr != 0 {
                mask.set(i);
            }
        }
        mask
    }

    /// Create mask from a list of environment indices.
    ///
    /// Indices outside `0..num_envs` are ignored.
    pub fn from_indices(num_envs: usize, indices: &[usize]) -> Self {
        let mut mask = Self::new(num_envs);
        for &idx in indices.iter().filter(|&&i| i < num_envs) {
            mask.set(idx);
        }
        mask
    }

    /// Check if any environments need reset.
    #[inline]
    pub fn any(&self) -> bool {
        self.chunks.iter().any(|&c| c != 0)
    }

    /// Count how many environments need reset.
    pub fn count(&self) -> usize {
        self.chunks.iter().map(|c| c.count_ones() as usize).sum()
    }

    /// Number of environments this mask covers.
    #[inline]
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Mark an environment for reset.
    #[inline]
    pub fn set(&mut self, env_idx: usize) {
        debug_assert!(env_idx < self.num_envs);
        self.chunks[env_idx / 64] |= 1u64 << (env_idx % 64);
    }

    /// Check if a specific environment is marked for reset.
    #[inline]
    pub fn is_set(&self, env_idx: usize) -> bool {
        debug_assert!(env_idx < self.num_envs);
        (self.chunks[env_idx / 64] >> (env_idx % 64)) & 1 != 0
    }

    /// Iterate over environment indices that need reset.
    ///
    /// Walks set bits with `trailing_zeros()`, so cost is O(k) in the number
    /// of marked environments.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        let last = self.chunks.len().saturating_sub(1);
        self.chunks.iter().enumerate().flat_map(move |(chunk_idx, &chunk)| {
            let base = chunk_idx * 64;
            let max_bit = if chunk_idx == last {
                self.num_envs - base
            } else {
                64
            };
            BitIter::new(chunk, max_bit).map(move |bit| base + bit)
        })
    }
}

/// Iterator over set bits of a single chunk.
struct BitIter {
    remaining: u64,
    max_bit: usize,
}

impl BitIter {
    fn new(bits: u64, max_bit: usize) -> Self {
        Self {
            remaining: bits,
            max_bit,
        }
    }
}

impl Iterator for BitIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let bit = self.remaining.trailing_zeros() as usize;
        if bit >= self.max_bit {
            self.remaining = 0;
            None
        } else {
            self.remaining &= self.remaining - 1; // clear lowest set bit
            Some(bit)
        }
    }
}

// ============================================================================
// Environment trait
// ============================================================================

/// Vectorized environment with struct-of-arrays state.
///
/// Every environment is batched: one call steps all `num_envs` replicas in
/// lockstep. Stepping never resets finished replicas; the caller reads the
/// terminal observation and then calls [`Environment::reset_envs`].
pub trait Environment {
    /// Registry id of this environment (e.g. `"CartPole-v1"`).
    fn id(&self) -> &str;

    /// Number of parallel environments.
    fn num_envs(&self) -> usize;

    /// Observation size per environment.
    fn observation_size(&self) -> usize;

    /// Number of discrete actions.
    fn num_actions(&self) -> usize;

    /// Reset all environments. Replica `i` is seeded with `seed + i`.
    fn reset(&mut self, seed: u64);

    /// Step all environments without auto-reset.
    ///
    /// `actions` holds one action index per replica, encoded as `f32`.
    fn step_no_reset(&mut self, actions: &[f32]) -> StepResult<'_>;

    /// Reset the environments marked in `mask`. Replica `i` is seeded with
    /// `seed + i`.
    fn reset_envs(&mut self, mask: &ResetMask, seed: u64);

    /// Write current observations to `buffer` (`num_envs * observation_size`).
    fn write_observations(&self, buffer: &mut [f32]);
}
