//! On-policy rollout storage.
//!
//! Transitions from all environments are stored interleaved by step:
//! `[env0_t0, env1_t0, ..., env0_t1, env1_t1, ...]`.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::algorithms::{compute_gae_vectorized, DiscreteAction};

/// Storage for one PPO rollout.
pub struct RolloutStorage {
    /// Flattened observations: [step * n_envs * obs_size]
    pub states: Vec<f32>,
    pub actions: Vec<DiscreteAction>,
    /// Rewards, including the bootstrap term added for truncated episodes
    pub rewards: Vec<f32>,
    /// Episode end flags (terminal or truncated)
    pub dones: Vec<bool>,
    /// Value estimates recorded during collection
    pub values: Vec<f32>,
    /// Log probabilities of the taken actions
    pub log_probs: Vec<f32>,

    pub n_envs: usize,
    pub obs_size: usize,
    pub step_count: usize,
    pub rollout_len: usize,
}

impl RolloutStorage {
    pub fn new(n_envs: usize, rollout_len: usize, obs_size: usize) -> Self {
        let capacity = n_envs * rollout_len;
        Self {
            states: Vec::with_capacity(capacity * obs_size),
            actions: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            dones: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            log_probs: Vec::with_capacity(capacity),
            n_envs,
            obs_size,
            step_count: 0,
            rollout_len,
        }
    }

    /// Push one step of transitions (all environments).
    pub fn push_step(
        &mut self,
        states: &[f32],
        actions: &[DiscreteAction],
        rewards: &[f32],
        dones: &[bool],
        values: &[f32],
        log_probs: &[f32],
    ) {
        debug_assert_eq!(states.len(), self.n_envs * self.obs_size);
        debug_assert_eq!(actions.len(), self.n_envs);
        debug_assert_eq!(rewards.len(), self.n_envs);
        debug_assert_eq!(dones.len(), self.n_envs);
        debug_assert_eq!(values.len(), self.n_envs);
        debug_assert_eq!(log_probs.len(), self.n_envs);

        self.states.extend_from_slice(states);
        self.actions.extend_from_slice(actions);
        self.rewards.extend_from_slice(rewards);
        self.dones.extend_from_slice(dones);
        self.values.extend_from_slice(values);
        self.log_probs.extend_from_slice(log_probs);

        self.step_count += 1;
    }

    pub fn is_full(&self) -> bool {
        self.step_count >= self.rollout_len
    }

    /// Total number of transitions.
    pub fn len(&self) -> usize {
        self.step_count * self.n_envs
    }

    pub fn is_empty(&self) -> bool {
        self.step_count == 0
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
        self.dones.clear();
        self.values.clear();
        self.log_probs.clear();
        self.step_count = 0;
    }

    /// Compute GAE advantages and returns, bootstrapping from `last_values`.
    pub fn compute_returns_and_advantages(
        &self,
        last_values: &[f32],
        gamma: f32,
        gae_lambda: f32,
    ) -> ComputedValues {
        let (advantages, returns) = compute_gae_vectorized(
            &self.rewards,
            &self.values,
            &self.dones,
            last_values,
            self.n_envs,
            gamma,
            gae_lambda,
        );
        ComputedValues::new(advantages, returns)
    }
}

/// Advantages and value targets for a rollout.
#[derive(Debug, Clone)]
pub struct ComputedValues {
    pub advantages: Vec<f32>,
    pub returns: Vec<f32>,
}

impl ComputedValues {
    pub fn new(advantages: Vec<f32>, returns: Vec<f32>) -> Self {
        Self { advantages, returns }
    }
}

/// Indices of one minibatch into the flat storage arrays.
#[derive(Debug, Clone)]
pub struct MinibatchIndices {
    pub indices: Vec<usize>,
}

impl MinibatchIndices {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Shuffle `0..total` and split into minibatches of `minibatch_size`. The
/// last minibatch holds the remainder.
pub fn generate_minibatches<R: Rng>(
    total: usize,
    minibatch_size: usize,
    rng: &mut R,
) -> Vec<MinibatchIndices> {
    let mut indices: Vec<usize> = (0..total).collect();
    indices.shuffle(rng);

    indices
        .chunks(minibatch_size.max(1))
        .map(|chunk| MinibatchIndices {
            indices: chunk.to_vec(),
        })
        .collect()
}

/// Host-side copy of one minibatch.
#[derive(Debug, Clone)]
pub struct MinibatchData {
    pub states: Vec<f32>,
    pub actions: Vec<DiscreteAction>,
    pub old_values: Vec<f32>,
    pub old_log_probs: Vec<f32>,
    pub advantages: Vec<f32>,
    pub returns: Vec<f32>,
    pub obs_size: usize,
}

impl MinibatchData {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn states_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(&self.states[..], device).reshape([self.len(), self.obs_size])
    }

    pub fn old_values_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::<B, 1>::from_floats(&self.old_values[..], device)
    }

    pub fn old_log_probs_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::<B, 1>::from_floats(&self.old_log_probs[..], device)
    }

    pub fn advantages_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::<B, 1>::from_floats(&self.advantages[..], device)
    }

    pub fn returns_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::<B, 1>::from_floats(&self.returns[..], device)
    }
}

/// Gather one minibatch from storage.
pub fn extract_minibatch(
    storage: &RolloutStorage,
    computed: &ComputedValues,
    indices: &MinibatchIndices,
) -> MinibatchData {
    let batch_size = indices.len();
    let obs_size = storage.obs_size;

    let mut data = MinibatchData {
        states: Vec::with_capacity(batch_size * obs_size),
        actions: Vec::with_capacity(batch_size),
        old_values: Vec::with_capacity(batch_size),
        old_log_probs: Vec::with_capacity(batch_size),
        advantages: Vec::with_capacity(batch_size),
        returns: Vec::with_capacity(batch_size),
        obs_size,
    };

    for &idx in &indices.indices {
        let obs_start = idx * obs_size;
        data.states
            .extend_from_slice(&storage.states[obs_start..obs_start + obs_size]);
        data.actions.push(storage.actions[idx]);
        data.old_values.push(storage.values[idx]);
        data.old_log_probs.push(storage.log_probs[idx]);
        data.advantages.push(computed.advantages[idx]);
        data.returns.push(computed.returns[idx]);
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn filled_storage() -> RolloutStorage {
        let mut storage = RolloutStorage::new(2, 3, 2);
        for t in 0..3 {
            let t = t as f32;
            storage.push_step(
                &[t, t, t + 0.5, t + 0.5],
                &[DiscreteAction(0), DiscreteAction(1)],
                &[1.0, 2.0],
                &[false, t == 2.0],
                &[0.5, 0.6],
                &[-0.7, -0.1],
            );
        }
        storage
    }

    #[test]
    fn test_push_and_len() {
        let storage = filled_storage();
        assert!(storage.is_full());
        assert_eq!(storage.len(), 6);
        assert_eq!(storage.states.len(), 12);
    }

    #[test]
    fn test_clear() {
        let mut storage = filled_storage();
        storage.clear();
        assert!(storage.is_empty());
        assert_eq!(storage.len(), 0);
        assert!(storage.states.is_empty());
    }

    #[test]
    fn test_generate_minibatches() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let batches = generate_minibatches(100, 32, &mut rng);

        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0].len(), 32);
        assert_eq!(batches[3].len(), 4);

        let mut all: Vec<usize> = batches.iter().flat_map(|b| b.indices.clone()).collect();
        all.sort();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_extract_minibatch() {
        let storage = filled_storage();
        let computed = ComputedValues::new((0..6).map(|i| i as f32).collect(), vec![9.0; 6]);
        let mb = extract_minibatch(
            &storage,
            &computed,
            &MinibatchIndices {
                indices: vec![5, 0],
            },
        );

        assert_eq!(mb.len(), 2);
        // idx 5 = env1 at t2
        assert_eq!(&mb.states[..2], &[2.5, 2.5]);
        assert_eq!(mb.actions, vec![DiscreteAction(1), DiscreteAction(0)]);
        assert_eq!(mb.advantages, vec![5.0, 0.0]);
        assert_eq!(mb.old_log_probs, vec![-0.1, -0.7]);
    }

    #[test]
    fn test_compute_returns_uses_dones() {
        let storage = filled_storage();
        let computed = storage.compute_returns_and_advantages(&[100.0, 100.0], 0.99, 0.95);
        // env1 ended at t2, so its last return ignores the bootstrap.
        assert!((computed.returns[5] - 2.0).abs() < 1e-5);
        // env0 is still running and bootstraps from 100.
        assert!(computed.returns[4] > 50.0);
    }
}
