//! Vectorized environment adapter used by the agents.
//!
//! [`VectorizedEnv`] is the learner-facing interface: discrete actions in,
//! owned step results out, explicit resets. [`VecEnv`] implements it over any
//! environment from the `classic_control` registry.

use classic_control::{Environment, EnvError, ResetMask};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::algorithms::DiscreteAction;

/// Result from stepping vectorized environments.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Observations after the step [n_envs * obs_size]. For replicas whose
    /// episode just ended this is the terminal observation.
    pub observations: Vec<f32>,
    /// Rewards received [n_envs]
    pub rewards: Vec<f32>,
    /// Terminal flags (episode ended due to goal/failure) [n_envs]
    pub terminals: Vec<bool>,
    /// Truncation flags (episode ended due to time limit) [n_envs]
    pub truncations: Vec<bool>,
}

impl StepResult {
    /// Done flags (terminal OR truncated).
    pub fn dones(&self) -> Vec<bool> {
        self.terminals
            .iter()
            .zip(self.truncations.iter())
            .map(|(&t, &tr)| t || tr)
            .collect()
    }

    /// Indices of replicas whose episode ended on this step.
    pub fn done_indices(&self) -> Vec<usize> {
        self.dones()
            .iter()
            .enumerate()
            .filter_map(|(i, &done)| done.then_some(i))
            .collect()
    }
}

/// Trait for vectorized discrete-action environments.
///
/// Stepping never auto-resets: callers inspect the step result, then call
/// [`VectorizedEnv::reset_envs`] for the finished replicas.
pub trait VectorizedEnv: Send {
    /// Registry id of the wrapped environment.
    fn env_id(&self) -> &str;

    /// Number of parallel environments.
    fn n_envs(&self) -> usize;

    /// Size of observation vector for a single environment.
    fn obs_size(&self) -> usize;

    /// Number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Write current observations to buffer (`n_envs * obs_size`), flat
    /// layout [env0_obs, env1_obs, ...].
    fn write_observations(&self, buffer: &mut [f32]);

    /// Step all environments with one action each.
    fn step(&mut self, actions: &[DiscreteAction]) -> StepResult;

    /// Reset the listed environments.
    fn reset_envs(&mut self, indices: &[usize]);

    /// Reset all environments and restart the reset seed stream from `seed`.
    fn reset_all(&mut self, seed: u64);

    /// Current observations as a new vector.
    fn get_observations(&self) -> Vec<f32> {
        let mut buffer = vec![0.0f32; self.n_envs() * self.obs_size()];
        self.write_observations(&mut buffer);
        buffer
    }
}

/// [`VectorizedEnv`] over a registry environment.
///
/// Every partial reset draws a fresh seed from an internal stream, so the
/// reset sequence is fixed by the seed given to [`VectorizedEnv::reset_all`].
pub struct VecEnv {
    env: Box<dyn Environment + Send>,
    seeds: Xoshiro256StarStar,
    actions: Vec<f32>,
}

impl VecEnv {
    /// Wrap an environment. It is not reset; call `reset_all` before use.
    pub fn new(env: Box<dyn Environment + Send>) -> Self {
        let n_envs = env.num_envs();
        Self {
            env,
            seeds: Xoshiro256StarStar::seed_from_u64(0),
            actions: vec![0.0; n_envs],
        }
    }
}

impl VectorizedEnv for VecEnv {
    fn env_id(&self) -> &str {
        self.env.id()
    }

    fn n_envs(&self) -> usize {
        self.env.num_envs()
    }

    fn obs_size(&self) -> usize {
        self.env.observation_size()
    }

    fn n_actions(&self) -> usize {
        self.env.num_actions()
    }

    fn write_observations(&self, buffer: &mut [f32]) {
        self.env.write_observations(buffer);
    }

    fn step(&mut self, actions: &[DiscreteAction]) -> StepResult {
        debug_assert_eq!(actions.len(), self.actions.len());
        debug_assert!(actions.iter().all(|a| (a.0 as usize) < self.env.num_actions()));

        for (slot, action) in self.actions.iter_mut().zip(actions) {
            *slot = action.as_f32();
        }

        let result = self.env.step_no_reset(&self.actions);
        StepResult {
            observations: result.observations.to_vec(),
            rewards: result.rewards.to_vec(),
            terminals: result.terminals.iter().map(|&t| t != 0).collect(),
            truncations: result.truncations.iter().map(|&t| t != 0).collect(),
        }
    }

    fn reset_envs(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let mask = ResetMask::from_indices(self.env.num_envs(), indices);
        let seed = self.seeds.gen::<u64>();
        self.env.reset_envs(&mask, seed);
    }

    fn reset_all(&mut self, seed: u64) {
        self.seeds = Xoshiro256StarStar::seed_from_u64(seed);
        self.env.reset(seed);
    }
}

/// Build `n_envs` replicas of the registered environment `env_id` and reset
/// them from `seed`.
pub fn make_vec_env(env_id: &str, n_envs: usize, seed: u64) -> Result<VecEnv, EnvError> {
    let mut env = VecEnv::new(classic_control::make(env_id, n_envs)?);
    env.reset_all(seed);
    log::debug!("built {} x {} (seed {})", n_envs, env_id, seed);
    Ok(env)
}
