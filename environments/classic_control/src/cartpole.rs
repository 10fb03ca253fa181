//! Vectorized CartPole with Struct-of-Arrays memory layout.
//!
//! Classic cart-pole balancing (Barto, Sutton & Anderson), integrated with
//! explicit Euler steps. Observation: `[x, x_dot, theta, theta_dot]`.
//! Actions: `0` pushes left, `1` pushes right.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::env::{Environment, ResetMask, StepResult};
use crate::error::{EnvError, Result};

const GRAVITY: f32 = 9.8;
const CART_MASS: f32 = 1.0;
const POLE_MASS: f32 = 0.1;
const POLE_LENGTH: f32 = 0.5;
const FORCE_MAG: f32 = 10.0;
const DT: f32 = 0.02;
const X_THRESHOLD: f32 = 2.4;
const THETA_THRESHOLD: f32 = 12.0 * std::f32::consts::PI / 180.0;
const INIT_RANGE: f32 = 0.05;

/// Observation size per environment.
pub const OBS_SIZE: usize = 4;
/// Number of discrete actions.
pub const N_ACTIONS: usize = 2;

/// Vectorized CartPole.
///
/// All replica states live in contiguous per-field arrays.
pub struct CartPole {
    id: String,
    x: Vec<f32>,
    x_dot: Vec<f32>,
    theta: Vec<f32>,
    theta_dot: Vec<f32>,
    rewards: Vec<f32>,
    terminals: Vec<u8>,
    truncations: Vec<u8>,
    ticks: Vec<u32>,
    num_envs: usize,
    max_steps: u32,
    /// Layout: [x0, x_dot0, theta0, theta_dot0, x1, x_dot1, ...]
    obs_buffer: Vec<f32>,
}

impl CartPole {
    /// Create a new vectorized CartPole.
    ///
    /// # Arguments
    ///
    /// * `id` - Registry id reported by [`Environment::id`]
    /// * `num_envs` - Number of parallel environment instances
    /// * `max_steps` - Episode length at which replicas are truncated
    pub fn new(id: impl Into<String>, num_envs: usize, max_steps: u32) -> Result<Self> {
        if num_envs == 0 {
            return Err(EnvError::InvalidConfig {
                param: "num_envs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if max_steps == 0 {
            return Err(EnvError::InvalidConfig {
                param: "max_steps".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            id: id.into(),
            x: vec![0.0; num_envs],
            x_dot: vec![0.0; num_envs],
            theta: vec![0.0; num_envs],
            theta_dot: vec![0.0; num_envs],
            rewards: vec![0.0; num_envs],
            terminals: vec![0; num_envs],
            truncations: vec![0; num_envs],
            ticks: vec![0; num_envs],
            num_envs,
            max_steps,
            obs_buffer: vec![0.0; num_envs * OBS_SIZE],
        })
    }

    /// Episode length at which replicas are truncated.
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    fn reset_single(&mut self, idx: usize, seed: u64) {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);

        self.x[idx] = rng.gen_range(-INIT_RANGE..INIT_RANGE);
        self.x_dot[idx] = rng.gen_range(-INIT_RANGE..INIT_RANGE);
        self.theta[idx] = rng.gen_range(-INIT_RANGE..INIT_RANGE);
        self.theta_dot[idx] = rng.gen_range(-INIT_RANGE..INIT_RANGE);

        self.ticks[idx] = 0;
        self.write_obs_single(idx);
    }

    #[inline]
    fn write_obs_single(&mut self, idx: usize) {
        let base = idx * OBS_SIZE;
        self.obs_buffer[base] = self.x[idx];
        self.obs_buffer[base + 1] = self.x_dot[idx];
        self.obs_buffer[base + 2] = self.theta[idx];
        self.obs_buffer[base + 3] = self.theta_dot[idx];
    }

    fn step_single_env(&mut self, idx: usize, action: f32) {
        let force = if action as i32 == 1 { FORCE_MAG } else { -FORCE_MAG };

        let x = self.x[idx];
        let x_dot = self.x_dot[idx];
        let theta = self.theta[idx];
        let theta_dot = self.theta_dot[idx];

        let cos_theta = theta.cos();
        let sin_theta = theta.sin();

        let total_mass = CART_MASS + POLE_MASS;
        let pole_mass_length = POLE_MASS * POLE_LENGTH;

        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin_theta) / total_mass;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (POLE_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        let new_x = x + DT * x_dot;
        let new_theta = theta + DT * theta_dot;

        self.x[idx] = new_x;
        self.x_dot[idx] = x_dot + DT * x_acc;
        self.theta[idx] = new_theta;
        self.theta_dot[idx] = theta_dot + DT * theta_acc;
        self.ticks[idx] += 1;

        let terminal = new_x.abs() > X_THRESHOLD || new_theta.abs() > THETA_THRESHOLD;
        let truncated = !terminal && self.ticks[idx] >= self.max_steps;

        self.terminals[idx] = terminal as u8;
        self.truncations[idx] = truncated as u8;
        // The terminating step is still rewarded.
        self.rewards[idx] = 1.0;

        self.write_obs_single(idx);
    }
}

impl Environment for CartPole {
    fn id(&self) -> &str {
        &self.id
    }

    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn observation_size(&self) -> usize {
        OBS_SIZE
    }

    fn num_actions(&self) -> usize {
        N_ACTIONS
    }

    fn reset(&mut self, seed: u64) {
        for i in 0..self.num_envs {
            self.reset_single(i, seed.wrapping_add(i as u64));
            self.rewards[i] = 0.0;
            self.terminals[i] = 0;
            self.truncations[i] = 0;
        }
    }

    fn step_no_reset(&mut self, actions: &[f32]) -> StepResult<'_> {
        debug_assert_eq!(actions.len(), self.num_envs);

        for (i, &action) in actions.iter().enumerate().take(self.num_envs) {
            self.step_single_env(i, action);
        }

        StepResult {
            observations: &self.obs_buffer,
            rewards: &self.rewards,
            terminals: &self.terminals,
            truncations: &self.truncations,
            num_envs: self.num_envs,
            obs_size: OBS_SIZE,
        }
    }

    fn reset_envs(&mut self, mask: &ResetMask, seed: u64) {
        for idx in mask.iter_set() {
            self.reset_single(idx, seed.wrapping_add(idx as u64));
        }
    }

    fn write_observations(&self, buffer: &mut [f32]) {
        buffer[..self.obs_buffer.len()].copy_from_slice(&self.obs_buffer);
    }
}
