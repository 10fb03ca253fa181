//! Vectorized MountainCar (discrete actions).
//!
//! An under-powered car in a valley must rock back and forth to reach the
//! flag on the right hill. Observation: `[position, velocity]`. Actions:
//! `0` accelerate left, `1` coast, `2` accelerate right.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::env::{Environment, ResetMask, StepResult};
use crate::error::{EnvError, Result};

const GRAVITY: f32 = 0.0025;
const FORCE: f32 = 0.001;
const MIN_POSITION: f32 = -1.2;
const MAX_POSITION: f32 = 0.6;
const GOAL_POSITION: f32 = 0.5;
const MAX_SPEED: f32 = 0.07;

/// Observation size per environment.
pub const OBS_SIZE: usize = 2;
/// Number of discrete actions.
pub const N_ACTIONS: usize = 3;

/// Vectorized MountainCar with Struct-of-Arrays state.
pub struct MountainCar {
    id: String,
    position: Vec<f32>,
    velocity: Vec<f32>,
    rewards: Vec<f32>,
    terminals: Vec<u8>,
    truncations: Vec<u8>,
    ticks: Vec<u32>,
    num_envs: usize,
    max_steps: u32,
    obs_buffer: Vec<f32>,
}

impl MountainCar {
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
            position: vec![0.0; num_envs],
            velocity: vec![0.0; num_envs],
            rewards: vec![0.0; num_envs],
            terminals: vec![0; num_envs],
            truncations: vec![0; num_envs],
            ticks: vec![0; num_envs],
            num_envs,
            max_steps,
            obs_buffer: vec![0.0; num_envs * OBS_SIZE],
        })
    }

    fn reset_single(&mut self, idx: usize, seed: u64) {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        self.position[idx] = rng.gen_range(-0.6..-0.4);
        self.velocity[idx] = 0.0;
        self.ticks[idx] = 0;
        self.write_obs_single(idx);
    }

    #[inline]
    fn write_obs_single(&mut self, idx: usize) {
        self.obs_buffer[idx * OBS_SIZE] = self.position[idx];
        self.obs_buffer[idx * OBS_SIZE + 1] = self.velocity[idx];
    }

    fn step_single_env(&mut self, idx: usize, action: f32) {
        let force_direction = action.round().clamp(0.0, 2.0) - 1.0;
        let mut velocity = self.velocity[idx];
        let mut position = self.position[idx];

        velocity += force_direction * FORCE + (position * 3.0).cos() * (-GRAVITY);
        velocity = velocity.clamp(-MAX_SPEED, MAX_SPEED);
        position += velocity;
        position = position.clamp(MIN_POSITION, MAX_POSITION);

        // Inelastic collision with the left wall.
        if position == MIN_POSITION && velocity < 0.0 {
            velocity = 0.0;
        }

        self.position[idx] = position;
        self.velocity[idx] = velocity;
        self.ticks[idx] += 1;

        let terminal = position >= GOAL_POSITION;
        let truncated = !terminal && self.ticks[idx] >= self.max_steps;

        self.terminals[idx] = terminal as u8;
        self.truncations[idx] = truncated as u8;
        self.rewards[idx] = -1.0;

        self.write_obs_single(idx);
    }
}

impl Environment for MountainCar {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mountain_car_reset_range() {
        let mut env = MountainCar::new("MountainCar-v0", 8, 200).unwrap();
        env.reset(5);

        let mut obs = vec![0.0f32; 8 * OBS_SIZE];
        env.write_observations(&mut obs);
        for chunk in obs.chunks(OBS_SIZE) {
            assert!((-0.6..-0.4).contains(&chunk[0]));
            assert_eq!(chunk[1], 0.0);
        }
    }

    #[test]
    fn test_mountain_car_truncates_at_max_steps() {
        let mut env = MountainCar::new("MountainCar-v0", 2, 200).unwrap();
        env.reset(0);

        for step in 1..=200 {
            let result = env.step_no_reset(&[1.0, 1.0]);
            assert_eq!(result.rewards, &[-1.0, -1.0]);
            // Coasting never reaches the goal.
            assert!(!result.is_terminal(0));
            assert_eq!(result.is_truncated(0), step == 200);
        }
    }

    #[test]
    fn test_mountain_car_left_wall_stops_car() {
        let mut env = MountainCar::new("MountainCar-v0", 1, 1000).unwrap();
        env.reset(0);
        env.position[0] = MIN_POSITION;
        env.velocity[0] = -MAX_SPEED;

        env.step_no_reset(&[0.0]);

        assert_eq!(env.position[0], MIN_POSITION);
        assert_eq!(env.velocity[0], 0.0);
    }

    #[test]
    fn test_mountain_car_reaches_goal_with_energy_pumping() {
        let mut env = MountainCar::new("MountainCar-v0", 1, 1000).unwrap();
        env.reset(1);

        let mut reached = false;
        for _ in 0..1000 {
            // Push in the direction of motion.
            let action = if env.velocity[0] >= 0.0 { 2.0 } else { 0.0 };
            if env.step_no_reset(&[action]).is_terminal(0) {
                reached = true;
                break;
            }
        }
        assert!(reached);
    }
}
