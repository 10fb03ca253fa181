//! PPO hyperparameters.

use serde::{Deserialize, Serialize};

use crate::error::{BaselinesError, Result};

/// Hyperparameters for [`PPO`](super::PPO).
///
/// Missing keys in a deserialized document fall back to the defaults, so a
/// TOML file only needs to list what it overrides:
///
/// ```toml
/// n_steps = 256
/// ent_coef = 0.01
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOConfig {
    /// Adam step size (default: 3e-4).
    pub learning_rate: f64,
    /// Linearly anneal the learning rate to zero over training (default: false).
    pub anneal_lr: bool,
    /// Rollout length per environment (default: 2048).
    pub n_steps: usize,
    /// Minibatch size (default: 64).
    pub batch_size: usize,
    /// Passes over each rollout (default: 10).
    pub n_epochs: usize,
    /// Discount factor (default: 0.99).
    pub gamma: f32,
    /// GAE λ (default: 0.95).
    pub gae_lambda: f32,
    /// Policy ratio clipping ε (default: 0.2).
    pub clip_range: f32,
    /// Value prediction clipping around the rollout values (default: None).
    pub clip_range_vf: Option<f32>,
    /// Normalize advantages per minibatch (default: true).
    pub normalize_advantage: bool,
    /// Entropy bonus coefficient (default: 0.0).
    pub ent_coef: f32,
    /// Value loss coefficient (default: 0.5).
    pub vf_coef: f32,
    /// Global gradient norm clip (default: 0.5).
    pub max_grad_norm: f32,
    /// Stop the epoch loop early once approx KL exceeds 1.5 × this (default: None).
    pub target_kl: Option<f32>,
    /// Hidden layer sizes for both actor and critic (default: [64, 64]).
    pub net_arch: Vec<usize>,
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            anneal_lr: false,
            n_steps: 2048,
            batch_size: 64,
            n_epochs: 10,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_range: 0.2,
            clip_range_vf: None,
            normalize_advantage: true,
            ent_coef: 0.0,
            vf_coef: 0.5,
            max_grad_norm: 0.5,
            target_kl: None,
            net_arch: vec![64, 64],
        }
    }
}

impl PPOConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_anneal_lr(mut self, anneal: bool) -> Self {
        self.anneal_lr = anneal;
        self
    }

    pub fn with_n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_gae_lambda(mut self, lambda: f32) -> Self {
        self.gae_lambda = lambda;
        self
    }

    pub fn with_clip_range(mut self, clip_range: f32) -> Self {
        self.clip_range = clip_range;
        self
    }

    /// Set value clipping (None to disable).
    pub fn with_clip_range_vf(mut self, clip_range_vf: Option<f32>) -> Self {
        self.clip_range_vf = clip_range_vf;
        self
    }

    pub fn with_normalize_advantage(mut self, normalize: bool) -> Self {
        self.normalize_advantage = normalize;
        self
    }

    pub fn with_ent_coef(mut self, ent_coef: f32) -> Self {
        self.ent_coef = ent_coef;
        self
    }

    pub fn with_vf_coef(mut self, vf_coef: f32) -> Self {
        self.vf_coef = vf_coef;
        self
    }

    pub fn with_max_grad_norm(mut self, max_grad_norm: f32) -> Self {
        self.max_grad_norm = max_grad_norm;
        self
    }

    pub fn with_target_kl(mut self, target_kl: Option<f32>) -> Self {
        self.target_kl = target_kl;
        self
    }

    pub fn with_net_arch(mut self, net_arch: Vec<usize>) -> Self {
        self.net_arch = net_arch;
        self
    }

    /// Reject settings that cannot train.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_steps", self.n_steps),
            ("batch_size", self.batch_size),
            ("n_epochs", self.n_epochs),
        ];
        for (param, value) in positive {
            if value == 0 {
                return Err(BaselinesError::invalid_config(param, "must be at least 1"));
            }
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(BaselinesError::invalid_config(
                "learning_rate",
                format!("must be finite and positive, got {}", self.learning_rate),
            ));
        }
        for (param, value) in [("gamma", self.gamma), ("gae_lambda", self.gae_lambda)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BaselinesError::invalid_config(
                    param,
                    format!("must lie in [0, 1], got {}", value),
                ));
            }
        }
        if !(self.clip_range > 0.0) {
            return Err(BaselinesError::invalid_config("clip_range", "must be positive"));
        }
        if matches!(self.clip_range_vf, Some(c) if !(c > 0.0)) {
            return Err(BaselinesError::invalid_config("clip_range_vf", "must be positive"));
        }
        if !(self.max_grad_norm > 0.0) {
            return Err(BaselinesError::invalid_config("max_grad_norm", "must be positive"));
        }
        if matches!(self.target_kl, Some(kl) if !(kl > 0.0)) {
            return Err(BaselinesError::invalid_config("target_kl", "must be positive"));
        }
        if self.net_arch.contains(&0) {
            return Err(BaselinesError::invalid_config("net_arch", "layer sizes must be at least 1"));
        }
        if self.normalize_advantage && self.batch_size == 1 {
            log::warn!("normalize_advantage with batch_size = 1 leaves advantages unnormalized");
        }
        Ok(())
    }
}
