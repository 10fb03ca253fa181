//! PPO agent.
//!
//! # Training loop
//!
//! ```text
//! while num_timesteps < total_timesteps:
//!     collect n_steps transitions from every replica (sampled actions)
//!     bootstrap truncated episodes:  r += γ·V(terminal_obs)
//!     GAE(γ, λ) over the rollout
//!     n_epochs × shuffled minibatches:
//!         clipped surrogate + vf_coef·value loss + ent_coef·entropy loss
//!         Adam step with per-parameter norm clipping
//!         stop early once approx_kl > 1.5·target_kl
//!     record + dump metrics
//! ```
//!
//! Rollouts run on the inner (non-autodiff) backend through
//! `AutodiffModule::valid`; only the update builds a graph.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use super::config::PPOConfig;
use super::rollout_storage::{
    extract_minibatch, generate_minibatches, ComputedValues, RolloutStorage,
};
use crate::algorithms::{
    approx_kl_scalar, clip_fraction_scalar, entropy_loss, explained_variance,
    normalize_advantages, ppo_clip_loss, value_loss, Categorical, DiscreteAction,
};
use crate::checkpoint::{
    decode_weights, encode_weights, AgentCheckpoint, CheckpointError, CHECKPOINT_VERSION,
};
use crate::environment::VectorizedEnv;
use crate::error::{BaselinesError, Result};
use crate::logger::{Logger, TrainingSnapshot};
use crate::policies::{MlpActorCritic, PolicyKind};
use crate::scheduling::{ConstantLR, LRScheduler, LinearDecay};

/// Window for the rollout/ep_*_mean statistics.
const EPISODE_WINDOW: usize = 100;

/// Returns and lengths of finished training episodes.
#[derive(Debug, Clone, Default)]
struct EpisodeTracker {
    running_returns: Vec<f64>,
    running_lengths: Vec<usize>,
    recent: VecDeque<(f64, usize)>,
}

impl EpisodeTracker {
    fn reset(&mut self, n_envs: usize) {
        self.running_returns = vec![0.0; n_envs];
        self.running_lengths = vec![0; n_envs];
    }

    fn update(&mut self, rewards: &[f32], dones: &[bool]) {
        for (i, (&reward, &done)) in rewards.iter().zip(dones).enumerate() {
            self.running_returns[i] += reward as f64;
            self.running_lengths[i] += 1;
            if done {
                if self.recent.len() == EPISODE_WINDOW {
                    self.recent.pop_front();
                }
                self.recent
                    .push_back((self.running_returns[i], self.running_lengths[i]));
                self.running_returns[i] = 0.0;
                self.running_lengths[i] = 0;
            }
        }
    }

    fn mean_return(&self) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }
        Some(self.recent.iter().map(|(r, _)| r).sum::<f64>() / self.recent.len() as f64)
    }

    fn mean_length(&self) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }
        Some(self.recent.iter().map(|(_, l)| *l as f64).sum::<f64>() / self.recent.len() as f64)
    }
}

/// Averages over one call to `train`.
#[derive(Debug, Clone, Default)]
struct TrainStats {
    policy_loss: f32,
    value_loss: f32,
    entropy_loss: f32,
    approx_kl: f32,
    clip_fraction: f32,
    /// Total loss of the last minibatch
    loss: f32,
    updates: usize,
}

impl TrainStats {
    fn finish(mut self) -> Self {
        let n = self.updates.max(1) as f32;
        self.policy_loss /= n;
        self.value_loss /= n;
        self.entropy_loss /= n;
        self.approx_kl /= n;
        self.clip_fraction /= n;
        self
    }
}

/// Proximal Policy Optimization over a vectorized discrete-action environment.
pub struct PPO<B: AutodiffBackend, E: VectorizedEnv> {
    model: MlpActorCritic<B>,
    config: PPOConfig,
    policy: PolicyKind,
    env: E,
    device: B::Device,
    rng: Xoshiro256StarStar,
    logger: Option<Logger>,
    num_timesteps: usize,
    n_updates: usize,
    iterations: usize,
    last_obs: Vec<f32>,
    episodes: EpisodeTracker,
}

impl<B: AutodiffBackend, E: VectorizedEnv> PPO<B, E> {
    /// Build an agent with freshly initialized weights.
    ///
    /// `seed` drives network init, action sampling, minibatch shuffling and
    /// environment reset seeds.
    pub fn new(policy_id: &str, env: E, config: PPOConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let policy = PolicyKind::from_id(policy_id)?;
        let device = B::Device::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);

        let model = MlpActorCritic::new(
            env.obs_size(),
            env.n_actions(),
            &config.net_arch,
            &device,
            &mut rng,
        );
        log::debug!(
            "PPO {} on {}: obs {}, actions {}, net {:?}",
            policy.id(),
            env.env_id(),
            env.obs_size(),
            env.n_actions(),
            config.net_arch
        );

        Ok(Self::assemble(model, config, policy, env, device, rng, 0))
    }

    fn assemble(
        model: MlpActorCritic<B>,
        config: PPOConfig,
        policy: PolicyKind,
        env: E,
        device: B::Device,
        rng: Xoshiro256StarStar,
        num_timesteps: usize,
    ) -> Self {
        let last_obs = env.get_observations();
        Self {
            model,
            config,
            policy,
            env,
            device,
            rng,
            logger: None,
            num_timesteps,
            n_updates: 0,
            iterations: 0,
            last_obs,
            episodes: EpisodeTracker::default(),
        }
    }

    /// Route training metrics through `logger`.
    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = Some(logger);
    }

    pub fn logger_mut(&mut self) -> Option<&mut Logger> {
        self.logger.as_mut()
    }

    pub fn take_logger(&mut self) -> Option<Logger> {
        self.logger.take()
    }

    pub fn config(&self) -> &PPOConfig {
        &self.config
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    pub fn model(&self) -> &MlpActorCritic<B> {
        &self.model
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn into_env(self) -> E {
        self.env
    }

    /// Environment steps taken by the last `learn` call (restored on load).
    pub fn num_timesteps(&self) -> usize {
        self.num_timesteps
    }

    /// Next seed from the agent's stream, for environment resets done
    /// outside `learn`.
    pub(crate) fn draw_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Train until `total_timesteps` environment steps have been collected.
    ///
    /// Rollouts are never cut short, so the final count rounds up to a whole
    /// number of `n_steps × n_envs` rollouts.
    pub fn learn(&mut self, total_timesteps: usize) -> Result<()> {
        if total_timesteps == 0 {
            log::debug!("learn(0): nothing to do");
            return Ok(());
        }

        let n_envs = self.env.n_envs();
        let rollout_size = self.config.n_steps * n_envs;
        let total_iterations = total_timesteps.div_ceil(rollout_size);
        let scheduler: Box<dyn LRScheduler> = if self.config.anneal_lr {
            Box::new(LinearDecay::new(self.config.learning_rate, 0.0, total_iterations))
        } else {
            Box::new(ConstantLR::new(self.config.learning_rate))
        };

        self.num_timesteps = 0;
        self.iterations = 0;
        let seed = self.draw_seed();
        self.env.reset_all(seed);
        self.last_obs = self.env.get_observations();
        self.episodes.reset(n_envs);

        let mut storage = RolloutStorage::new(n_envs, self.config.n_steps, self.env.obs_size());
        let mut optimizer = create_optimizer::<B>(self.config.max_grad_norm);
        let start = Instant::now();

        log::info!(
            "learning {} timesteps ({} iterations of {})",
            total_timesteps,
            total_iterations,
            rollout_size
        );

        while self.num_timesteps < total_timesteps {
            let last_values = self.collect_rollout(&mut storage);
            let computed = storage.compute_returns_and_advantages(
                &last_values,
                self.config.gamma,
                self.config.gae_lambda,
            );

            let lr = scheduler.get_lr(self.iterations);
            let stats = self.train(&mut optimizer, &storage, &computed, lr);
            self.iterations += 1;

            let elapsed = start.elapsed().as_secs_f64();
            let fps = if elapsed > 0.0 {
                self.num_timesteps as f64 / elapsed
            } else {
                0.0
            };
            let snapshot = TrainingSnapshot::new(self.iterations, self.num_timesteps)
                .with_fps(fps)
                .with_episodes(self.episodes.mean_return(), self.episodes.mean_length())
                .with_losses(stats.policy_loss, stats.value_loss, stats.entropy_loss, stats.loss)
                .with_clipping(stats.approx_kl, stats.clip_fraction, self.config.clip_range)
                .with_explained_variance(explained_variance(&storage.values, &computed.returns))
                .with_learning_rate(lr)
                .with_n_updates(self.n_updates);

            log::debug!(
                "iteration {}: {} steps, reward {:?}, kl {:.5}",
                self.iterations,
                self.num_timesteps,
                snapshot.ep_rew_mean,
                stats.approx_kl
            );

            if let Some(logger) = self.logger.as_mut() {
                logger.record_snapshot(&snapshot);
                logger.dump(self.num_timesteps)?;
            }
        }

        Ok(())
    }

    /// Fill `storage` with one rollout and return the bootstrap values of the
    /// observations that follow it.
    fn collect_rollout(&mut self, storage: &mut RolloutStorage) -> Vec<f32> {
        let policy = self.model.valid();
        let n_envs = self.env.n_envs();
        let obs_size = self.env.obs_size();
        let gamma = self.config.gamma;
        storage.clear();

        while !storage.is_full() {
            let obs = obs_tensor::<B::InnerBackend>(&self.last_obs, obs_size, &self.device);
            let (logits, values) = policy.forward(obs);
            let values: Vec<f32> = values.into_data().iter::<f32>().collect();
            let (actions, log_probs) = Categorical::new(logits).sample(&mut self.rng);

            let step = self.env.step(&actions);
            self.num_timesteps += n_envs;

            // Time-limit endings are not true terminals: fold the value of the
            // terminal observation into the reward.
            let mut rewards = step.rewards.clone();
            let truncated: Vec<usize> = (0..n_envs)
                .filter(|&i| step.truncations[i] && !step.terminals[i])
                .collect();
            if !truncated.is_empty() {
                let terminal_obs: Vec<f32> = truncated
                    .iter()
                    .flat_map(|&i| step.observations[i * obs_size..(i + 1) * obs_size].iter().copied())
                    .collect();
                let bootstrap = policy.values(obs_tensor::<B::InnerBackend>(
                    &terminal_obs,
                    obs_size,
                    &self.device,
                ));
                for (&i, v) in truncated.iter().zip(bootstrap.into_data().iter::<f32>()) {
                    rewards[i] += gamma * v;
                }
            }

            let dones = step.dones();
            self.episodes.update(&step.rewards, &dones);
            storage.push_step(&self.last_obs, &actions, &rewards, &dones, &values, &log_probs);

            self.env.reset_envs(&step.done_indices());
            self.env.write_observations(&mut self.last_obs);
        }

        let last = obs_tensor::<B::InnerBackend>(&self.last_obs, obs_size, &self.device);
        policy.values(last).into_data().iter::<f32>().collect()
    }

    /// Run the epoch/minibatch updates for one rollout.
    fn train<O>(
        &mut self,
        optimizer: &mut O,
        storage: &RolloutStorage,
        computed: &ComputedValues,
        lr: f64,
    ) -> TrainStats
    where
        O: Optimizer<MlpActorCritic<B>, B>,
    {
        let config = self.config.clone();
        let device = self.device.clone();
        let mut stats = TrainStats::default();
        let mut continue_training = true;

        for epoch in 0..config.n_epochs {
            let minibatches = generate_minibatches(storage.len(), config.batch_size, &mut self.rng);

            for mb_indices in minibatches {
                let mut mb = extract_minibatch(storage, computed, &mb_indices);
                if config.normalize_advantage {
                    normalize_advantages(&mut mb.advantages);
                }

                let (logits, values) = self.model.forward(mb.states_tensor::<B>(&device));
                let dist = Categorical::new(logits);
                let log_probs = dist.log_prob(&mb.actions, &device);
                let entropy = dist.entropy();

                let host_log_probs: Vec<f32> = log_probs.clone().into_data().iter::<f32>().collect();
                let approx_kl = approx_kl_scalar(&host_log_probs, &mb.old_log_probs);
                stats.approx_kl += approx_kl;
                stats.clip_fraction +=
                    clip_fraction_scalar(&host_log_probs, &mb.old_log_probs, config.clip_range);

                let pg_loss = ppo_clip_loss(
                    log_probs,
                    mb.old_log_probs_tensor::<B>(&device),
                    mb.advantages_tensor::<B>(&device),
                    config.clip_range,
                );
                let v_loss = value_loss(
                    values,
                    mb.old_values_tensor::<B>(&device),
                    mb.returns_tensor::<B>(&device),
                    config.clip_range_vf,
                );
                let ent_loss = entropy_loss(entropy);

                stats.policy_loss += scalar(&pg_loss);
                stats.value_loss += scalar(&v_loss);
                stats.entropy_loss += scalar(&ent_loss);
                stats.updates += 1;

                if let Some(target_kl) = config.target_kl {
                    if approx_kl > 1.5 * target_kl {
                        log::debug!(
                            "early stop at epoch {}: approx_kl {:.4} > 1.5 × {}",
                            epoch,
                            approx_kl,
                            target_kl
                        );
                        continue_training = false;
                        break;
                    }
                }

                let loss = pg_loss
                    + ent_loss.mul_scalar(config.ent_coef)
                    + v_loss.mul_scalar(config.vf_coef);
                stats.loss = scalar(&loss);

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &self.model);
                self.model = optimizer.step(lr, self.model.clone(), grads);
            }

            self.n_updates += 1;
            if !continue_training {
                break;
            }
        }

        stats.finish()
    }

    /// Choose one action per observation row.
    ///
    /// `observations` is a flat `[n * obs_size]` buffer. With
    /// `deterministic` the most likely action is taken, otherwise one is
    /// sampled.
    pub fn predict(&mut self, observations: &[f32], deterministic: bool) -> Result<Vec<DiscreteAction>> {
        let obs_size = self.env.obs_size();
        if observations.is_empty() || observations.len() % obs_size != 0 {
            return Err(BaselinesError::invalid_config(
                "observations",
                format!(
                    "expected a non-empty multiple of {} values, got {}",
                    obs_size,
                    observations.len()
                ),
            ));
        }

        let policy = self.model.valid();
        let (logits, _) = policy.forward(obs_tensor::<B::InnerBackend>(observations, obs_size, &self.device));
        let dist = Categorical::new(logits);
        let (actions, _) = if deterministic {
            dist.mode()
        } else {
            dist.sample(&mut self.rng)
        };
        Ok(actions)
    }

    /// Write a single-file checkpoint at exactly `path`, replacing any
    /// existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let checkpoint = AgentCheckpoint {
            version: CHECKPOINT_VERSION,
            env_id: self.env.env_id().to_string(),
            policy_id: self.policy.id().to_string(),
            obs_size: self.env.obs_size(),
            n_actions: self.env.n_actions(),
            num_timesteps: self.num_timesteps,
            config: self.config.clone(),
            weights: encode_weights(&self.model)?,
        };
        checkpoint.save(path)?;
        log::info!("saved model to {}", path.display());
        Ok(path.to_path_buf())
    }

    /// Restore an agent saved with [`PPO::save`], attached to `env`.
    pub fn load(path: impl AsRef<Path>, env: E) -> Result<Self> {
        Self::load_with_seed(path, env, 0)
    }

    /// [`PPO::load`] with an explicit seed for the restored agent's
    /// sampling and reset stream.
    pub fn load_with_seed(path: impl AsRef<Path>, env: E, seed: u64) -> Result<Self> {
        let path = path.as_ref();
        let checkpoint = AgentCheckpoint::load(path)?;

        if checkpoint.obs_size != env.obs_size() || checkpoint.n_actions != env.n_actions() {
            return Err(CheckpointError::Incompatible(format!(
                "saved for observations of {} and {} actions, environment {} has {} and {}",
                checkpoint.obs_size,
                checkpoint.n_actions,
                env.env_id(),
                env.obs_size(),
                env.n_actions()
            ))
            .into());
        }
        if checkpoint.env_id != env.env_id() {
            log::warn!(
                "model trained on {} loaded into {}",
                checkpoint.env_id,
                env.env_id()
            );
        }

        let policy = PolicyKind::from_id(&checkpoint.policy_id)?;
        checkpoint.config.validate()?;

        let device = B::Device::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let template = MlpActorCritic::new(
            checkpoint.obs_size,
            checkpoint.n_actions,
            &checkpoint.config.net_arch,
            &device,
            &mut rng,
        );
        let model = decode_weights(template, checkpoint.weights, &device)?;
        log::info!("loaded model from {}", path.display());

        Ok(Self::assemble(
            model,
            checkpoint.config,
            policy,
            env,
            device,
            rng,
            checkpoint.num_timesteps,
        ))
    }
}

fn create_optimizer<B: AutodiffBackend>(max_grad_norm: f32) -> impl Optimizer<MlpActorCritic<B>, B> {
    AdamConfig::new()
        .with_epsilon(1e-5)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(max_grad_norm)))
        .init()
}

fn obs_tensor<B: Backend>(obs: &[f32], obs_size: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(obs, device).reshape([obs.len() / obs_size, obs_size])
}

fn scalar<B: Backend>(tensor: &Tensor<B, 1>) -> f32 {
    tensor.clone().into_scalar().elem::<f32>()
}
