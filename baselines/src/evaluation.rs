//! Policy evaluation.

use burn::tensor::backend::AutodiffBackend;

use crate::environment::VectorizedEnv;
use crate::error::{BaselinesError, Result};
use crate::ppo::PPO;

/// Per-episode outcomes of an evaluation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationResult {
    /// Undiscounted return of each episode, in completion order
    pub episode_rewards: Vec<f64>,
    pub episode_lengths: Vec<usize>,
}

impl EvaluationResult {
    pub fn len(&self) -> usize {
        self.episode_rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episode_rewards.is_empty()
    }

    pub fn mean_reward(&self) -> f64 {
        mean(&self.episode_rewards)
    }

    /// Population standard deviation of the episode returns.
    pub fn std_reward(&self) -> f64 {
        std(&self.episode_rewards)
    }
}

/// Run the agent for `n_eval_episodes` complete episodes on its own
/// environment.
///
/// Every replica is reset first. Replica `i` contributes at most
/// `(n_eval_episodes + i) / n_envs` episodes, so the result holds exactly
/// `n_eval_episodes` entries regardless of which replicas finish first.
pub fn evaluate_policy<B: AutodiffBackend, E: VectorizedEnv>(
    model: &mut PPO<B, E>,
    n_eval_episodes: usize,
    deterministic: bool,
) -> Result<EvaluationResult> {
    if n_eval_episodes == 0 {
        return Err(BaselinesError::invalid_config(
            "n_eval_episodes",
            "must be at least 1",
        ));
    }

    let n_envs = model.env().n_envs();
    let targets: Vec<usize> = (0..n_envs).map(|i| (n_eval_episodes + i) / n_envs).collect();
    let mut counts = vec![0usize; n_envs];
    let mut current_rewards = vec![0.0f64; n_envs];
    let mut current_lengths = vec![0usize; n_envs];
    let mut result = EvaluationResult {
        episode_rewards: Vec::with_capacity(n_eval_episodes),
        episode_lengths: Vec::with_capacity(n_eval_episodes),
    };

    let seed = model.draw_seed();
    model.env_mut().reset_all(seed);
    let mut observations = model.env().get_observations();

    while counts.iter().zip(&targets).any(|(c, t)| c < t) {
        let actions = model.predict(&observations, deterministic)?;
        let step = model.env_mut().step(&actions);
        let dones = step.dones();

        for i in 0..n_envs {
            current_rewards[i] += step.rewards[i] as f64;
            current_lengths[i] += 1;
            if dones[i] {
                if counts[i] < targets[i] {
                    result.episode_rewards.push(current_rewards[i]);
                    result.episode_lengths.push(current_lengths[i]);
                    counts[i] += 1;
                }
                current_rewards[i] = 0.0;
                current_lengths[i] = 0;
            }
        }

        model.env_mut().reset_envs(&step.done_indices());
        model.env().write_observations(&mut observations);
    }

    log::info!(
        "evaluated {} episodes: mean {:.2}, std {:.2}",
        result.len(),
        result.mean_reward(),
        result.std_reward()
    );
    Ok(result)
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn std(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}
