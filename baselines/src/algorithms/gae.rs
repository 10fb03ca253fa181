//! Generalized Advantage Estimation.
//!
//! A_t^GAE(γ,λ) = Σ_{l=0}^{∞} (γλ)^l δ_{t+l}
//! where δ_t = r_t + γ V(s_{t+1}) - V(s_t)
//!
//! Schulman et al., "High-Dimensional Continuous Control Using
//! Generalized Advantage Estimation" (2016)

/// Compute GAE advantages and returns for a single trajectory.
///
/// # Arguments
///
/// * `rewards` - rewards received [T]
/// * `values` - value estimates V(s) [T]
/// * `dones` - episode end flags [T]; `dones[t]` cuts the bootstrap from step t+1
/// * `last_value` - V(s_T) for bootstrap
/// * `gamma` - discount factor
/// * `gae_lambda` - GAE λ parameter
///
/// # Returns
///
/// (advantages, returns) - both [T]
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_value: f32,
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert_eq!(values.len(), n);
    assert_eq!(dones.len(), n);

    let mut advantages = vec![0.0f32; n];
    let mut returns = vec![0.0f32; n];

    let mut gae = 0.0f32;
    let mut next_value = last_value;

    for t in (0..n).rev() {
        let not_done = if dones[t] { 0.0 } else { 1.0 };

        let delta = rewards[t] + gamma * next_value * not_done - values[t];
        gae = delta + gamma * gae_lambda * not_done * gae;

        advantages[t] = gae;
        returns[t] = gae + values[t];

        next_value = values[t];
    }

    (advantages, returns)
}

/// Compute GAE for vectorized environments.
///
/// Transitions are stored interleaved: [env0_t0, env1_t0, ..., env0_t1, env1_t1, ...]
pub fn compute_gae_vectorized(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_values: &[f32],
    n_envs: usize,
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let total_len = rewards.len();
    assert_eq!(values.len(), total_len);
    assert_eq!(dones.len(), total_len);
    assert_eq!(last_values.len(), n_envs);

    let rollout_len = total_len / n_envs;
    let mut advantages = vec![0.0f32; total_len];
    let mut returns = vec![0.0f32; total_len];

    let strided = |buf: &[f32], env_idx: usize| -> Vec<f32> {
        (0..rollout_len).map(|t| buf[t * n_envs + env_idx]).collect()
    };

    for env_idx in 0..n_envs {
        let env_dones: Vec<bool> = (0..rollout_len)
            .map(|t| dones[t * n_envs + env_idx])
            .collect();

        let (env_advantages, env_returns) = compute_gae(
            &strided(rewards, env_idx),
            &strided(values, env_idx),
            &env_dones,
            last_values[env_idx],
            gamma,
            gae_lambda,
        );

        for t in 0..rollout_len {
            advantages[t * n_envs + env_idx] = env_advantages[t];
            returns[t * n_envs + env_idx] = env_returns[t];
        }
    }

    (advantages, returns)
}

/// Normalize advantages to zero mean and unit variance.
///
/// Applied per minibatch. Slices of length 0 or 1 are left untouched, since
/// a single sample has no spread to normalize by.
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.len() < 2 {
        return;
    }

    let n = advantages.len() as f32;
    let mean = advantages.iter().sum::<f32>() / n;
    let variance = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n;
    let std = variance.sqrt() + 1e-8;

    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}

/// Fraction of the return variance explained by the value predictions.
///
/// `1 - Var[returns - values] / Var[returns]`. Returns NaN when the returns
/// have zero variance.
pub fn explained_variance(values: &[f32], returns: &[f32]) -> f32 {
    assert_eq!(values.len(), returns.len());
    if returns.is_empty() {
        return f32::NAN;
    }

    let var_returns = variance(returns);
    if var_returns == 0.0 {
        return f32::NAN;
    }
    let residuals: Vec<f32> = returns.iter().zip(values).map(|(r, v)| r - v).collect();
    1.0 - variance(&residuals) / var_returns
}

fn variance(xs: &[f32]) -> f32 {
    let n = xs.len() as f32;
    let mean = xs.iter().sum::<f32>() / n;
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n
}
