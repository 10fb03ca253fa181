//! PPO loss terms.
//!
//! Tensor versions carry gradients for the update step; scalar versions are
//! used for logging diagnostics computed from detached values.
//!
//! # Numerical Stability
//!
//! Importance ratios are computed as exp(log_ratio) with the log ratio clamped
//! to [-20, 20].

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

const MAX_LOG_RATIO: f32 = 20.0;

/// PPO clipped surrogate loss (tensor computation for gradient).
///
/// L^CLIP(θ) = -E[min(r_t(θ) * A_t, clip(r_t(θ), 1-ε, 1+ε) * A_t)]
///
/// # Arguments
///
/// * `log_probs` - Current policy log probs: [batch_size]
/// * `old_log_probs` - Rollout log probs (detached): [batch_size]
/// * `advantages` - Advantages (detached): [batch_size]
/// * `clip_range` - Clipping ratio ε
pub fn ppo_clip_loss<B: Backend>(
    log_probs: Tensor<B, 1>,
    old_log_probs: Tensor<B, 1>,
    advantages: Tensor<B, 1>,
    clip_range: f32,
) -> Tensor<B, 1> {
    let log_ratio = log_probs - old_log_probs;
    let ratio = log_ratio.clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO).exp();
    let clipped_ratio = ratio.clone().clamp(1.0 - clip_range, 1.0 + clip_range);

    let surr1 = ratio * advantages.clone();
    let surr2 = clipped_ratio * advantages;

    -surr1.min_pair(surr2).mean()
}

/// Value function loss.
///
/// With `clip_range_vf`, predictions are kept within ±clip of the rollout
/// values before the squared error is taken.
pub fn value_loss<B: Backend>(
    values: Tensor<B, 1>,
    old_values: Tensor<B, 1>,
    returns: Tensor<B, 1>,
    clip_range_vf: Option<f32>,
) -> Tensor<B, 1> {
    let values = match clip_range_vf {
        Some(clip) => old_values.clone() + (values - old_values).clamp(-clip, clip),
        None => values,
    };
    (returns - values).powf_scalar(2.0).mean()
}

/// Negative mean entropy, so adding it to the loss with a positive
/// coefficient rewards exploration.
pub fn entropy_loss<B: Backend>(entropy: Tensor<B, 1>) -> Tensor<B, 1> {
    -entropy.mean()
}

/// Low-variance estimate of KL(old || new): E[(r - 1) - log r].
pub fn approx_kl_scalar(log_probs: &[f32], old_log_probs: &[f32]) -> f32 {
    assert_eq!(log_probs.len(), old_log_probs.len());
    if log_probs.is_empty() {
        return 0.0;
    }

    // f64: for near-identical policies exp(x) - 1 - x is below f32 resolution.
    let total: f64 = log_probs
        .iter()
        .zip(old_log_probs)
        .map(|(&lp, &old)| {
            let log_ratio = ((lp - old) as f64).clamp(-MAX_LOG_RATIO as f64, MAX_LOG_RATIO as f64);
            log_ratio.exp_m1() - log_ratio
        })
        .sum();

    (total / log_probs.len() as f64) as f32
}

/// Fraction of samples whose ratio fell outside [1-ε, 1+ε].
pub fn clip_fraction_scalar(log_probs: &[f32], old_log_probs: &[f32], clip_range: f32) -> f32 {
    assert_eq!(log_probs.len(), old_log_probs.len());
    if log_probs.is_empty() {
        return 0.0;
    }

    let clipped = log_probs
        .iter()
        .zip(old_log_probs)
        .filter(|(lp, old)| (safe_ratio(*lp - *old) - 1.0).abs() > clip_range)
        .count();

    clipped as f32 / log_probs.len() as f32
}

#[inline]
fn safe_ratio(log_ratio: f32) -> f32 {
    if log_ratio.is_finite() {
        log_ratio.clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO).exp()
    } else {
        1.0
    }
}
