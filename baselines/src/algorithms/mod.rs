//! Algorithm building blocks shared by the on-policy agents.

pub mod action_policy;
pub mod gae;
pub mod policy_loss;

pub use action_policy::{Categorical, DiscreteAction};
pub use gae::{compute_gae, compute_gae_vectorized, explained_variance, normalize_advantages};
pub use policy_loss::{
    approx_kl_scalar, clip_fraction_scalar, entropy_loss, ppo_clip_loss, value_loss,
};
