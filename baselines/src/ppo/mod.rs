//! Proximal Policy Optimization.

pub mod agent;
pub mod config;
pub mod rollout_storage;

pub use agent::PPO;
pub use config::PPOConfig;
pub use rollout_storage::{
    extract_minibatch, generate_minibatches, ComputedValues, MinibatchData, MinibatchIndices,
    RolloutStorage,
};
