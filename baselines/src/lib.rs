//! # Baselines: PPO on vectorized classic-control environments
//!
//! Single-process on-policy training with burn.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  make_vec_env("CartPole-v1", 4, seed) ──► VecEnv          │
//! │                                            │              │
//! │  PPO::new("MlpPolicy", env, config, seed)  ▼              │
//! │  ┌────────────┐   rollout   ┌─────────────────┐          │
//! │  │MlpActor    │◄───────────►│ RolloutStorage  │          │
//! │  │Critic      │   update    │ + GAE           │          │
//! │  └─────┬──────┘             └─────────────────┘          │
//! │        │ save / load (AgentCheckpoint)                    │
//! │        ▼                                                  │
//! │  evaluate_policy ──► EvaluationResult                     │
//! │  Logger (stdout, log.txt, progress.csv)                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use baselines::{evaluate_policy, make_vec_env, PPOConfig, PPO};
//! use burn::backend::{Autodiff, NdArray};
//!
//! let env = make_vec_env("CartPole-v1", 4, 0)?;
//! let mut model = PPO::<Autodiff<NdArray>, _>::new("MlpPolicy", env, PPOConfig::new(), 0)?;
//! model.learn(100_000)?;
//! model.save("model")?;
//! let result = evaluate_policy(&mut model, 100, true)?;
//! println!("{:.2} ± {:.2}", result.mean_reward(), result.std_reward());
//! ```

pub mod algorithms;
pub mod checkpoint;
pub mod environment;
pub mod error;
pub mod evaluation;
pub mod logger;
pub mod nn;
pub mod policies;
pub mod ppo;
pub mod scheduling;

// Re-export commonly used types
pub use checkpoint::{AgentCheckpoint, CheckpointError};
pub use environment::{make_vec_env, StepResult, VecEnv, VectorizedEnv};
pub use error::{BaselinesError, Result};
pub use evaluation::{evaluate_policy, EvaluationResult};
pub use logger::{configure, Logger, OutputFormat, TrainingSnapshot};
pub use policies::{MlpActorCritic, PolicyKind};
pub use ppo::{PPOConfig, PPO};
