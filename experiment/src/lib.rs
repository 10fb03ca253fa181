//! PPO experiment runner.
//!
//! Parses the command line into an [`ExperimentConfig`], then [`run`]s the
//! fixed sequence: prepare `<exp_dir>/<exp_id>`, train PPO on four replicas
//! of the chosen environment, save the agent, reload it, evaluate it over
//! 100 episodes and pickle the per-episode returns.

pub mod config;
pub mod driver;
pub mod logging;
pub mod results;

pub use config::{ConfigError, ExperimentConfig, LogLevel};
pub use driver::{run, RunSummary};
pub use results::ResultsRecord;
