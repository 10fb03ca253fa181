//! Command-line configuration.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use baselines::PPOConfig;
use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Verbosity of the stderr diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// PPO Experiment
#[derive(Debug, Clone, Parser)]
#[command(name = "ppo-experiment")]
#[command(about = "Train a PPO agent, save it, reload it and evaluate it over 100 episodes")]
#[command(version)]
pub struct ExperimentConfig {
    /// experiment directory
    #[arg(long, default_value = "exp_dir/ppo/cartpole")]
    pub exp_dir: PathBuf,

    /// experiment id
    #[arg(long)]
    pub exp_id: String,

    /// total timesteps for training (fractional values are truncated)
    #[arg(long, default_value_t = 1e6)]
    pub n_steps: f64,

    /// environment id
    #[arg(long, default_value = "CartPole-v1")]
    pub env: String,

    /// policy architecture
    #[arg(long, default_value = "MlpPolicy")]
    pub policy: String,

    /// seed for network init, sampling and environment resets (random if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// TOML file overriding PPO hyperparameters
    #[arg(long)]
    pub hyperparams: Option<PathBuf>,

    /// stderr diagnostics level
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,
}

/// Invalid command-line configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// `--n-steps` is negative, infinite or NaN.
    InvalidSteps(f64),
    /// `--exp-id` is empty.
    EmptyExpId,
    /// The hyperparameter file could not be read.
    HyperparamsIo { path: PathBuf, source: io::Error },
    /// The hyperparameter file is not valid PPO configuration.
    HyperparamsParse { path: PathBuf, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSteps(n) => {
                write!(f, "--n-steps must be finite and non-negative, got {}", n)
            }
            ConfigError::EmptyExpId => write!(f, "--exp-id must not be empty"),
            ConfigError::HyperparamsIo { path, source } => {
                write!(f, "cannot read hyperparameters {}: {}", path.display(), source)
            }
            ConfigError::HyperparamsParse { path, message } => {
                write!(f, "invalid hyperparameters in {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::HyperparamsIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ExperimentConfig {
    /// Check everything that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.n_steps.is_finite() || self.n_steps < 0.0 {
            return Err(ConfigError::InvalidSteps(self.n_steps));
        }
        if self.exp_id.is_empty() {
            return Err(ConfigError::EmptyExpId);
        }
        Ok(())
    }

    /// Training budget: `n_steps` truncated toward zero.
    pub fn total_timesteps(&self) -> usize {
        self.n_steps.trunc() as usize
    }

    /// `<exp_dir>/<exp_id>`
    pub fn exp_path(&self) -> PathBuf {
        self.exp_dir.join(&self.exp_id)
    }

    /// PPO hyperparameters: defaults, overridden by the `--hyperparams` file
    /// if given.
    pub fn load_hyperparams(&self) -> Result<PPOConfig, ConfigError> {
        match &self.hyperparams {
            Some(path) => read_hyperparams(path),
            None => Ok(PPOConfig::default()),
        }
    }
}

fn read_hyperparams(path: &Path) -> Result<PPOConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::HyperparamsIo {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::HyperparamsParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
