//! The experiment run: train, save, reload, evaluate, persist.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use baselines::{configure, evaluate_policy, make_vec_env, OutputFormat, VecEnv, PPO};
use burn::backend::{Autodiff, NdArray};

use crate::config::ExperimentConfig;
use crate::results::ResultsRecord;

/// Training backend: CPU ndarray with autodiff.
pub type TrainBackend = Autodiff<NdArray<f32>>;

/// Parallel environment replicas.
pub const N_ENVS: usize = 4;
/// Episodes run by the final evaluation.
pub const N_EVAL_EPISODES: usize = 100;

pub const MODEL_FILE: &str = "model";
pub const RESULTS_FILE: &str = "save.pkl";

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub exp_path: PathBuf,
    pub seed: u64,
    pub episode_returns: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

/// Run one experiment end to end.
///
/// Everything is written under `<exp_dir>/<exp_id>`: `log.txt`, `model` and
/// `save.pkl`, each replaced if already present. The summary line goes to
/// stdout only.
pub fn run(config: &ExperimentConfig) -> anyhow::Result<RunSummary> {
    config.validate()?;
    let hyperparams = config.load_hyperparams()?;
    let seed = config.seed.unwrap_or_else(rand::random);

    let exp_path = config.exp_path();
    fs::create_dir_all(&exp_path)
        .with_context(|| format!("creating experiment directory {}", exp_path.display()))?;

    let mut logger = configure(&exp_path, &[OutputFormat::Stdout, OutputFormat::Log])
        .context("configuring run logger")?;
    logger.log(format!("Starting Experiment: {}", config.exp_id))?;
    logger.log(format!("args: {:?}", config))?;
    log::info!("experiment {} (seed {})", exp_path.display(), seed);

    let env = make_vec_env(&config.env, N_ENVS, seed)
        .with_context(|| format!("building environment {}", config.env))?;
    let mut model = PPO::<TrainBackend, VecEnv>::new(&config.policy, env, hyperparams, seed)
        .with_context(|| format!("building {} agent", config.policy))?;
    model.set_logger(logger);

    model
        .learn(config.total_timesteps())
        .context("training agent")?;

    let model_path = exp_path.join(MODEL_FILE);
    model
        .save(&model_path)
        .with_context(|| format!("saving model to {}", model_path.display()))?;

    // Evaluate the reloaded checkpoint, not the in-memory agent.
    let mut logger = model
        .take_logger()
        .ok_or_else(|| anyhow!("run logger detached during training"))?;
    let env = model.into_env();
    let mut model = PPO::<TrainBackend, VecEnv>::load_with_seed(&model_path, env, seed)
        .with_context(|| format!("reloading model from {}", model_path.display()))?;

    let evaluation =
        evaluate_policy(&mut model, N_EVAL_EPISODES, true).context("evaluating agent")?;

    let record = ResultsRecord::new(evaluation.episode_rewards);
    let (mean, std) = (record.mean(), record.std());
    println!("mean return: {:.2} std return: {:.2}", mean, std);

    let results_path = exp_path.join(RESULTS_FILE);
    record
        .save(&results_path)
        .with_context(|| format!("writing results to {}", results_path.display()))?;

    logger.log("Experiment Complete!")?;
    logger.flush()?;

    Ok(RunSummary {
        exp_path,
        seed,
        episode_returns: record.eps_returns,
        mean,
        std,
    })
}
