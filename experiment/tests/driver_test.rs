//! End-to-end runs of the experiment driver.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use baselines::{evaluate_policy, make_vec_env, VecEnv, PPO};
use clap::Parser;
use ppo_experiment::driver::{TrainBackend, MODEL_FILE, N_EVAL_EPISODES, RESULTS_FILE};
use ppo_experiment::{run, ExperimentConfig, ResultsRecord};

/// Small enough for a debug-speed run: two 128-step rollouts.
const TINY_HYPERPARAMS: &str = "\
n_steps = 32
batch_size = 64
n_epochs = 2
net_arch = [16]
";

fn tiny_hyperparams(dir: &Path) -> PathBuf {
    let path = dir.join("tiny.toml");
    fs::write(&path, TINY_HYPERPARAMS).unwrap();
    path
}

fn config(args: &[&str]) -> ExperimentConfig {
    ExperimentConfig::try_parse_from(std::iter::once("ppo-experiment").chain(args.iter().copied()))
        .unwrap()
}

fn tiny_run_config(root: &Path, exp_id: &str) -> ExperimentConfig {
    let hyperparams = tiny_hyperparams(root);
    let exp_dir = root.join("exps");
    config(&[
        "--exp-dir", exp_dir.to_str().unwrap(),
        "--exp-id", exp_id,
        "--n-steps", "256",
        "--seed", "3",
        "--hyperparams", hyperparams.to_str().unwrap(),
    ])
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_run_writes_exactly_three_artifacts() {
    let root = tempfile::tempdir().unwrap();
    let summary = run(&tiny_run_config(root.path(), "exp1")).unwrap();

    let exp_path = root.path().join("exps").join("exp1");
    assert_eq!(summary.exp_path, exp_path);
    assert_eq!(file_names(&exp_path), vec!["log.txt", MODEL_FILE, RESULTS_FILE]);

    let record = ResultsRecord::load(&exp_path.join(RESULTS_FILE)).unwrap();
    assert_eq!(record.eps_returns.len(), N_EVAL_EPISODES);
    assert_eq!(record.eps_returns, summary.episode_returns);
}

#[test]
fn test_summary_stats_are_consistent() {
    let root = tempfile::tempdir().unwrap();
    let summary = run(&tiny_run_config(root.path(), "stats")).unwrap();

    let min = summary.episode_returns.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = summary.episode_returns.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert!(summary.std >= 0.0);
    assert!(min <= summary.mean && summary.mean <= max);
    // CartPole pays 1 per step, so every return is a whole episode length.
    assert!(summary
        .episode_returns
        .iter()
        .all(|r| *r >= 1.0 && *r <= 500.0 && r.fract() == 0.0));
}

#[test]
fn test_rerun_overwrites_artifacts() {
    let root = tempfile::tempdir().unwrap();
    let config = tiny_run_config(root.path(), "again");
    run(&config).unwrap();

    let exp_path = config.exp_path();
    fs::write(exp_path.join(RESULTS_FILE), b"stale").unwrap();
    fs::write(exp_path.join(MODEL_FILE), b"stale").unwrap();

    run(&config).unwrap();
    assert_eq!(file_names(&exp_path), vec!["log.txt", MODEL_FILE, RESULTS_FILE]);
    let record = ResultsRecord::load(&exp_path.join(RESULTS_FILE)).unwrap();
    assert_eq!(record.eps_returns.len(), N_EVAL_EPISODES);
    assert!(fs::metadata(exp_path.join(MODEL_FILE)).unwrap().len() > 5);
}

#[test]
fn test_log_starts_and_ends_with_markers() {
    let root = tempfile::tempdir().unwrap();
    let exp_dir = root.path().join("exps");
    let config = config(&[
        "--exp-dir", exp_dir.to_str().unwrap(),
        "--exp-id", "test1",
        "--n-steps", "1000",
        "--env", "CartPole-v1",
        "--seed", "0",
    ]);
    run(&config).unwrap();

    let log = fs::read_to_string(exp_dir.join("test1").join("log.txt")).unwrap();
    let lines: Vec<&str> = log.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.first(), Some(&"Starting Experiment: test1"));
    assert!(lines[1].starts_with("args: "));
    assert!(lines[1].contains("test1"));
    assert_eq!(lines.last(), Some(&"Experiment Complete!"));
    assert!(log.contains("time/total_timesteps"));
}

#[test]
fn test_reloaded_model_evaluates_deterministically() {
    let root = tempfile::tempdir().unwrap();
    let config = tiny_run_config(root.path(), "reload");
    run(&config).unwrap();
    let model_path = config.exp_path().join(MODEL_FILE);

    let evaluate = || {
        let env = make_vec_env("CartPole-v1", 4, 11).unwrap();
        let mut model = PPO::<TrainBackend, VecEnv>::load_with_seed(&model_path, env, 11).unwrap();
        assert_eq!(model.num_timesteps(), 256);
        evaluate_policy(&mut model, 10, true).unwrap()
    };
    assert_eq!(evaluate(), evaluate());
}

#[test]
fn test_unknown_environment_fails() {
    let root = tempfile::tempdir().unwrap();
    let exp_dir = root.path().join("exps");
    let config = config(&[
        "--exp-dir", exp_dir.to_str().unwrap(),
        "--exp-id", "bad",
        "--env", "NotAnEnv-v0",
    ]);

    let err = run(&config).unwrap_err();
    assert!(format!("{err:#}").contains("NotAnEnv-v0"));
    assert!(!config.exp_path().join(MODEL_FILE).exists());
}

#[test]
fn test_binary_missing_exp_id_creates_nothing() {
    let root = tempfile::tempdir().unwrap();
    let exp_dir = root.path().join("never");

    let output = Command::new(env!("CARGO_BIN_EXE_ppo-experiment"))
        .args(["--exp-dir", exp_dir.to_str().unwrap(), "--n-steps", "10"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--exp-id"));
    assert!(!exp_dir.exists());
}

#[test]
fn test_binary_runtime_error_exits_one() {
    let root = tempfile::tempdir().unwrap();
    let exp_dir = root.path().join("exps");

    let output = Command::new(env!("CARGO_BIN_EXE_ppo-experiment"))
        .args([
            "--exp-dir", exp_dir.to_str().unwrap(),
            "--exp-id", "x",
            "--policy", "CnnPolicy",
            "--log-level", "off",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("CnnPolicy"));
}
