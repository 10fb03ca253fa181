use std::process::ExitCode;

use clap::Parser;
use ppo_experiment::{logging, run, ExperimentConfig};

fn main() -> ExitCode {
    // Usage errors exit with code 2 here, before anything touches the disk.
    let config = ExperimentConfig::parse();

    if let Err(e) = logging::init(config.log_level.into()) {
        eprintln!("warning: diagnostics disabled: {e:#}");
    }

    match run(&config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}
