//! Stderr diagnostics.
//!
//! Library crates emit through the `log` facade; the binary routes those
//! records to stderr so they never mix with the run log or the stdout
//! summary line.

use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

const STDERR_APPENDER: &str = "stderr";
const PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l})} {M}] {m}{n}";

/// log4rs configuration with a single stderr console appender.
pub fn diagnostics_config(level: LevelFilter) -> anyhow::Result<Config> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build(STDERR_APPENDER, Box::new(stderr)))
        .build(Root::builder().appender(STDERR_APPENDER).build(level))?;
    Ok(config)
}

/// Install the stderr logger. Fails if a logger is already installed.
pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    log4rs::init_config(diagnostics_config(level)?)?;
    Ok(())
}
