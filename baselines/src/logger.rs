//! Run logger.
//!
//! A [`Logger`] fans out to one or more sinks chosen by [`OutputFormat`]:
//! human-readable text on stdout or in `log.txt`, and a `progress.csv` table.
//! Free-form messages go to the text sinks only. Scalar metrics are
//! accumulated with [`Logger::record`] and written together by
//! [`Logger::dump`].

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{BaselinesError, Result};

/// Where a logger writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Stdout,
    /// `log.txt` in the log folder
    Log,
    /// `progress.csv` in the log folder
    Csv,
}

impl FromStr for OutputFormat {
    type Err = BaselinesError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdout" => Ok(OutputFormat::Stdout),
            "log" => Ok(OutputFormat::Log),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(BaselinesError::invalid_config(
                "format",
                format!("unknown output format '{}' (expected stdout, log or csv)", other),
            )),
        }
    }
}

/// Typed view of one training iteration.
#[derive(Debug, Clone, Default)]
pub struct TrainingSnapshot {
    /// Completed rollout/update iterations.
    pub iteration: usize,
    /// Total environment steps.
    pub total_timesteps: usize,
    /// Environment steps per second since `learn` started.
    pub fps: f64,
    /// Mean return over recent episodes, if any finished.
    pub ep_rew_mean: Option<f64>,
    /// Mean length over recent episodes, if any finished.
    pub ep_len_mean: Option<f64>,
    pub policy_loss: f32,
    pub value_loss: f32,
    pub entropy_loss: f32,
    pub loss: f32,
    pub approx_kl: f32,
    pub clip_fraction: f32,
    pub clip_range: f32,
    pub explained_variance: f32,
    pub learning_rate: f64,
    /// Gradient steps taken so far.
    pub n_updates: usize,
}

impl TrainingSnapshot {
    pub fn new(iteration: usize, total_timesteps: usize) -> Self {
        Self {
            iteration,
            total_timesteps,
            ..Default::default()
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    /// Set episode statistics.
    pub fn with_episodes(mut self, ep_rew_mean: Option<f64>, ep_len_mean: Option<f64>) -> Self {
        self.ep_rew_mean = ep_rew_mean;
        self.ep_len_mean = ep_len_mean;
        self
    }

    /// Set loss values.
    pub fn with_losses(mut self, policy_loss: f32, value_loss: f32, entropy_loss: f32, loss: f32) -> Self {
        self.policy_loss = policy_loss;
        self.value_loss = value_loss;
        self.entropy_loss = entropy_loss;
        self.loss = loss;
        self
    }

    /// Set clipping diagnostics.
    pub fn with_clipping(mut self, approx_kl: f32, clip_fraction: f32, clip_range: f32) -> Self {
        self.approx_kl = approx_kl;
        self.clip_fraction = clip_fraction;
        self.clip_range = clip_range;
        self
    }

    pub fn with_explained_variance(mut self, explained_variance: f32) -> Self {
        self.explained_variance = explained_variance;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_n_updates(mut self, n_updates: usize) -> Self {
        self.n_updates = n_updates;
        self
    }
}

/// Backend for a logger.
trait OutputSink: Send {
    fn write_message(&mut self, message: &str) -> io::Result<()>;

    fn write_values(&mut self, values: &BTreeMap<String, f64>, step: usize) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Human-readable key/value table.
struct HumanOutput {
    writer: Box<dyn Write + Send>,
}

impl HumanOutput {
    fn stdout() -> Self {
        Self {
            writer: Box::new(io::stdout()),
        }
    }

    fn file(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: Box::new(BufWriter::new(File::create(path)?)),
        })
    }
}

impl OutputSink for HumanOutput {
    fn write_message(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", message)
    }

    fn write_values(&mut self, values: &BTreeMap<String, f64>, _step: usize) -> io::Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        for line in format_table(values) {
            writeln!(self.writer, "{}", line)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// CSV table. The header is fixed by the first dump; later keys outside it
/// are skipped and missing ones are left empty.
struct CsvOutput {
    writer: BufWriter<File>,
    header: Option<Vec<String>>,
}

impl CsvOutput {
    fn new(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            header: None,
        })
    }
}

impl OutputSink for CsvOutput {
    fn write_message(&mut self, _message: &str) -> io::Result<()> {
        Ok(())
    }

    fn write_values(&mut self, values: &BTreeMap<String, f64>, _step: usize) -> io::Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        if self.header.is_none() {
            let keys: Vec<String> = values.keys().cloned().collect();
            writeln!(self.writer, "{}", keys.join(","))?;
            self.header = Some(keys);
        }
        let Some(header) = &self.header else {
            return Ok(());
        };

        let skipped = values.keys().filter(|k| !header.contains(k)).count();
        if skipped > 0 {
            log::debug!("progress.csv: {} key(s) not in header skipped", skipped);
        }

        let row: Vec<String> = header
            .iter()
            .map(|key| values.get(key).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writeln!(self.writer, "{}", row.join(","))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Logger over a set of sinks.
pub struct Logger {
    sinks: Vec<Box<dyn OutputSink>>,
    values: BTreeMap<String, f64>,
}

impl Logger {
    /// Write a message line to every text sink.
    pub fn log(&mut self, message: impl AsRef<str>) -> Result<()> {
        for sink in &mut self.sinks {
            sink.write_message(message.as_ref())?;
            sink.flush()?;
        }
        Ok(())
    }

    /// Record a scalar for the next dump, replacing any earlier value.
    pub fn record(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    /// Record every field of a training snapshot.
    pub fn record_snapshot(&mut self, snapshot: &TrainingSnapshot) {
        if let Some(rew) = snapshot.ep_rew_mean {
            self.record("rollout/ep_rew_mean", rew);
        }
        if let Some(len) = snapshot.ep_len_mean {
            self.record("rollout/ep_len_mean", len);
        }
        self.record("time/iterations", snapshot.iteration as f64);
        self.record("time/total_timesteps", snapshot.total_timesteps as f64);
        self.record("time/fps", snapshot.fps.floor());
        self.record("train/policy_gradient_loss", snapshot.policy_loss as f64);
        self.record("train/value_loss", snapshot.value_loss as f64);
        self.record("train/entropy_loss", snapshot.entropy_loss as f64);
        self.record("train/loss", snapshot.loss as f64);
        self.record("train/approx_kl", snapshot.approx_kl as f64);
        self.record("train/clip_fraction", snapshot.clip_fraction as f64);
        self.record("train/clip_range", snapshot.clip_range as f64);
        self.record("train/explained_variance", snapshot.explained_variance as f64);
        self.record("train/learning_rate", snapshot.learning_rate);
        self.record("train/n_updates", snapshot.n_updates as f64);
    }

    /// Values recorded since the last dump.
    pub fn pending(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    /// Write all recorded values to every sink and clear them.
    pub fn dump(&mut self, step: usize) -> Result<()> {
        for sink in &mut self.sinks {
            sink.write_values(&self.values, step)?;
            sink.flush()?;
        }
        self.values.clear();
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        for sink in &mut self.sinks {
            let _ = sink.flush();
        }
    }
}

/// Create `folder` and a logger writing to the given formats.
pub fn configure(folder: impl AsRef<Path>, formats: &[OutputFormat]) -> Result<Logger> {
    let folder = folder.as_ref().to_path_buf();
    fs::create_dir_all(&folder)?;

    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::with_capacity(formats.len());
    for format in formats {
        let sink: Box<dyn OutputSink> = match format {
            OutputFormat::Stdout => Box::new(HumanOutput::stdout()),
            OutputFormat::Log => Box::new(HumanOutput::file(&folder.join("log.txt"))?),
            OutputFormat::Csv => Box::new(CsvOutput::new(&folder.join("progress.csv"))?),
        };
        sinks.push(sink);
    }
    log::debug!("logging to {} ({:?})", folder.display(), formats);

    Ok(Logger {
        sinks,
        values: BTreeMap::new(),
    })
}

fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else if value != 0.0 && (value.abs() >= 1e4 || value.abs() < 1e-3) {
        format!("{:.3e}", value)
    } else {
        format!("{:.4}", value)
    }
}

/// Render values as a bordered two-column table, one row per key.
fn format_table(values: &BTreeMap<String, f64>) -> Vec<String> {
    let rows: Vec<(String, String)> = values
        .iter()
        .map(|(k, v)| (k.clone(), format_value(*v)))
        .collect();
    let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let val_width = rows.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    let border = "-".repeat(key_width + val_width + 7);

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(border.clone());
    for (key, value) in rows {
        lines.push(format!(
            "| {:<kw$} | {:<vw$} |",
            key,
            value,
            kw = key_width,
            vw = val_width
        ));
    }
    lines.push(border);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("stdout".parse::<OutputFormat>().unwrap(), OutputFormat::Stdout);
        assert_eq!("log".parse::<OutputFormat>().unwrap(), OutputFormat::Log);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("tensorboard".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_configure_creates_folder_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("a").join("b");
        let _logger = configure(&folder, &[OutputFormat::Log, OutputFormat::Csv]).unwrap();

        assert!(folder.join("log.txt").is_file());
        assert!(folder.join("progress.csv").is_file());
    }

    #[test]
    fn test_messages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = configure(dir.path(), &[OutputFormat::Log]).unwrap();
        logger.log("first").unwrap();
        logger.log("second").unwrap();
        drop(logger);

        let text = fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_dump_writes_sorted_table_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = configure(dir.path(), &[OutputFormat::Log]).unwrap();
        logger.record("train/value_loss", 0.25);
        logger.record("rollout/ep_rew_mean", 21.0);
        logger.dump(100).unwrap();
        assert!(logger.pending().is_empty());
        drop(logger);

        let text = fs::read_to_string(dir.path().join("log.txt")).unwrap();
        let rollout = text.find("rollout/ep_rew_mean").unwrap();
        let train = text.find("train/value_loss").unwrap();
        assert!(rollout < train);
        assert!(text.contains("| 21 "));
        assert!(text.contains("0.2500"));
    }

    #[test]
    fn test_empty_dump_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = configure(dir.path(), &[OutputFormat::Log, OutputFormat::Csv]).unwrap();
        logger.dump(0).unwrap();
        drop(logger);

        assert!(fs::read_to_string(dir.path().join("log.txt")).unwrap().is_empty());
        assert!(fs::read_to_string(dir.path().join("progress.csv")).unwrap().is_empty());
    }

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = configure(dir.path(), &[OutputFormat::Csv]).unwrap();
        logger.log("not written to csv").unwrap();
        logger.record("b", 2.0);
        logger.record("a", 1.5);
        logger.dump(1).unwrap();
        logger.record("a", 3.0);
        logger.dump(2).unwrap();
        drop(logger);

        let text = fs::read_to_string(dir.path().join("progress.csv")).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["a,b", "1.5,2", "3,"]);
    }

    #[test]
    fn test_record_snapshot_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = configure(dir.path(), &[]).unwrap();
        let snapshot = TrainingSnapshot::new(3, 6144)
            .with_fps(1234.7)
            .with_episodes(Some(22.5), Some(22.5))
            .with_losses(-0.01, 12.0, -0.69, 5.9)
            .with_clipping(0.004, 0.05, 0.2)
            .with_explained_variance(0.1)
            .with_learning_rate(3e-4)
            .with_n_updates(30);
        logger.record_snapshot(&snapshot);

        let keys: Vec<&str> = logger.pending().keys().map(|k| k.as_str()).collect();
        for key in [
            "rollout/ep_len_mean",
            "rollout/ep_rew_mean",
            "time/fps",
            "time/iterations",
            "time/total_timesteps",
            "train/approx_kl",
            "train/clip_fraction",
            "train/clip_range",
            "train/entropy_loss",
            "train/explained_variance",
            "train/learning_rate",
            "train/loss",
            "train/n_updates",
            "train/policy_gradient_loss",
            "train/value_loss",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(logger.pending()["time/fps"], 1234.0);
    }

    #[test]
    fn test_snapshot_without_episodes_omits_rollout_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = configure(dir.path(), &[]).unwrap();
        logger.record_snapshot(&TrainingSnapshot::new(1, 8));
        assert!(!logger.pending().contains_key("rollout/ep_rew_mean"));
        assert!(logger.pending().contains_key("time/iterations"));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(0.5), "0.5000");
        assert_eq!(format_value(3e-4), "3.000e-4");
        assert_eq!(format_value(0.0), "0");
    }
}
