//! Evaluation results persisted as a Python pickle.
//!
//! The file holds a dict `{"eps-returns": [float, ...]}` so offline analysis
//! can read it with `pickle.load`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_pickle as pickle;

/// Per-episode evaluation returns of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsRecord {
    #[serde(rename = "eps-returns")]
    pub eps_returns: Vec<f64>,
}

impl ResultsRecord {
    pub fn new(eps_returns: Vec<f64>) -> Self {
        Self { eps_returns }
    }

    pub fn mean(&self) -> f64 {
        if self.eps_returns.is_empty() {
            return 0.0;
        }
        self.eps_returns.iter().sum::<f64>() / self.eps_returns.len() as f64
    }

    /// Population standard deviation.
    pub fn std(&self) -> f64 {
        if self.eps_returns.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .eps_returns
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / self.eps_returns.len() as f64;
        var.sqrt()
    }

    /// Write to `path`, truncating any existing file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        pickle::to_writer(&mut writer, self, pickle::SerOptions::new())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        writer.flush()
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        pickle::from_reader(reader, pickle::DeOptions::new())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;

    #[test]
    fn test_mean_std() {
        let record = ResultsRecord::new(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((record.mean() - 5.0).abs() < 1e-12);
        assert!((record.std() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_is_zero() {
        let record = ResultsRecord::new(Vec::new());
        assert_eq!(record.mean(), 0.0);
        assert_eq!(record.std(), 0.0);
    }

    #[test]
    fn test_constant_returns_have_zero_std() {
        let record = ResultsRecord::new(vec![500.0; 100]);
        assert_eq!(record.mean(), 500.0);
        assert_eq!(record.std(), 0.0);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.pkl");
        let record = ResultsRecord::new((0..100).map(|i| i as f64 * 0.5).collect());
        record.save(&path).unwrap();

        assert_eq!(ResultsRecord::load(&path).unwrap(), record);
    }

    #[test]
    fn test_pickle_is_a_string_keyed_dict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.pkl");
        ResultsRecord::new(vec![1.0, 2.5]).save(&path).unwrap();

        let bytes = fs::read(&path).unwrap();
        let dict: BTreeMap<String, Vec<f64>> =
            pickle::from_slice(&bytes, pickle::DeOptions::new()).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict["eps-returns"], vec![1.0, 2.5]);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.pkl");
        ResultsRecord::new(vec![1.0; 100]).save(&path).unwrap();
        ResultsRecord::new(vec![3.0]).save(&path).unwrap();

        assert_eq!(ResultsRecord::load(&path).unwrap().eps_returns, vec![3.0]);
    }
}
