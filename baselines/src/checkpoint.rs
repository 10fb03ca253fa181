//! Single-file agent checkpoints.
//!
//! A checkpoint bundles the network weights (burn record bytes) with the
//! metadata needed to rebuild the agent: environment id, policy id, space
//! sizes, hyperparameters and the timestep counter. The container is
//! bincode-encoded and written at exactly the requested path.

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use crate::ppo::PPOConfig;

/// Format version written by this build.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Error type for checkpointing operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// The file is not a readable checkpoint.
    Format(String),
    /// The checkpoint does not fit the environment or build it is loaded into.
    Incompatible(String),
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::Format(e) => write!(f, "Malformed checkpoint: {}", e),
            CheckpointError::Incompatible(e) => write!(f, "Incompatible checkpoint: {}", e),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Everything persisted for a trained agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCheckpoint {
    pub version: u32,
    pub env_id: String,
    pub policy_id: String,
    pub obs_size: usize,
    pub n_actions: usize,
    pub num_timesteps: usize,
    pub config: PPOConfig,
    /// `BinBytesRecorder<FullPrecisionSettings>` record of the network.
    pub weights: Vec<u8>,
}

impl AgentCheckpoint {
    /// Write to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)
            .map_err(|e| CheckpointError::Format(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    /// Read from `path` and check the format version.
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let reader = BufReader::new(File::open(path)?);
        let checkpoint: Self = bincode::deserialize_from(reader)
            .map_err(|e| CheckpointError::Format(e.to_string()))?;

        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Incompatible(format!(
                "version {} (expected {})",
                checkpoint.version, CHECKPOINT_VERSION
            )));
        }
        Ok(checkpoint)
    }
}

/// Serialize a module's parameters to bytes.
pub fn encode_weights<B: Backend, M: Module<B>>(model: &M) -> Result<Vec<u8>, CheckpointError> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    recorder
        .record(model.clone().into_record(), ())
        .map_err(|e| CheckpointError::Recorder(e.to_string()))
}

/// Load parameters produced by [`encode_weights`] into `model`.
pub fn decode_weights<B: Backend, M: Module<B>>(
    model: M,
    bytes: Vec<u8>,
    device: &B::Device,
) -> Result<M, CheckpointError> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let record = recorder
        .load(bytes, device)
        .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
    Ok(model.load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::MlpActorCritic;
    use burn::backend::NdArray;
    use burn::tensor::Tensor;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    type TestBackend = NdArray<f32>;

    fn sample_checkpoint() -> AgentCheckpoint {
        AgentCheckpoint {
            version: CHECKPOINT_VERSION,
            env_id: "CartPole-v1".to_string(),
            policy_id: "MlpPolicy".to_string(),
            obs_size: 4,
            n_actions: 2,
            num_timesteps: 2048,
            config: PPOConfig::new().with_n_steps(16),
            weights: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        sample_checkpoint().save(&path).unwrap();

        // Written at exactly the given path, no extension added.
        assert!(path.is_file());
        let loaded = AgentCheckpoint::load(&path).unwrap();
        assert_eq!(loaded.env_id, "CartPole-v1");
        assert_eq!(loaded.num_timesteps, 2048);
        assert_eq!(loaded.config.n_steps, 16);
        assert_eq!(loaded.weights, vec![1, 2, 3]);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        fs::write(&path, b"stale contents that are much longer than nothing").unwrap();

        let mut checkpoint = sample_checkpoint();
        checkpoint.num_timesteps = 7;
        checkpoint.save(&path).unwrap();
        assert_eq!(AgentCheckpoint::load(&path).unwrap().num_timesteps, 7);
    }

    #[test]
    fn test_load_rejects_other_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        let mut checkpoint = sample_checkpoint();
        checkpoint.version = CHECKPOINT_VERSION + 1;
        checkpoint.save(&path).unwrap();

        assert!(matches!(
            AgentCheckpoint::load(&path),
            Err(CheckpointError::Incompatible(_))
        ));
    }

    #[test]
    fn test_load_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(AgentCheckpoint::load(&missing), Err(CheckpointError::Io(_))));

        let garbage = dir.path().join("garbage");
        fs::write(&garbage, b"xx").unwrap();
        assert!(matches!(AgentCheckpoint::load(&garbage), Err(CheckpointError::Format(_))));
    }

    #[test]
    fn test_weights_roundtrip() {
        let device = Default::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(5);
        let trained = MlpActorCritic::<TestBackend>::new(4, 2, &[8], &device, &mut rng);
        let bytes = encode_weights(&trained).unwrap();

        let mut other_rng = Xoshiro256StarStar::seed_from_u64(6);
        let fresh = MlpActorCritic::<TestBackend>::new(4, 2, &[8], &device, &mut other_rng);
        let restored = decode_weights(fresh, bytes, &device).unwrap();

        let obs = Tensor::<TestBackend, 2>::ones([2, 4], &device);
        let (la, va) = trained.forward(obs.clone());
        let (lb, vb) = restored.forward(obs);
        assert_eq!(la.into_data().to_vec::<f32>().unwrap(), lb.into_data().to_vec::<f32>().unwrap());
        assert_eq!(va.into_data().to_vec::<f32>().unwrap(), vb.into_data().to_vec::<f32>().unwrap());
    }
}
