//! String-id registry for the classic-control environments.

use crate::cartpole::CartPole;
use crate::env::Environment;
use crate::error::{EnvError, Result};
use crate::mountain_car::MountainCar;

/// Which simulation backs a registered id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKind {
    CartPole,
    MountainCar,
}

/// Registration entry for an environment id.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvSpec {
    pub id: &'static str,
    pub kind: EnvKind,
    pub max_episode_steps: u32,
    pub reward_threshold: f32,
}

const REGISTRY: &[EnvSpec] = &[
    EnvSpec {
        id: "CartPole-v0",
        kind: EnvKind::CartPole,
        max_episode_steps: 200,
        reward_threshold: 195.0,
    },
    EnvSpec {
        id: "CartPole-v1",
        kind: EnvKind::CartPole,
        max_episode_steps: 500,
        reward_threshold: 475.0,
    },
    EnvSpec {
        id: "MountainCar-v0",
        kind: EnvKind::MountainCar,
        max_episode_steps: 200,
        reward_threshold: -110.0,
    },
];

/// All registered environments.
pub fn registry() -> &'static [EnvSpec] {
    REGISTRY
}

/// Look up the registration for `id`.
pub fn spec(id: &str) -> Result<&'static EnvSpec> {
    REGISTRY
        .iter()
        .find(|spec| spec.id == id)
        .ok_or_else(|| EnvError::UnknownEnvironment {
            id: id.to_string(),
            known: REGISTRY.iter().map(|spec| spec.id).collect(),
        })
}

/// Build `num_envs` replicas of the environment registered as `id`.
///
/// The returned environment has not been reset yet.
pub fn make(id: &str, num_envs: usize) -> Result<Box<dyn Environment + Send>> {
    let spec = spec(id)?;
    let env: Box<dyn Environment + Send> = match spec.kind {
        EnvKind::CartPole => Box::new(CartPole::new(spec.id, num_envs, spec.max_episode_steps)?),
        EnvKind::MountainCar => {
            Box::new(MountainCar::new(spec.id, num_envs, spec.max_episode_steps)?)
        }
    };
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_cartpole_v1() {
        let env = make("CartPole-v1", 4).unwrap();
        assert_eq!(env.id(), "CartPole-v1");
        assert_eq!(env.num_envs(), 4);
        assert_eq!(env.observation_size(), 4);
        assert_eq!(env.num_actions(), 2);
    }

    #[test]
    fn test_make_mountain_car() {
        let env = make("MountainCar-v0", 3).unwrap();
        assert_eq!(env.observation_size(), 2);
        assert_eq!(env.num_actions(), 3);
    }

    #[test]
    fn test_cartpole_versions_differ_in_horizon() {
        assert_eq!(spec("CartPole-v0").unwrap().max_episode_steps, 200);
        assert_eq!(spec("CartPole-v1").unwrap().max_episode_steps, 500);
    }

    #[test]
    fn test_unknown_id_lists_known_ids() {
        let err = make("Pong-v5", 4).err().unwrap();
        match &err {
            EnvError::UnknownEnvironment { id, known } => {
                assert_eq!(id, "Pong-v5");
                assert_eq!(known.len(), registry().len());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("CartPole-v1"));
    }

    #[test]
    fn test_zero_envs_rejected() {
        assert!(matches!(
            make("CartPole-v1", 0).err(),
            Some(EnvError::InvalidConfig { .. })
        ));
    }
}
