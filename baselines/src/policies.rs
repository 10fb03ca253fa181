//! Policy registry and the MLP actor-critic network.

use burn::module::Module;
use burn::prelude::*;
use burn::tensor::activation::tanh;
use rand::Rng;
use std::f64::consts::SQRT_2;

use crate::error::{BaselinesError, Result};
use crate::nn::{OrthogonalLinear, OrthogonalLinearConfig};

/// Policy architectures resolvable from a string id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Separate actor and critic MLPs over flat observations.
    Mlp,
}

impl PolicyKind {
    const IDS: &'static [(&'static str, PolicyKind)] = &[("MlpPolicy", PolicyKind::Mlp)];

    /// Resolve a policy id such as `"MlpPolicy"`.
    pub fn from_id(id: &str) -> Result<Self> {
        Self::IDS
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| BaselinesError::UnknownPolicy {
                id: id.to_string(),
                known: Self::IDS.iter().map(|(name, _)| *name).collect(),
            })
    }

    pub fn id(&self) -> &'static str {
        match self {
            PolicyKind::Mlp => "MlpPolicy",
        }
    }
}

/// Actor-critic with independent MLP trunks.
///
/// Hidden layers use tanh. Orthogonal init with gain sqrt(2) for hidden
/// layers, 0.01 for the policy head and 1.0 for the value head.
#[derive(Module, Debug)]
pub struct MlpActorCritic<B: Backend> {
    actor: Vec<OrthogonalLinear<B>>,
    actor_head: OrthogonalLinear<B>,
    critic: Vec<OrthogonalLinear<B>>,
    critic_head: OrthogonalLinear<B>,
}

impl<B: Backend> MlpActorCritic<B> {
    pub fn new<R: Rng>(
        obs_size: usize,
        n_actions: usize,
        net_arch: &[usize],
        device: &B::Device,
        rng: &mut R,
    ) -> Self {
        let trunk = |rng: &mut R| -> (Vec<OrthogonalLinear<B>>, usize) {
            let mut d_in = obs_size;
            let layers = net_arch
                .iter()
                .map(|&d_out| {
                    let layer = OrthogonalLinearConfig::new(d_in, d_out)
                        .with_gain(SQRT_2)
                        .init(device, &mut *rng);
                    d_in = d_out;
                    layer
                })
                .collect();
            (layers, d_in)
        };

        let (actor, actor_out) = trunk(rng);
        let actor_head = OrthogonalLinearConfig::new(actor_out, n_actions)
            .with_gain(0.01)
            .init(device, rng);
        let (critic, critic_out) = trunk(rng);
        let critic_head = OrthogonalLinearConfig::new(critic_out, 1)
            .with_gain(1.0)
            .init(device, rng);

        Self {
            actor,
            actor_head,
            critic,
            critic_head,
        }
    }

    /// Forward pass.
    ///
    /// # Returns
    /// (logits [batch, n_actions], values [batch])
    pub fn forward(&self, obs: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let actor = self
            .actor
            .iter()
            .fold(obs.clone(), |x, layer| tanh(layer.forward(x)));
        let critic = self
            .critic
            .iter()
            .fold(obs, |x, layer| tanh(layer.forward(x)));

        let logits = self.actor_head.forward(actor);
        let values = self.critic_head.forward(critic).flatten(0, 1);
        (logits, values)
    }

    /// Value estimates only: [batch]
    pub fn values(&self, obs: Tensor<B, 2>) -> Tensor<B, 1> {
        let critic = self
            .critic
            .iter()
            .fold(obs, |x, layer| tanh(layer.forward(x)));
        self.critic_head.forward(critic).flatten(0, 1)
    }

    pub fn obs_size(&self) -> usize {
        self.actor
            .first()
            .unwrap_or(&self.actor_head)
            .d_input()
    }

    pub fn n_actions(&self) -> usize {
        self.actor_head.d_output()
    }
}
