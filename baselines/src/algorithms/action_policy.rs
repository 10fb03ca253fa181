//! Discrete actions and the categorical action distribution.

use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use rand::Rng;

/// Discrete action value (single index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscreteAction(pub u32);

impl DiscreteAction {
    /// Action index encoded as a float, the form environments consume.
    #[inline]
    pub fn as_f32(self) -> f32 {
        self.0 as f32
    }
}

impl From<u32> for DiscreteAction {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl From<DiscreteAction> for u32 {
    fn from(val: DiscreteAction) -> Self {
        val.0
    }
}

/// Categorical distribution parameterized by logits.
///
/// Sampling and the mode are computed on the host from the probability
/// slice; `log_prob` and `entropy` stay on the autodiff graph. The log probs
/// returned alongside sampled actions come from the same `log_softmax` the
/// update step uses.
#[derive(Clone, Debug)]
pub struct Categorical<B: Backend> {
    /// Unnormalized log probabilities: [batch, n_actions]
    pub logits: Tensor<B, 2>,
}

impl<B: Backend> Categorical<B> {
    pub fn new(logits: Tensor<B, 2>) -> Self {
        Self { logits }
    }

    /// Action probabilities: [batch, n_actions]
    pub fn probs(&self) -> Tensor<B, 2> {
        softmax(self.logits.clone(), 1)
    }

    /// Normalized log probabilities: [batch, n_actions]
    pub fn log_probs(&self) -> Tensor<B, 2> {
        log_softmax(self.logits.clone(), 1)
    }

    pub fn n_actions(&self) -> usize {
        self.logits.dims()[1]
    }

    pub fn batch_size(&self) -> usize {
        self.logits.dims()[0]
    }

    fn host_probs(&self) -> Vec<f32> {
        self.probs()
            .into_data()
            .iter::<f32>()
            .collect()
    }

    /// Host copy of the normalized log probability of one action per row.
    fn host_log_probs_of(&self, actions: &[DiscreteAction]) -> Vec<f32> {
        let log_probs: Vec<f32> = self.log_probs().into_data().iter::<f32>().collect();
        log_probs
            .chunks(self.n_actions())
            .zip(actions)
            .map(|(row, a)| row[a.0 as usize])
            .collect()
    }

    /// Sample one action per row, returning the actions and their log probs.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> (Vec<DiscreteAction>, Vec<f32>) {
        let probs = self.host_probs();
        let n_actions = self.n_actions();

        let actions = probs
            .chunks(n_actions)
            .map(|row| {
                let u: f32 = rng.gen();
                let mut cumsum = 0.0;
                // Fallback covers rows whose probabilities sum to slightly below 1.
                let mut selected = n_actions - 1;
                for (a, &p) in row.iter().enumerate() {
                    cumsum += p;
                    if u < cumsum {
                        selected = a;
                        break;
                    }
                }
                DiscreteAction(selected as u32)
            })
            .collect::<Vec<_>>();
        let log_probs = self.host_log_probs_of(&actions);
        (actions, log_probs)
    }

    /// Most likely action per row, with its log prob. Ties go to the lowest index.
    pub fn mode(&self) -> (Vec<DiscreteAction>, Vec<f32>) {
        let probs = self.host_probs();

        let actions = probs
            .chunks(self.n_actions())
            .map(|row| {
                let (best, _) = row
                    .iter()
                    .enumerate()
                    .fold((0usize, f32::NEG_INFINITY), |(bi, bp), (i, &p)| {
                        if p > bp {
                            (i, p)
                        } else {
                            (bi, bp)
                        }
                    });
                DiscreteAction(best as u32)
            })
            .collect::<Vec<_>>();
        let log_probs = self.host_log_probs_of(&actions);
        (actions, log_probs)
    }

    /// Log probability of the given actions: [batch]
    pub fn log_prob(&self, actions: &[DiscreteAction], device: &B::Device) -> Tensor<B, 1> {
        let batch_size = actions.len();
        let indices: Vec<i32> = actions.iter().map(|a| a.0 as i32).collect();
        let indices: Tensor<B, 2, Int> =
            Tensor::<B, 1, Int>::from_ints(indices.as_slice(), device).reshape([batch_size, 1]);

        self.log_probs().gather(1, indices).flatten(0, 1)
    }

    /// Per-row entropy: [batch]
    pub fn entropy(&self) -> Tensor<B, 1> {
        let neg_entropy: Tensor<B, 2> = (self.probs() * self.log_probs()).sum_dim(1);
        -neg_entropy.flatten(0, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    type TestBackend = NdArray<f32>;

    fn categorical(rows: &[[f32; 3]]) -> Categorical<TestBackend> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let logits = Tensor::<TestBackend, 1>::from_floats(flat.as_slice(), &Default::default())
            .reshape([rows.len(), 3]);
        Categorical::new(logits)
    }

    #[test]
    fn test_mode_picks_argmax() {
        let dist = categorical(&[[0.0, 2.0, 1.0], [5.0, -1.0, 0.0]]);
        let (actions, log_probs) = dist.mode();
        assert_eq!(actions, vec![DiscreteAction(1), DiscreteAction(0)]);
        assert!(log_probs.iter().all(|&lp| lp < 0.0));
    }

    #[test]
    fn test_sample_respects_degenerate_distribution() {
        let dist = categorical(&[[-50.0, 50.0, -50.0]]);
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        for _ in 0..20 {
            let (actions, _) = dist.sample(&mut rng);
            assert_eq!(actions[0], DiscreteAction(1));
        }
    }

    #[test]
    fn test_sample_is_seeded() {
        let dist = categorical(&[[0.0, 0.0, 0.0]; 8]);
        let mut a = Xoshiro256StarStar::seed_from_u64(3);
        let mut b = Xoshiro256StarStar::seed_from_u64(3);
        assert_eq!(dist.sample(&mut a).0, dist.sample(&mut b).0);
    }

    #[test]
    fn test_log_prob_uniform() {
        let dist = categorical(&[[1.0, 1.0, 1.0], [0.0, 0.0, 0.0]]);
        let log_probs: Vec<f32> = dist
            .log_prob(&[DiscreteAction(2), DiscreteAction(0)], &Default::default())
            .into_data()
            .iter::<f32>()
            .collect();
        for lp in log_probs {
            assert!((lp - (1.0f32 / 3.0).ln()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rare_action_log_prob_is_exact() {
        let logits = Tensor::<TestBackend, 1>::from_floats([0.0, 20.0], &Default::default())
            .reshape([1, 2]);
        let dist = Categorical::new(logits);
        let lp = dist.host_log_probs_of(&[DiscreteAction(0)]);
        assert!((lp[0] + 20.0).abs() < 1e-4, "got {}", lp[0]);
    }

    #[test]
    fn test_sampled_log_probs_match_log_prob() {
        let dist = categorical(&[[0.0, 1.5, -1.0], [3.0, 0.0, -4.0], [-2.0, -2.0, 6.0], [0.5, 0.5, 0.5]]);
        let device = Default::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(9);
        for _ in 0..10 {
            let (actions, sampled) = dist.sample(&mut rng);
            let expected: Vec<f32> = dist.log_prob(&actions, &device).into_data().iter::<f32>().collect();
            assert_eq!(sampled, expected);
        }
        let (actions, mode_lps) = dist.mode();
        let expected: Vec<f32> = dist.log_prob(&actions, &device).into_data().iter::<f32>().collect();
        assert_eq!(mode_lps, expected);
    }

    #[test]
    fn test_entropy_uniform_is_log_n() {
        let dist = categorical(&[[0.0, 0.0, 0.0]]);
        let entropy: Vec<f32> = dist.entropy().into_data().iter::<f32>().collect();
        assert!((entropy[0] - 3.0f32.ln()).abs() < 1e-5);
    }
}
