//! Linear layer with orthogonal initialization.
//!
//! An orthogonal weight matrix has all singular values equal to one, so it
//! preserves the norm of its input. Scaled by a gain it is the standard
//! initialization for actor-critic MLPs:
//!
//! - sqrt(2) for hidden layers
//! - 0.01 for the policy head (near-uniform initial policy)
//! - 1.0 for the value head
//!
//! Weights are generated on the host from a caller-supplied RNG, so two
//! layers built from equally seeded RNGs are identical.
//!
//! ```ignore
//! let mut rng = Xoshiro256StarStar::seed_from_u64(0);
//! let layer: OrthogonalLinear<B> = OrthogonalLinearConfig::new(4, 64)
//!     .with_gain(std::f64::consts::SQRT_2)
//!     .init(&device, &mut rng);
//! ```

use burn::module::{Module, Param};
use burn::prelude::*;
use rand::Rng;

/// Configuration for [`OrthogonalLinear`].
#[derive(Debug, Clone)]
pub struct OrthogonalLinearConfig {
    pub d_input: usize,
    pub d_output: usize,
    /// Scale applied to the orthogonal matrix.
    pub gain: f64,
    pub bias: bool,
}

impl OrthogonalLinearConfig {
    pub fn new(d_input: usize, d_output: usize) -> Self {
        Self {
            d_input,
            d_output,
            gain: 1.0,
            bias: true,
        }
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Initialize the layer. Biases start at zero.
    pub fn init<B: Backend, R: Rng>(&self, device: &B::Device, rng: &mut R) -> OrthogonalLinear<B> {
        let weights = orthogonal_matrix(self.d_output, self.d_input, self.gain as f32, rng);
        let weight = Tensor::<B, 2>::from_data(
            TensorData::new(weights, [self.d_output, self.d_input]),
            device,
        );

        let bias = self
            .bias
            .then(|| Param::from_tensor(Tensor::zeros([self.d_output], device)));

        OrthogonalLinear {
            weight: Param::from_tensor(weight),
            bias,
        }
    }
}

/// Linear layer `y = x W^T + b` with orthogonally initialized weights.
#[derive(Module, Debug)]
pub struct OrthogonalLinear<B: Backend> {
    /// Weight matrix of shape [d_output, d_input]
    pub weight: Param<Tensor<B, 2>>,
    /// Optional bias of shape [d_output]
    pub bias: Option<Param<Tensor<B, 1>>>,
}

impl<B: Backend> OrthogonalLinear<B> {
    /// # Arguments
    /// * `input` - Tensor of shape [batch_size, d_input]
    ///
    /// # Returns
    /// Tensor of shape [batch_size, d_output]
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let output = input.matmul(self.weight.val().transpose());

        match &self.bias {
            Some(bias) => output + bias.val().unsqueeze_dim(0),
            None => output,
        }
    }

    pub fn d_input(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn d_output(&self) -> usize {
        self.weight.dims()[0]
    }
}

/// Generate a `rows x cols` row-major matrix with orthonormal rows (wide) or
/// columns (tall), scaled by `gain`.
///
/// Modified Gram-Schmidt over Gaussian vectors of length `max(rows, cols)`.
pub fn orthogonal_matrix<R: Rng>(rows: usize, cols: usize, gain: f32, rng: &mut R) -> Vec<f32> {
    let (n_vectors, dim) = if rows >= cols { (cols, rows) } else { (rows, cols) };

    let mut basis: Vec<Vec<f32>> = Vec::with_capacity(n_vectors);
    while basis.len() < n_vectors {
        let mut v: Vec<f32> = (0..dim).map(|_| standard_normal(rng)).collect();
        for u in &basis {
            let dot: f32 = v.iter().zip(u).map(|(a, b)| a * b).sum();
            v.iter_mut().zip(u).for_each(|(a, b)| *a -= dot * b);
        }
        let norm = v.iter().map(|a| a * a).sum::<f32>().sqrt();
        // Linearly dependent draw; try again.
        if norm < 1e-6 {
            continue;
        }
        v.iter_mut().for_each(|a| *a /= norm);
        basis.push(v);
    }

    let mut out = vec![0.0f32; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[r * cols + c] = gain
                * if rows >= cols {
                    basis[c][r]
                } else {
                    basis[r][c]
                };
        }
    }
    out
}

/// Box-Muller draw from N(0, 1).
fn standard_normal<R: Rng>(rng: &mut R) -> f32 {
    let u1: f32 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    type TestBackend = NdArray<f32>;

    fn rng() -> Xoshiro256StarStar {
        Xoshiro256StarStar::seed_from_u64(7)
    }

    fn gram(m: &[f32], rows: usize, cols: usize, by_rows: bool) -> Vec<f32> {
        let n = if by_rows { rows } else { cols };
        let at = |i: usize, k: usize| if by_rows { m[i * cols + k] } else { m[k * cols + i] };
        let len = if by_rows { cols } else { rows };
        let mut g = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                g[i * n + j] = (0..len).map(|k| at(i, k) * at(j, k)).sum();
            }
        }
        g
    }

    fn assert_identity(g: &[f32], n: usize, scale: f32) {
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { scale } else { 0.0 };
                assert!((g[i * n + j] - expected).abs() < 1e-3, "g[{i},{j}] = {}", g[i * n + j]);
            }
        }
    }

    #[test]
    fn test_orthogonal_linear_forward() {
        let device = Default::default();
        let linear: OrthogonalLinear<TestBackend> =
            OrthogonalLinearConfig::new(4, 3).init(&device, &mut rng());

        let input = Tensor::random([2, 4], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(linear.forward(input).dims(), [2, 3]);
        assert_eq!(linear.d_input(), 4);
        assert_eq!(linear.d_output(), 3);
    }

    #[test]
    fn test_orthogonal_square() {
        let m = orthogonal_matrix(6, 6, 1.0, &mut rng());
        assert_identity(&gram(&m, 6, 6, true), 6, 1.0);
    }

    #[test]
    fn test_orthogonal_tall_has_orthonormal_columns() {
        let m = orthogonal_matrix(8, 4, 1.0, &mut rng());
        assert_identity(&gram(&m, 8, 4, false), 4, 1.0);
    }

    #[test]
    fn test_orthogonal_wide_has_orthonormal_rows() {
        let m = orthogonal_matrix(2, 64, 1.0, &mut rng());
        assert_identity(&gram(&m, 2, 64, true), 2, 1.0);
    }

    #[test]
    fn test_gain_scales_norms() {
        let m = orthogonal_matrix(4, 4, 2.0, &mut rng());
        assert_identity(&gram(&m, 4, 4, true), 4, 4.0);
    }

    #[test]
    fn test_same_seed_same_weights() {
        assert_eq!(
            orthogonal_matrix(5, 3, 1.0, &mut rng()),
            orthogonal_matrix(5, 3, 1.0, &mut rng())
        );
    }

    #[test]
    fn test_no_bias() {
        let linear: OrthogonalLinear<TestBackend> = OrthogonalLinearConfig::new(4, 3)
            .with_bias(false)
            .init(&Default::default(), &mut rng());
        assert!(linear.bias.is_none());
    }
}
