//! Neural network building blocks for actor-critic policies.

pub mod orthogonal;

pub use orthogonal::{orthogonal_matrix, OrthogonalLinear, OrthogonalLinearConfig};
