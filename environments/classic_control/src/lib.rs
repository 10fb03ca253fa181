//! Vectorized classic-control environments.
//!
//! Every environment steps all of its replicas in one call, stores state as
//! struct-of-arrays, and never resets finished replicas on its own: callers
//! read the terminal observation first and then reset through a
//! [`ResetMask`].
//!
//! Environments are built from Gym-style string ids via [`make`]:
//!
//! ```
//! use classic_control::{make, Environment};
//!
//! let mut env = make("CartPole-v1", 4).unwrap();
//! env.reset(42);
//! let result = env.step_no_reset(&[0.0, 1.0, 0.0, 1.0]);
//! assert_eq!(result.rewards.len(), 4);
//! ```

pub mod cartpole;
pub mod env;
pub mod error;
pub mod mountain_car;
pub mod registry;

pub use cartpole::CartPole;
pub use env::{Environment, ResetMask, StepResult};
pub use error::{EnvError, Result};
pub use mountain_car::MountainCar;
pub use registry::{make, registry, spec, EnvKind, EnvSpec};
