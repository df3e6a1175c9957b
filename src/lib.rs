//! # Torque
//!
//! Asynchronous advantage actor-critic (A3C) training in Rust, built on
//! PyTorch's tensor and autograd machinery (via tch-rs).
//!
//! The crate implements the classic A3C recipe: a single global policy/value
//! network lives in shared memory, and a pool of worker threads repeatedly
//! syncs a private copy, rolls out a bounded trajectory in a private
//! environment instance, and pushes locally computed gradients through a
//! shared RMSProp optimizer directly into the global parameters. Updates are
//! Hogwild-style: no locks, races tolerated by design.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use torque_rl::train::a3c::{A3C, A3CConfig};
//!
//! let config = A3CConfig::new("CartPole-v1", 4)
//!     .learning_rate(1e-4)
//!     .is_discrete(true)
//!     .max_steps(100_000);
//! let mut a3c = A3C::new(config).unwrap();
//! let summary = a3c.run().unwrap();
//! println!("trained for {} environment steps", summary.global_steps);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Environment traits, registry, and built-in environments
pub mod env;

/// Policy/value network and action distributions
pub mod policy;

/// Training algorithms (A3C)
pub mod train;

/// Current version of torque-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
