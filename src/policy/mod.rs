//! Policy and neural network implementations
//!
//! The policy/value network lives in [`actor_critic`]; the tagged
//! categorical/Gaussian action distribution it produces lives in
//! [`distribution`].

pub mod actor_critic;
pub mod distribution;

pub use actor_critic::{ActorCriticNet, HeadSpec};
pub use distribution::ActionDistribution;
