//! Asynchronous advantage actor-critic (A3C)
//!
//! One global network, one shared RMSProp optimizer, N training workers plus
//! one evaluation worker. Workers sync a private copy of the parameters,
//! roll out a bounded trajectory, and apply gradients straight into the
//! shared parameters without locks (Hogwild-style updates).

pub mod config;
pub mod optimizer;
pub mod rollout;
pub mod stats;
pub mod trainer;
pub mod worker;

pub use config::{A3CConfig, WorkerConfig};
pub use optimizer::SharedRmsProp;
pub use stats::RolloutStats;
pub use trainer::{RunSummary, StopHandle, WorkerError, A3C};
