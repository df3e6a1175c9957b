//! Training algorithms
//!
//! Currently ships a single algorithm: asynchronous advantage actor-critic.

pub mod a3c;
