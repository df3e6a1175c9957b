//! A3C configuration and hyperparameters
//!
//! Coordinator-level and per-worker parameters with validation and builder
//! methods. Defaults follow the original A3C paper settings for small
//! control problems.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Coordinator-level A3C configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A3CConfig {
    /// Name of the registered environment to train on
    pub env_name: String,

    /// Number of training workers (the evaluation worker is extra)
    pub n_worker: usize,

    /// Shared learning rate for all workers
    pub lr: f64,

    /// Whether the action space is discrete (affects the network head and
    /// the loss formulation)
    pub is_discrete: bool,

    /// Seed for the global parameter initialization
    pub seed: i64,

    /// Global environment-step budget; training stops once the shared
    /// counter reaches it
    pub max_steps: u64,

    /// Per-worker rollout/update tuning
    pub worker: WorkerConfig,
}

/// Per-worker rollout and loss parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Rollout length cap
    pub t_max: usize,

    /// Discount factor (gamma)
    pub gamma: f32,

    /// GAE trace-decay parameter (tau)
    pub tau: f32,

    /// Entropy bonus weight (beta)
    pub beta: f64,

    /// Value loss coefficient
    pub value_loss_coef: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { t_max: 20, gamma: 0.99, tau: 1.0, beta: 0.01, value_loss_coef: 0.5 }
    }
}

impl A3CConfig {
    /// Create a configuration for the given environment and worker count
    pub fn new(env_name: impl Into<String>, n_worker: usize) -> Self {
        Self {
            env_name: env_name.into(),
            n_worker,
            lr: 1e-4,
            is_discrete: false,
            seed: 123,
            max_steps: 1_000_000,
            worker: WorkerConfig::default(),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.env_name.is_empty() {
            return Err(anyhow!("env_name must not be empty"));
        }
        if self.n_worker == 0 {
            return Err(anyhow!("n_worker must be at least 1"));
        }
        if self.lr <= 0.0 {
            return Err(anyhow!("lr must be positive"));
        }
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be positive"));
        }
        if self.worker.t_max == 0 {
            return Err(anyhow!("t_max must be positive"));
        }
        if !(0.0..=1.0).contains(&self.worker.gamma) || self.worker.gamma == 0.0 {
            return Err(anyhow!("gamma must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.worker.tau) {
            return Err(anyhow!("tau must be in [0, 1]"));
        }
        if self.worker.beta < 0.0 {
            return Err(anyhow!("beta must be non-negative"));
        }
        if self.worker.value_loss_coef < 0.0 {
            return Err(anyhow!("value_loss_coef must be non-negative"));
        }
        Ok(())
    }

    /// Set the learning rate
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set whether the action space is discrete
    pub fn is_discrete(mut self, discrete: bool) -> Self {
        self.is_discrete = discrete;
        self
    }

    /// Set the global parameter seed
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the global environment-step budget
    pub fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }

    /// Set the rollout length cap
    pub fn t_max(mut self, t_max: usize) -> Self {
        self.worker.t_max = t_max;
        self
    }

    /// Set the discount factor
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.worker.gamma = gamma;
        self
    }

    /// Set the GAE trace-decay parameter
    pub fn tau(mut self, tau: f32) -> Self {
        self.worker.tau = tau;
        self
    }

    /// Set the entropy bonus weight
    pub fn beta(mut self, beta: f64) -> Self {
        self.worker.beta = beta;
        self
    }

    /// Set the value loss coefficient
    pub fn value_loss_coef(mut self, coef: f64) -> Self {
        self.worker.value_loss_coef = coef;
        self
    }
}
