//! Action distributions for discrete and continuous control
//!
//! A single tagged type with a `{sample, log_prob, entropy}` interface keeps
//! the discrete/continuous split out of the worker and loss code.

use tch::{Kind, Tensor};

const LN_2PI: f64 = 1.8378770664093453;

/// Action distribution produced by one forward pass of the network
///
/// All tensors carry a leading batch dimension. `log_prob` and `entropy`
/// stay connected to the autograd graph; `sample` is detached.
#[derive(Debug)]
pub enum ActionDistribution {
    /// Categorical distribution over discrete action logits [batch, n_actions]
    Categorical {
        /// Unnormalized action preferences
        logits: Tensor,
    },

    /// Independent per-dimension Gaussians [batch, action_dim]
    DiagGaussian {
        /// Per-dimension mean
        mu: Tensor,
        /// Per-dimension standard deviation, strictly positive
        sigma: Tensor,
    },
}

impl ActionDistribution {
    /// Sample an action, detached from the graph
    ///
    /// Categorical: [batch] of int64 indices. Gaussian: [batch, action_dim]
    /// of floats.
    pub fn sample(&self) -> Tensor {
        match self {
            Self::Categorical { logits } => {
                let probs = logits.softmax(-1, Kind::Float);
                probs.multinomial(1, true).squeeze_dim(-1)
            }
            Self::DiagGaussian { mu, sigma } => tch::no_grad(|| mu + sigma * mu.randn_like()),
        }
    }

    /// Log-probability of the given actions, shape [batch]
    pub fn log_prob(&self, actions: &Tensor) -> Tensor {
        match self {
            Self::Categorical { logits } => {
                let log_probs = logits.log_softmax(-1, Kind::Float);
                log_probs.gather(-1, &actions.unsqueeze(-1), false).squeeze_dim(-1)
            }
            Self::DiagGaussian { mu, sigma } => {
                let nll = (actions - mu).square() / (sigma.square() * 2.0)
                    + sigma.log()
                    + 0.5 * LN_2PI;
                (-nll).sum_dim_intlist(-1, false, Kind::Float)
            }
        }
    }

    /// Distribution entropy, shape [batch]
    pub fn entropy(&self) -> Tensor {
        match self {
            Self::Categorical { logits } => {
                let log_probs = logits.log_softmax(-1, Kind::Float);
                let probs = log_probs.exp();
                -(probs * log_probs).sum_dim_intlist(-1, false, Kind::Float)
            }
            Self::DiagGaussian { sigma, .. } => {
                (sigma.log() + 0.5 * (1.0 + LN_2PI)).sum_dim_intlist(-1, false, Kind::Float)
            }
        }
    }
}
