//! Policy/value network for A3C
//!
//! A single hidden tower feeds two heads: a scalar state-value estimate and
//! an action-distribution head. The policy head is either a logits layer
//! (discrete control) or a mu/sigma pair (continuous control); the mean is
//! squashed to the ±24 actuator range and the spread is kept strictly
//! positive with a softplus plus a small floor.
//!
//! # Architecture
//!
//! ```text
//! Input (observations)
//!         |
//!    [Dense(100)]
//!         |
//!       ReLU
//!         |
//!   Dropout(0.5)          (training-mode forward passes only)
//!      /      \
//!  Policy    Value
//!  head      head
//!     |        |
//! logits or [Dense(1)]
//! mu/sigma     |
//!     |      Value
//! Distribution
//! ```

use tch::{
    nn::{self, Init, Module},
    Tensor,
};

use crate::policy::distribution::ActionDistribution;

/// Hidden tower width, after the single fully connected layer
const TOWER_DIM: i64 = 100;

/// Bound on the Gaussian action mean, the physical actuator range
const MU_BOUND: f64 = 24.0;

/// Additive floor keeping sigma away from a degenerate zero variance
const SIGMA_FLOOR: f64 = 1e-5;

/// Shape of the policy head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadSpec {
    /// Categorical head over `n_actions` discrete choices
    Discrete {
        /// Number of discrete actions
        n_actions: i64,
    },

    /// Diagonal-Gaussian head over an `action_dim`-dimensional control vector
    Continuous {
        /// Action dimensionality
        action_dim: i64,
    },
}

enum PolicyHead {
    Discrete(nn::Linear),
    Continuous { mu: nn::Linear, sigma: nn::Linear },
}

/// Actor-critic network with a shared tower and dual heads
pub struct ActorCriticNet {
    tower: nn::Linear,
    value_head: nn::Linear,
    policy_head: PolicyHead,
}

/// Linear layer with Xavier-normal weights and zero biases
fn xavier_linear(path: nn::Path, in_dim: i64, out_dim: i64) -> nn::Linear {
    let stdev = (2.0 / (in_dim + out_dim) as f64).sqrt();
    nn::linear(
        path,
        in_dim,
        out_dim,
        nn::LinearConfig {
            ws_init: Init::Randn { mean: 0.0, stdev },
            bs_init: Some(Init::Const(0.0)),
            ..Default::default()
        },
    )
}

impl ActorCriticNet {
    /// Build the network under the given variable-store path
    ///
    /// The same constructor is used for the global parameter instance and for
    /// every worker's local copy, so variable names line up for syncing and
    /// for the shared optimizer.
    pub fn new(root: &nn::Path, obs_dim: i64, head: HeadSpec) -> Self {
        let tower = xavier_linear(root / "tower", obs_dim, TOWER_DIM);
        let value_head = xavier_linear(root / "value", TOWER_DIM, 1);

        let policy_head = match head {
            HeadSpec::Discrete { n_actions } => {
                PolicyHead::Discrete(xavier_linear(root / "policy", TOWER_DIM, n_actions))
            }
            HeadSpec::Continuous { action_dim } => PolicyHead::Continuous {
                mu: xavier_linear(root / "mu", TOWER_DIM, action_dim),
                sigma: xavier_linear(root / "sigma", TOWER_DIM, action_dim),
            },
        };

        Self { tower, value_head, policy_head }
    }

    /// Forward pass: state values [batch] and the action distribution
    ///
    /// `train` enables the dropout regularization; evaluation passes leave
    /// all hidden units active.
    pub fn forward_t(&self, obs: &Tensor, train: bool) -> (Tensor, ActionDistribution) {
        let features = self.tower.forward(obs).relu().dropout(0.5, train);
        let values = self.value_head.forward(&features).squeeze_dim(-1);

        let dist = match &self.policy_head {
            PolicyHead::Discrete(actor) => {
                ActionDistribution::Categorical { logits: actor.forward(&features) }
            }
            PolicyHead::Continuous { mu, sigma } => ActionDistribution::DiagGaussian {
                mu: mu.forward(&features).tanh() * MU_BOUND,
                sigma: sigma.forward(&features).softplus() + SIGMA_FLOOR,
            },
        };

        (values, dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn net(head: HeadSpec) -> (nn::VarStore, ActorCriticNet) {
        let vs = nn::VarStore::new(Device::Cpu);
        let net = ActorCriticNet::new(&vs.root(), 4, head);
        (vs, net)
    }

    #[test]
    fn test_discrete_output_shapes() {
        let (_vs, net) = net(HeadSpec::Discrete { n_actions: 3 });
        let obs = Tensor::randn([8, 4], (Kind::Float, Device::Cpu));

        let (values, dist) = net.forward_t(&obs, false);
        assert_eq!(values.size(), vec![8]);

        match dist {
            ActionDistribution::Categorical { logits } => {
                assert_eq!(
                    logits.size(),
                    vec![8, 3],
                    "logits length must equal the action-space cardinality"
                );
            }
            _ => panic!("discrete head must produce a categorical distribution"),
        }
    }

    #[test]
    fn test_continuous_sigma_strictly_positive() {
        let (_vs, net) = net(HeadSpec::Continuous { action_dim: 2 });

        // Sweep benign and extreme finite inputs
        for scale in [0.0f32, 1.0, 100.0, 1e6] {
            let obs = Tensor::randn([16, 4], (Kind::Float, Device::Cpu)) * scale as f64;
            let (_values, dist) = net.forward_t(&obs, false);

            match dist {
                ActionDistribution::DiagGaussian { sigma, .. } => {
                    let min: f64 = sigma.min().try_into().unwrap();
                    assert!(min >= 1e-5, "sigma must be floored at 1e-5, got {}", min);
                }
                _ => panic!("continuous head must produce a Gaussian distribution"),
            }
        }
    }

    #[test]
    fn test_continuous_mu_bounded() {
        let (_vs, net) = net(HeadSpec::Continuous { action_dim: 2 });

        for scale in [0.0f32, 1.0, 100.0, 1e6] {
            let obs = Tensor::randn([16, 4], (Kind::Float, Device::Cpu)) * scale as f64;
            let (_values, dist) = net.forward_t(&obs, false);

            match dist {
                ActionDistribution::DiagGaussian { mu, .. } => {
                    let max: f64 = mu.abs().max().try_into().unwrap();
                    assert!(max <= 24.0 + 1e-4, "|mu| must stay within ±24, got {}", max);
                }
                _ => panic!("continuous head must produce a Gaussian distribution"),
            }
        }
    }

    #[test]
    fn test_eval_forward_is_deterministic() {
        let (_vs, net) = net(HeadSpec::Discrete { n_actions: 2 });
        let obs = Tensor::randn([4, 4], (Kind::Float, Device::Cpu));

        let (v1, _) = net.forward_t(&obs, false);
        let (v2, _) = net.forward_t(&obs, false);

        let diff: f64 = (&v1 - &v2).abs().max().try_into().unwrap();
        assert!(diff < 1e-6, "evaluation forward must not apply dropout");
    }

    #[test]
    fn test_identical_construction_syncs() {
        // Two stores built by the same constructor must be copyable, the
        // mechanism workers use to sync from the global parameters.
        let (src, src_net) = net(HeadSpec::Discrete { n_actions: 2 });
        let (mut dst, dst_net) = net(HeadSpec::Discrete { n_actions: 2 });

        dst.copy(&src).unwrap();

        let obs = Tensor::randn([4, 4], (Kind::Float, Device::Cpu));
        let (v_src, _) = src_net.forward_t(&obs, false);
        let (v_dst, _) = dst_net.forward_t(&obs, false);

        let diff: f64 = (&v_src - &v_dst).abs().max().try_into().unwrap();
        assert!(diff < 1e-6, "after copy, both networks must agree");
    }
}
