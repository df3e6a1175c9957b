//! Trajectory buffer and return/advantage computation
//!
//! Workers accumulate one bounded trajectory per rollout, then compute
//! discounted returns and a GAE-style advantage backwards through it.
//!
//! # Mathematical Formula
//!
//! ```text
//! R_t = r_t + γ * R_{t+1}                 (returns, seeded with bootstrap)
//! δ_t = r_t + γ * V_{t+1} - V_t           (temporal difference error)
//! A_t = δ_t + γ * τ * A_{t+1}             (GAE advantage)
//! ```

use tch::Tensor;

/// One rollout's worth of per-step records
///
/// Values, log-probabilities, and entropies stay attached to the local
/// network's autograd graph so the loss can backpropagate through them;
/// rewards are plain scalars.
#[derive(Debug, Default)]
pub struct Trajectory {
    values: Vec<Tensor>,
    log_probs: Vec<Tensor>,
    entropies: Vec<Tensor>,
    rewards: Vec<f32>,
}

impl Trajectory {
    /// Create an empty trajectory
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one environment step
    pub fn push(&mut self, value: Tensor, log_prob: Tensor, entropy: Tensor, reward: f32) {
        self.values.push(value);
        self.log_probs.push(log_prob);
        self.entropies.push(entropy);
        self.rewards.push(reward);
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Whether the trajectory is empty
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Clear all buffers for the next rollout
    pub fn clear(&mut self) {
        self.values.clear();
        self.log_probs.clear();
        self.entropies.clear();
        self.rewards.clear();
    }

    /// Recorded rewards
    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// Value estimate at step `t`, still attached to the graph
    pub fn value(&self, t: usize) -> &Tensor {
        &self.values[t]
    }

    /// Log-probability of the action taken at step `t`
    pub fn log_prob(&self, t: usize) -> &Tensor {
        &self.log_probs[t]
    }

    /// Distribution entropy at step `t`
    pub fn entropy(&self, t: usize) -> &Tensor {
        &self.entropies[t]
    }

    /// Value estimates detached into plain scalars, for the advantage
    /// recurrence
    pub fn detached_values(&self) -> Vec<f32> {
        self.values.iter().map(|v| v.detach().double_value(&[]) as f32).collect()
    }
}

/// Terminal value used to seed the backward recurrences
///
/// Zero when the rollout ended in episode termination; the network's own
/// estimate of the final (unterminated) observation otherwise.
pub fn bootstrap_value(rollout_done: bool, terminal_value: f32) -> f32 {
    if rollout_done {
        0.0
    } else {
        terminal_value
    }
}

/// Discounted returns, computed backwards and seeded with the bootstrap
pub fn compute_returns(rewards: &[f32], bootstrap: f32, gamma: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running = bootstrap;

    for t in (0..rewards.len()).rev() {
        running = rewards[t] + gamma * running;
        returns[t] = running;
    }
    returns
}

/// GAE advantages from one-step TD residuals with trace decay `tau`
///
/// `values` are the trajectory's (detached) value estimates; the bootstrap
/// plays the role of V_{L} for the final step.
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    bootstrap: f32,
    gamma: f32,
    tau: f32,
) -> Vec<f32> {
    debug_assert_eq!(rewards.len(), values.len(), "rewards/values length mismatch");

    let mut advantages = vec![0.0; rewards.len()];
    let mut gae = 0.0;

    for t in (0..rewards.len()).rev() {
        let next_value = if t == rewards.len() - 1 { bootstrap } else { values[t + 1] };
        let delta = rewards[t] + gamma * next_value - values[t];
        gae = delta + gamma * tau * gae;
        advantages[t] = gae;
    }
    advantages
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn scalar(v: f32) -> Tensor {
        Tensor::from(v)
    }

    #[test]
    fn test_returns_empty_trajectory() {
        let returns = compute_returns(&[], 5.0, 0.99);
        assert!(returns.is_empty());
    }

    #[test]
    fn test_returns_single_step() {
        let returns = compute_returns(&[2.0], 10.0, 0.9);
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - (2.0 + 0.9 * 10.0)).abs() < 1e-6);
    }

    #[test]
    fn test_returns_recurrence_law() {
        // R_t = r_t + gamma * R_{t+1} must hold at every step
        let rewards = [1.0, -0.5, 2.0, 0.0, 3.0];
        let gamma = 0.95;
        let bootstrap = 4.0;
        let returns = compute_returns(&rewards, bootstrap, gamma);

        for t in 0..rewards.len() - 1 {
            assert!(
                (returns[t] - (rewards[t] + gamma * returns[t + 1])).abs() < 1e-5,
                "recurrence violated at step {}",
                t
            );
        }
        assert!((returns[4] - (rewards[4] + gamma * bootstrap)).abs() < 1e-5);
    }

    #[test]
    fn test_bootstrap_zero_on_termination() {
        assert_eq!(bootstrap_value(true, 7.5), 0.0);
    }

    #[test]
    fn test_bootstrap_uses_value_estimate_otherwise() {
        assert_eq!(bootstrap_value(false, 7.5), 7.5);
    }

    #[test]
    fn test_gae_matches_manual_computation() {
        let rewards = [1.0, 1.0];
        let values = [0.5, 0.25];
        let gamma = 0.9;
        let tau = 0.8;
        let bootstrap = 2.0;

        let advantages = compute_gae(&rewards, &values, bootstrap, gamma, tau);

        let delta1 = 1.0 + gamma * bootstrap - 0.25;
        let delta0 = 1.0 + gamma * 0.25 - 0.5;
        assert!((advantages[1] - delta1).abs() < 1e-5);
        assert!((advantages[0] - (delta0 + gamma * tau * delta1)).abs() < 1e-5);
    }

    #[test]
    fn test_gae_with_tau_one_telescopes_to_returns() {
        // With tau = 1 the GAE sums telescope: A_t = R_t - V_t
        let rewards = [1.0, 0.5, 2.0];
        let values = [0.2, 0.4, 0.6];
        let gamma = 0.99;
        let bootstrap = 1.5;

        let advantages = compute_gae(&rewards, &values, bootstrap, gamma, 1.0);
        let returns = compute_returns(&rewards, bootstrap, gamma);

        for t in 0..rewards.len() {
            assert!(
                (advantages[t] - (returns[t] - values[t])).abs() < 1e-4,
                "telescoping identity violated at step {}",
                t
            );
        }
    }

    #[test]
    fn test_trajectory_push_and_clear() {
        let mut traj = Trajectory::new();
        assert!(traj.is_empty());

        traj.push(scalar(0.5), scalar(-0.7), scalar(0.69), 1.0);
        traj.push(scalar(0.6), scalar(-0.2), scalar(0.65), -1.0);

        assert_eq!(traj.len(), 2);
        assert_eq!(traj.rewards(), &[1.0, -1.0]);
        assert_eq!(traj.detached_values(), vec![0.5, 0.6]);

        traj.clear();
        assert!(traj.is_empty());
        assert_eq!(traj.len(), 0);
    }

    #[test]
    fn test_detached_values_do_not_require_grad() {
        let vs = tch::nn::VarStore::new(Device::Cpu);
        let w = vs.root().ones("w", &[1]);
        let value = (&w * 2.0).sum(Kind::Float);

        let mut traj = Trajectory::new();
        traj.push(value, scalar(0.0), scalar(0.0), 1.0);
        assert_eq!(traj.detached_values(), vec![2.0]);
    }
}
