//! A3C worker
//!
//! Each worker owns a private environment instance and a private local copy
//! of the network, and loops through SYNC → ROLLOUT → UPDATE:
//!
//! 1. **SYNC**: copy the current global parameters into the local network.
//! 2. **ROLLOUT**: up to `t_max` steps, forward the local network, sample an
//!    action, step the environment, record (value, log-prob, entropy,
//!    reward). Training workers increment the shared global step counter on
//!    every step.
//! 3. **UPDATE** (training workers only): bootstrap the terminal value,
//!    compute returns and GAE advantages, form the actor-critic loss,
//!    backpropagate through the local copy, and push the gradients through
//!    the shared optimizer into the global parameters.
//!
//! The evaluation worker runs the same rollout logic but never updates; it
//! reports episode returns for progress monitoring.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use anyhow::{bail, Result};
use crossbeam_channel::Sender;
use tch::{nn, Device, Tensor};

use crate::env::{Action, DynEnv};
use crate::policy::{ActorCriticNet, HeadSpec};
use crate::train::a3c::{
    config::WorkerConfig,
    optimizer::{RmsPropHandle, SharedRmsProp},
    rollout::{bootstrap_value, compute_gae, compute_returns, Trajectory},
    stats::RolloutStats,
};

/// One independently scheduled A3C worker
pub struct Worker {
    /// Worker id; the evaluation worker uses id `n_worker`
    pub worker_id: usize,

    /// Whether this worker computes gradients and updates the global model
    pub is_train: bool,

    config: WorkerConfig,
    max_steps: u64,
    obs_dim: i64,
    head: HeadSpec,
    env: DynEnv,
    global: Arc<nn::VarStore>,
    optimizer: Option<Arc<SharedRmsProp>>,
    global_steps: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    stats: Sender<RolloutStats>,
}

impl Worker {
    /// Create a worker; training workers must carry the shared optimizer
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: usize,
        is_train: bool,
        config: WorkerConfig,
        max_steps: u64,
        obs_dim: i64,
        head: HeadSpec,
        env: DynEnv,
        global: Arc<nn::VarStore>,
        optimizer: Option<Arc<SharedRmsProp>>,
        global_steps: Arc<AtomicU64>,
        stop: Arc<AtomicBool>,
        stats: Sender<RolloutStats>,
    ) -> Result<Self> {
        if is_train && optimizer.is_none() {
            bail!("training worker {} constructed without a shared optimizer", worker_id);
        }

        Ok(Self {
            worker_id,
            is_train,
            config,
            max_steps,
            obs_dim,
            head,
            env,
            global,
            optimizer,
            global_steps,
            stop,
            stats,
        })
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
            || self.global_steps.load(Ordering::Relaxed) >= self.max_steps
    }

    fn obs_tensor(&self, obs: &[f32]) -> Tensor {
        Tensor::from_slice(obs).view([1, self.obs_dim])
    }

    fn action_from_sample(&self, sample: &Tensor) -> Result<Action> {
        match self.head {
            HeadSpec::Discrete { .. } => Ok(Action::Discrete(i64::try_from(sample)?)),
            HeadSpec::Continuous { .. } => {
                Ok(Action::Continuous(Vec::<f32>::try_from(sample.squeeze_dim(0))?))
            }
        }
    }

    /// Run the worker loop until cancelled or the global budget is reached
    pub fn run(mut self) -> Result<()> {
        tracing::info!(
            worker_id = self.worker_id,
            is_train = self.is_train,
            "worker starting"
        );

        let mut local_vs = nn::VarStore::new(Device::Cpu);
        let net = ActorCriticNet::new(&local_vs.root(), self.obs_dim, self.head);

        let mut optimizer = match &self.optimizer {
            Some(shared) => Some(shared.handle()?),
            None => None,
        };

        let mut traj = Trajectory::new();
        let mut obs = self.env.reset()?;
        let mut episode_return = 0.0f32;

        while !self.should_stop() {
            // SYNC: refresh the local copy from the global parameters.
            // Reads may race with other workers' writes; the resulting mix
            // of old and new values is acceptable here.
            local_vs.copy(&self.global)?;

            // ROLLOUT
            traj.clear();
            let mut rollout_steps = 0u64;
            let mut rollout_done = false;
            let mut finished_return = None;

            for _ in 0..self.config.t_max {
                if self.stop.load(Ordering::Relaxed) {
                    break;
                }

                let obs_t = self.obs_tensor(&obs);
                let (value, dist) = net.forward_t(&obs_t, self.is_train);
                let sample = dist.sample();
                let log_prob = dist.log_prob(&sample).squeeze();
                let entropy = dist.entropy().squeeze();
                let action = self.action_from_sample(&sample)?;

                let step = self.env.step(action)?;
                traj.push(value.squeeze(), log_prob, entropy, step.reward);
                episode_return += step.reward;
                obs = step.observation;
                rollout_steps += 1;

                if self.is_train {
                    self.global_steps.fetch_add(1, Ordering::Relaxed);
                }

                if step.terminated || step.truncated {
                    rollout_done = true;
                    finished_return = Some(episode_return);
                    break;
                }
            }

            // Return computation: bootstrap 0 on termination, otherwise the
            // local network's estimate of the final observation.
            let terminal_value = if rollout_done {
                0.0
            } else {
                let obs_t = self.obs_tensor(&obs);
                let (value, _dist) = net.forward_t(&obs_t, self.is_train);
                value.squeeze().detach().double_value(&[]) as f32
            };
            let bootstrap = bootstrap_value(rollout_done, terminal_value);

            // UPDATE
            let (policy_loss, value_loss) = match (&mut optimizer, traj.is_empty()) {
                (Some(opt), false) => {
                    let (p, v) = self.update(&local_vs, &traj, bootstrap, opt)?;
                    (Some(p), Some(v))
                }
                _ => (None, None),
            };

            let _ = self.stats.send(RolloutStats {
                worker_id: self.worker_id,
                is_train: self.is_train,
                steps: rollout_steps,
                episode_return: finished_return,
                policy_loss,
                value_loss,
            });

            if rollout_done {
                episode_return = 0.0;
                obs = self.env.reset()?;
            }
        }

        tracing::info!(worker_id = self.worker_id, "worker finished");
        Ok(())
    }

    /// Actor-critic loss, backward pass, and shared optimizer step
    ///
    /// ```text
    /// value loss  = Σ 0.5 * (R_t - V_t)²
    /// policy loss = -Σ log π(a_t) * A_t - β * Σ H_t
    /// total       = policy loss + c_v * value loss
    /// ```
    fn update(
        &self,
        local_vs: &nn::VarStore,
        traj: &Trajectory,
        bootstrap: f32,
        optimizer: &mut RmsPropHandle,
    ) -> Result<(f64, f64)> {
        let returns = compute_returns(traj.rewards(), bootstrap, self.config.gamma);
        let advantages = compute_gae(
            traj.rewards(),
            &traj.detached_values(),
            bootstrap,
            self.config.gamma,
            self.config.tau,
        );

        let mut policy_loss = Tensor::from(0.0f32);
        let mut value_loss = Tensor::from(0.0f32);

        for t in 0..traj.len() {
            value_loss = value_loss + (traj.value(t) - returns[t] as f64).square() * 0.5;
            policy_loss = policy_loss
                - traj.log_prob(t) * advantages[t] as f64
                - traj.entropy(t) * self.config.beta;
        }

        let total = &policy_loss + &value_loss * self.config.value_loss_coef;

        // Fresh gradients for this rollout
        for (_name, var) in local_vs.variables() {
            let mut grad = var.grad();
            if grad.defined() {
                let _ = grad.zero_();
            }
        }
        total.backward();

        // Transfer the local gradients onto the global parameters through
        // the shared optimizer
        let grads: HashMap<String, Tensor> = local_vs
            .variables()
            .into_iter()
            .filter_map(|(name, var)| {
                let grad = var.grad();
                grad.defined().then(|| (name, grad))
            })
            .collect();
        optimizer.step(&grads)?;

        Ok((
            policy_loss.detach().double_value(&[]),
            value_loss.detach().double_value(&[]),
        ))
    }
}
