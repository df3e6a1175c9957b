//! A3C coordinator
//!
//! Owns the global network parameters, the shared optimizer, the shared
//! step counter, and the cooperative cancellation token. `run()` spawns one
//! evaluation worker plus N training workers and blocks until all of them
//! finish; `stop()` trips the cancellation token and resets the
//! coordinator's bookkeeping.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::unbounded;
use tch::{nn, Device};

use crate::env::{self, DynEnv, SpaceType};
use crate::policy::{ActorCriticNet, HeadSpec};
use crate::train::a3c::{
    config::A3CConfig, optimizer::SharedRmsProp, stats::RolloutStats, worker::Worker,
};

/// Factory producing one private environment instance per worker
pub type EnvFactory = Arc<dyn Fn() -> Result<DynEnv> + Send + Sync>;

/// Cloneable handle onto the coordinator's cancellation token
///
/// `run()` blocks the coordinator, so cancelling an in-flight run requires a
/// handle taken beforehand and tripped from another thread.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request cooperative shutdown; workers observe the token at every
    /// rollout iteration
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

/// Abnormal worker termination collected by the coordinator
#[derive(Debug, Clone)]
pub struct WorkerError {
    /// Id of the worker that terminated
    pub worker_id: usize,

    /// Rendered error or panic message
    pub message: String,
}

/// Outcome of one `run()` invocation
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Final value of the shared global step counter
    pub global_steps: u64,

    /// Environment steps reported per training worker, indexed by worker id
    pub worker_steps: Vec<u64>,

    /// Episode returns observed by the evaluation worker
    pub eval_returns: Vec<f32>,

    /// Workers that terminated abnormally
    pub worker_errors: Vec<WorkerError>,
}

/// A3C trainer/coordinator
pub struct A3C {
    config: A3CConfig,
    env_factory: EnvFactory,
    global_steps: Arc<AtomicU64>,
    stop_flag: Arc<AtomicBool>,
    workers: Vec<usize>,
}

impl A3C {
    /// Create a coordinator resolving the environment through the registry
    pub fn new(config: A3CConfig) -> Result<Self> {
        let name = config.env_name.clone();
        Self::with_env_factory(config, Arc::new(move || env::make(&name)))
    }

    /// Create a coordinator with a custom environment factory
    ///
    /// Used by tests and by callers with unregistered environments; the
    /// factory is invoked once per worker.
    pub fn with_env_factory(config: A3CConfig, env_factory: EnvFactory) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            env_factory,
            global_steps: Arc::new(AtomicU64::new(0)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        })
    }

    /// Current value of the shared global step counter
    pub fn global_steps(&self) -> u64 {
        self.global_steps.load(Ordering::Relaxed)
    }

    /// Ids of the workers spawned by the most recent `run()`
    pub fn workers(&self) -> &[usize] {
        &self.workers
    }

    /// Handle for cancelling a run from another thread
    ///
    /// Handles stay bound to this coordinator across runs; `run()` re-arms
    /// the underlying token on entry.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { flag: self.stop_flag.clone() }
    }

    /// Resolve observation dimensionality and policy head from a probe
    /// environment, failing fast on configuration mismatches
    fn resolve_spaces(&self, probe: &DynEnv) -> Result<(i64, HeadSpec)> {
        let obs_dim = probe.observation_space().num_elements() as i64;
        let action_space = probe.action_space();

        let head = match (action_space.dtype, self.config.is_discrete) {
            (SpaceType::Discrete(n), true) => HeadSpec::Discrete { n_actions: n as i64 },
            (SpaceType::Continuous, false) => {
                HeadSpec::Continuous { action_dim: action_space.num_elements() as i64 }
            }
            (SpaceType::Discrete(_), false) => bail!(
                "environment '{}' has a discrete action space but is_discrete is false",
                self.config.env_name
            ),
            (SpaceType::Continuous, true) => bail!(
                "environment '{}' has a continuous action space but is_discrete is true",
                self.config.env_name
            ),
        };
        Ok((obs_dim, head))
    }

    /// Initialize global state, spawn all workers, and block until they
    /// finish
    ///
    /// The evaluation worker gets id `n_worker`; training workers get ids
    /// `0..n_worker`. Abnormal worker terminations are collected into the
    /// summary rather than failing the whole run.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.config.validate()?;
        tch::manual_seed(self.config.seed);

        // Fail fast on environment/config problems before any spawn
        let probe = (self.env_factory)()?;
        let (obs_dim, head) = self.resolve_spaces(&probe)?;
        drop(probe);

        // Global parameters and shared optimizer, both in cross-worker
        // shared memory
        let global = {
            let vs = nn::VarStore::new(Device::Cpu);
            let _net = ActorCriticNet::new(&vs.root(), obs_dim, head);
            Arc::new(vs)
        };
        let optimizer = Arc::new(SharedRmsProp::new(global.clone(), self.config.lr));

        // Re-arm the cancellation token; handles taken via `stop_handle()`
        // keep pointing at the same token
        self.stop_flag.store(false, Ordering::Relaxed);
        let (stats_tx, stats_rx) = unbounded::<RolloutStats>();

        let n_worker = self.config.n_worker;
        let mut train_handles: Vec<(usize, JoinHandle<Result<()>>)> = Vec::new();
        let mut eval_handle: Option<(usize, JoinHandle<Result<()>>)> = None;
        self.workers.clear();

        // Build every environment up front so a factory failure surfaces
        // before any thread is spawned
        let mut envs: Vec<DynEnv> = Vec::with_capacity(n_worker + 1);
        for _ in 0..=n_worker {
            envs.push((self.env_factory)()?);
        }

        // Evaluation worker first, for live progress monitoring
        for worker_id in (0..=n_worker).rev() {
            let is_train = worker_id < n_worker;
            let env = envs.pop().expect("one environment per worker");
            let worker = Worker::new(
                worker_id,
                is_train,
                self.config.worker.clone(),
                self.config.max_steps,
                obs_dim,
                head,
                env,
                global.clone(),
                is_train.then(|| optimizer.clone()),
                self.global_steps.clone(),
                self.stop_flag.clone(),
                stats_tx.clone(),
            )?;

            let handle = std::thread::Builder::new()
                .name(format!("a3c-worker-{}", worker_id))
                .spawn(move || worker.run())
                .map_err(|e| anyhow!("failed to spawn worker {}: {}", worker_id, e))?;

            tracing::info!(worker_id, is_train, "worker spawned");
            self.workers.push(worker_id);
            if is_train {
                train_handles.push((worker_id, handle));
            } else {
                eval_handle = Some((worker_id, handle));
            }
        }
        drop(stats_tx);

        // Once every training worker has exited the counter can no longer
        // advance, so trip the token to release the evaluation worker.
        // Without this, training workers all dying abnormally would leave
        // the evaluation worker looping and the stats drain below open
        // forever.
        let monitor = {
            let stop_flag = self.stop_flag.clone();
            std::thread::Builder::new()
                .name("a3c-monitor".to_string())
                .spawn(move || {
                    let outcomes: Vec<_> = train_handles
                        .into_iter()
                        .map(|(worker_id, handle)| (worker_id, handle.join()))
                        .collect();
                    stop_flag.store(true, Ordering::Relaxed);
                    outcomes
                })
                .map_err(|e| anyhow!("failed to spawn monitor thread: {}", e))?
        };

        // Drain statistics until every worker has hung up its sender
        let mut summary = RunSummary {
            worker_steps: vec![0; n_worker + 1],
            ..Default::default()
        };
        for stats in stats_rx {
            if stats.is_train {
                summary.worker_steps[stats.worker_id] += stats.steps;
            }
            if let Some(ret) = stats.episode_return {
                if stats.is_train {
                    tracing::debug!(worker_id = stats.worker_id, episode_return = ret, "episode");
                } else {
                    summary.eval_returns.push(ret);
                    tracing::info!(episode_return = ret, "evaluation episode");
                }
            }
        }

        // Workers may have terminated abnormally; join must still return
        let train_outcomes = monitor
            .join()
            .map_err(|_| anyhow!("worker monitor thread panicked"))?;
        for (worker_id, joined) in train_outcomes {
            Self::collect_outcome(&mut summary, worker_id, joined);
        }
        if let Some((worker_id, handle)) = eval_handle {
            Self::collect_outcome(&mut summary, worker_id, handle.join());
        }

        summary.global_steps = self.global_steps();
        Ok(summary)
    }

    fn collect_outcome(
        summary: &mut RunSummary,
        worker_id: usize,
        joined: std::thread::Result<Result<()>>,
    ) {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(worker_id, error = %e, "worker terminated abnormally");
                summary.worker_errors.push(WorkerError { worker_id, message: e.to_string() });
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                tracing::warn!(worker_id, error = %message, "worker panicked");
                summary.worker_errors.push(WorkerError { worker_id, message });
            }
        }
    }

    /// Cooperative shutdown and bookkeeping reset
    ///
    /// Trips the cancellation token checked by every worker at each rollout
    /// iteration, clears the worker list, and zeroes the global step
    /// counter. `run()` borrows the coordinator exclusively, so cancelling
    /// an in-flight run goes through a [`StopHandle`] taken beforehand;
    /// `stop` is for resetting between runs.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.workers.clear();
        self.global_steps.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(A3C::new(A3CConfig::new("CartPole-v1", 0)).is_err());
    }

    #[test]
    fn test_run_rejects_unknown_environment() {
        let mut a3c = A3C::new(A3CConfig::new("NoSuchEnv-v3", 1).max_steps(10)).unwrap();
        let err = a3c.run().unwrap_err();
        assert!(err.to_string().contains("unknown environment"));
    }

    #[test]
    fn test_run_rejects_action_space_mismatch() {
        // CartPole is discrete; claiming continuous must fail before spawn
        let mut a3c = A3C::new(
            A3CConfig::new("CartPole-v1", 1).is_discrete(false).max_steps(10),
        )
        .unwrap();
        let err = a3c.run().unwrap_err();
        assert!(err.to_string().contains("discrete action space"));

        // And the converse for the continuous swing-up
        let mut a3c = A3C::new(
            A3CConfig::new("CartSwingUp-v0", 1).is_discrete(true).max_steps(10),
        )
        .unwrap();
        let err = a3c.run().unwrap_err();
        assert!(err.to_string().contains("continuous action space"));
    }

    #[test]
    fn test_stop_handle_shares_the_cancellation_token() {
        let a3c = A3C::new(A3CConfig::new("CartPole-v1", 1).is_discrete(true)).unwrap();
        let handle = a3c.stop_handle();

        handle.stop();
        assert!(a3c.stop_flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_stop_resets_bookkeeping() {
        let mut a3c = A3C::new(A3CConfig::new("CartPole-v1", 2).is_discrete(true)).unwrap();
        a3c.global_steps.store(42, Ordering::Relaxed);
        a3c.workers = vec![0, 1, 2];

        a3c.stop();

        assert_eq!(a3c.global_steps(), 0);
        assert!(a3c.workers().is_empty());
    }
}
