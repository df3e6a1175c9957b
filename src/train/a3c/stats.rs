//! Per-rollout statistics reported by workers
//!
//! Workers send one message per rollout over a crossbeam channel; the
//! coordinator drains the channel while waiting for workers to finish and
//! logs progress from it.

/// Statistics for a single worker rollout
#[derive(Debug, Clone)]
pub struct RolloutStats {
    /// Id of the reporting worker; the evaluation worker uses id `n_worker`
    pub worker_id: usize,

    /// Whether the reporting worker trains (the evaluation worker does not)
    pub is_train: bool,

    /// Environment steps taken during this rollout
    pub steps: u64,

    /// Total return of a finished episode, when one ended during the rollout
    pub episode_return: Option<f32>,

    /// Policy loss of the update following this rollout (training only)
    pub policy_loss: Option<f64>,

    /// Value loss of the update following this rollout (training only)
    pub value_loss: Option<f64>,
}
