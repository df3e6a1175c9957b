//! Shared RMSProp optimizer
//!
//! The adaptive per-parameter state (running squared-gradient average) lives
//! in its own variable store with the same lifetime and sharing as the
//! global parameters. Every worker builds a cheap per-thread handle holding
//! shallow tensor references into the same storage, so concurrent `step`
//! calls write the shared parameters without any lock. Interleavings are
//! accepted, the Hogwild trade.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use tch::{nn, Tensor};

/// Default smoothing constant for the squared-gradient average
const ALPHA: f64 = 0.99;

/// Denominator fuzz keeping the update finite for tiny averages
const EPS: f64 = 1e-8;

/// RMSProp over globally shared parameters
///
/// Created once by the coordinator; cloned handles are taken per worker
/// thread via [`SharedRmsProp::handle`].
#[derive(Debug)]
pub struct SharedRmsProp {
    lr: f64,
    alpha: f64,
    eps: f64,
    params: Arc<nn::VarStore>,
    state: Arc<nn::VarStore>,
}

/// Per-thread view into the shared parameters and optimizer state
#[derive(Debug)]
pub struct RmsPropHandle {
    lr: f64,
    alpha: f64,
    eps: f64,
    slots: Vec<Slot>,
}

#[derive(Debug)]
struct Slot {
    name: String,
    param: Tensor,
    square_avg: Tensor,
}

/// Create a zero tensor in `state` mirroring a parameter name like
/// `tower.weight`; tch paths reject dots, so walk the components.
fn mirror_slot(state: &nn::VarStore, name: &str, shape: &[i64]) -> Tensor {
    let mut parts: Vec<&str> = name.split('.').collect();
    let leaf = parts.pop().unwrap_or(name);
    let mut path = state.root();
    for part in parts {
        path = path / part;
    }
    path.zeros_no_train(leaf, shape)
}

impl SharedRmsProp {
    /// Allocate shared optimizer state for every parameter in `params`
    pub fn new(params: Arc<nn::VarStore>, lr: f64) -> Self {
        let state = nn::VarStore::new(params.device());
        for (name, tensor) in params.variables() {
            mirror_slot(&state, &name, &tensor.size());
        }

        Self { lr, alpha: ALPHA, eps: EPS, params, state: Arc::new(state) }
    }

    /// Build a per-thread handle with shallow references into the shared
    /// parameters and state
    pub fn handle(&self) -> Result<RmsPropHandle> {
        let state_vars = self.state.variables();
        let mut slots = Vec::new();

        for (name, param) in self.params.variables() {
            let square_avg = state_vars
                .get(&name)
                .with_context(|| format!("missing optimizer state for parameter '{}'", name))?
                .shallow_clone();
            slots.push(Slot { name, param, square_avg });
        }
        slots.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(RmsPropHandle { lr: self.lr, alpha: self.alpha, eps: self.eps, slots })
    }
}

impl RmsPropHandle {
    /// Apply one RMSProp update from locally computed gradients
    ///
    /// `grads` maps parameter names to gradient tensors. Parameters without
    /// a gradient entry are left untouched. A shape mismatch aborts the
    /// whole update before any shared state is written.
    ///
    /// ```text
    /// avg ← α * avg + (1 - α) * g²
    /// p   ← p - lr * g / (sqrt(avg) + ε)
    /// ```
    pub fn step(&mut self, grads: &HashMap<String, Tensor>) -> Result<()> {
        for slot in &self.slots {
            if let Some(grad) = grads.get(&slot.name) {
                ensure!(
                    grad.size() == slot.param.size(),
                    "gradient shape {:?} does not match parameter '{}' shape {:?}",
                    grad.size(),
                    slot.name,
                    slot.param.size()
                );
            }
        }

        tch::no_grad(|| {
            for slot in &mut self.slots {
                let Some(grad) = grads.get(&slot.name) else {
                    continue;
                };
                let avg = &slot.square_avg * self.alpha + (grad * grad) * (1.0 - self.alpha);
                slot.square_avg.copy_(&avg);

                let update = grad / (slot.square_avg.sqrt() + self.eps) * self.lr;
                let next = &slot.param - update;
                slot.param.copy_(&next);
            }
        });
        Ok(())
    }

    /// Names of the parameters this handle updates, sorted
    pub fn param_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }
}
