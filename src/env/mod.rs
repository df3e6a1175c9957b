//! Environment traits and implementations
//!
//! This module defines the core environment interface, the registry used to
//! construct environments by name, and the `GentlyTerminating` safety
//! wrapper applied to every registered environment.

use anyhow::{bail, Result};

/// Core trait for RL environments
pub trait Environment {
    /// Observation type
    type Observation;

    /// Action type
    type Action;

    /// Reset the environment and return initial observation
    fn reset(&mut self) -> Result<Self::Observation>;

    /// Step the environment with an action
    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>>;

    /// Get the observation space dimensions
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space dimensions
    fn action_space(&self) -> SpaceInfo;
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult<O> {
    /// Next observation
    pub observation: O,

    /// Reward received
    pub reward: f32,

    /// Whether the episode terminated
    pub terminated: bool,

    /// Whether the episode was truncated
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

/// Space information for observations and actions
#[derive(Debug, Clone)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub dtype: SpaceType,

    /// Lower/upper bounds for continuous spaces, `None` when unbounded or
    /// discrete
    pub bounds: Option<(f32, f32)>,
}

impl SpaceInfo {
    /// Total number of scalar elements in the space
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product::<usize>().max(1)
    }
}

/// Space data types
#[derive(Debug, Clone, Copy)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space (Box)
    Continuous,
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    // Add custom fields as needed
}

/// An action in either a discrete or a continuous action space
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Index into a finite action set
    Discrete(i64),

    /// Continuous control vector
    Continuous(Vec<f32>),
}

/// Boxed environment with the observation/action types the trainer works with
pub type DynEnv = Box<dyn Environment<Observation = Vec<f32>, Action = Action> + Send>;

/// Construct a registered environment by name, wrapped in
/// [`GentlyTerminating`].
///
/// Registered names:
/// - `"CartPole-v1"`: discrete cart-pole balancing
/// - `"CartSwingUp-v0"`: continuous cart-pole swing-up (±24 N force)
pub fn make(name: &str) -> Result<DynEnv> {
    match name {
        "CartPole-v1" => Ok(Box::new(GentlyTerminating::new(cartpole::CartPole::new()))),
        "CartSwingUp-v0" => {
            Ok(Box::new(GentlyTerminating::new(cartpole_swingup::CartSwingUp::new())))
        }
        _ => bail!(
            "unknown environment '{}', registered environments are CartPole-v1 and CartSwingUp-v0",
            name
        ),
    }
}

/// Safety wrapper that terminates episodes gracefully
///
/// Clamps continuous actions into the action space bounds before forwarding
/// them, and converts non-finite observations into a graceful episode
/// termination instead of letting a degenerate state propagate into the
/// policy network.
#[derive(Debug)]
pub struct GentlyTerminating<E> {
    inner: E,
    last_obs: Vec<f32>,
}

impl<E> GentlyTerminating<E>
where
    E: Environment<Observation = Vec<f32>, Action = Action>,
{
    /// Wrap an environment
    pub fn new(inner: E) -> Self {
        Self { inner, last_obs: Vec::new() }
    }

    fn clamp_action(&self, action: Action) -> Action {
        match action {
            Action::Continuous(v) => {
                let (low, high) =
                    self.inner.action_space().bounds.unwrap_or((f32::NEG_INFINITY, f32::INFINITY));
                Action::Continuous(v.into_iter().map(|a| a.clamp(low, high)).collect())
            }
            discrete => discrete,
        }
    }
}

impl<E> Environment for GentlyTerminating<E>
where
    E: Environment<Observation = Vec<f32>, Action = Action>,
{
    type Observation = Vec<f32>;
    type Action = Action;

    fn reset(&mut self) -> Result<Self::Observation> {
        let obs = self.inner.reset()?;
        self.last_obs = obs.clone();
        Ok(obs)
    }

    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>> {
        let action = self.clamp_action(action);
        let mut result = self.inner.step(action)?;

        if result.observation.iter().any(|v| !v.is_finite()) {
            // end the episode from the last sane state
            result.observation = self.last_obs.clone();
            result.reward = 0.0;
            result.terminated = true;
        } else {
            self.last_obs = result.observation.clone();
        }
        Ok(result)
    }

    fn observation_space(&self) -> SpaceInfo {
        self.inner.observation_space()
    }

    fn action_space(&self) -> SpaceInfo {
        self.inner.action_space()
    }
}

pub mod cartpole;
pub mod cartpole_swingup;
