//! CartPole-v1 environment
//!
//! A classic reinforcement learning benchmark where a pole is balanced on a
//! cart. The goal is to prevent the pole from falling over by applying forces
//! to the cart.
//!
//! # Physics
//!
//! - State: [x, x_dot, theta, theta_dot] (cart position, cart velocity, pole
//!   angle, pole angular velocity)
//! - Actions: 0 (push left) or 1 (push right)
//! - Reward: +1 for each timestep the pole stays upright
//! - Termination: Pole angle > 12° or cart position > 2.4
//!
//! # Reference
//!
//! Based on OpenAI Gym CartPole-v1:
//! <https://github.com/openai/gym/blob/master/gym/envs/classic_control/cartpole.py>

use anyhow::{bail, Result};
use rand::Rng;

use crate::env::{Action, Environment, SpaceInfo, SpaceType, StepInfo, StepResult};

/// CartPole-v1 environment
///
/// A pole is attached to a cart moving along a frictionless track.
/// The goal is to balance the pole by applying forces to the cart.
#[derive(Debug)]
pub struct CartPole {
    // State variables
    x: f32,         // Cart position
    x_dot: f32,     // Cart velocity
    theta: f32,     // Pole angle (radians)
    theta_dot: f32, // Pole angular velocity

    // Episode tracking
    steps: usize,
    max_steps: usize,

    // Physics constants (matching Gym CartPole-v1)
    gravity: f32,
    mass_pole: f32,
    total_mass: f32,
    length: f32,           // Half-length of pole
    pole_mass_length: f32, // pole_mass * length
    force_mag: f32,
    dt: f32,

    // Thresholds
    theta_threshold: f32,
    x_threshold: f32,
}

impl CartPole {
    /// Create a new CartPole environment with default parameters
    ///
    /// Physics constants match OpenAI Gym CartPole-v1:
    /// - gravity = 9.8 m/s²
    /// - cart mass = 1.0 kg
    /// - pole mass = 0.1 kg
    /// - pole half-length = 0.5 m
    /// - force magnitude = 10.0 N
    /// - timestep = 0.02 s
    pub fn new() -> Self {
        let gravity = 9.8;
        let mass_cart = 1.0;
        let mass_pole = 0.1;
        let length = 0.5;

        Self {
            x: 0.0,
            x_dot: 0.0,
            theta: 0.0,
            theta_dot: 0.0,
            steps: 0,
            max_steps: 500,
            gravity,
            mass_pole,
            total_mass: mass_cart + mass_pole,
            length,
            pole_mass_length: mass_pole * length,
            force_mag: 10.0,
            dt: 0.02,
            theta_threshold: 12.0 * 2.0 * std::f32::consts::PI / 360.0,
            x_threshold: 2.4,
        }
    }

    /// Reset state to random initial conditions
    ///
    /// All state variables are initialized with small random perturbations
    /// around equilibrium (uniform distribution in [-0.05, 0.05])
    fn reset_state(&mut self) {
        let mut rng = rand::thread_rng();

        self.x = rng.gen_range(-0.05..0.05);
        self.x_dot = rng.gen_range(-0.05..0.05);
        self.theta = rng.gen_range(-0.05..0.05);
        self.theta_dot = rng.gen_range(-0.05..0.05);
    }

    /// Perform one physics simulation step using Euler integration
    ///
    /// Implements the cart-pole dynamics equations:
    /// ```text
    /// temp = (force + pole_mass_length * theta_dot² * sin(theta)) / total_mass
    /// theta_acc = (g * sin(theta) - cos(theta) * temp) /
    ///             (length * (4/3 - mass_pole * cos²(theta) / total_mass))
    /// x_acc = temp - pole_mass_length * theta_acc * cos(theta) / total_mass
    /// ```
    fn physics_step(&mut self, force: f32) {
        let cos_theta = self.theta.cos();
        let sin_theta = self.theta.sin();

        let temp = (force + self.pole_mass_length * self.theta_dot * self.theta_dot * sin_theta)
            / self.total_mass;
        let theta_acc = (self.gravity * sin_theta - cos_theta * temp)
            / (self.length
                * (4.0 / 3.0 - self.mass_pole * cos_theta * cos_theta / self.total_mass));
        let x_acc = temp - self.pole_mass_length * theta_acc * cos_theta / self.total_mass;

        // Euler integration
        self.x_dot += self.dt * x_acc;
        self.x += self.dt * self.x_dot;
        self.theta_dot += self.dt * theta_acc;
        self.theta += self.dt * self.theta_dot;
    }

    /// Check if episode should terminate
    ///
    /// Termination conditions:
    /// - Cart position exceeds ±2.4
    /// - Pole angle exceeds ±12°
    fn is_terminated(&self) -> bool {
        self.x.abs() > self.x_threshold || self.theta.abs() > self.theta_threshold
    }

    /// Get current observation [x, x_dot, theta, theta_dot]
    fn get_observation(&self) -> Vec<f32> {
        vec![self.x, self.x_dot, self.theta, self.theta_dot]
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for CartPole {
    type Observation = Vec<f32>;
    type Action = Action;

    fn reset(&mut self) -> Result<Self::Observation> {
        self.reset_state();
        self.steps = 0;
        Ok(self.get_observation())
    }

    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>> {
        // Convert action to force: 0 = push left (-10N), 1 = push right (+10N)
        let force = match action {
            Action::Discrete(1) => self.force_mag,
            Action::Discrete(0) => -self.force_mag,
            Action::Discrete(a) => bail!("CartPole action must be 0 or 1, got {}", a),
            Action::Continuous(_) => {
                bail!("CartPole has a discrete action space, got a continuous action")
            }
        };

        self.physics_step(force);
        self.steps += 1;

        let terminated = self.is_terminated();
        let truncated = self.steps >= self.max_steps;

        // Reward is 1.0 for each step the pole stays upright
        let reward = if terminated || truncated { 0.0 } else { 1.0 };

        Ok(StepResult {
            observation: self.get_observation(),
            reward,
            terminated,
            truncated,
            info: StepInfo::default(),
        })
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![4], dtype: SpaceType::Continuous, bounds: None }
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![], dtype: SpaceType::Discrete(2), bounds: None }
    }
}
