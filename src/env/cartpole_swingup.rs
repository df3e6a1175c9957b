//! CartSwingUp-v0 environment
//!
//! Continuous-control variant of the cart-pole system. The pole starts
//! hanging down and the agent applies a continuous horizontal force to swing
//! it up and keep it balanced. Action bounds of ±24 N match the physical
//! actuator range of the lab rig this environment models.
//!
//! - State: [x, x_dot, theta, theta_dot], theta = 0 means upright
//! - Action: 1-dimensional force in [-24, 24] N
//! - Reward: (1 + cos(theta)) / 2, maximal when the pole is upright
//! - Termination: cart leaves the track (|x| > 2.4)

use anyhow::{bail, Result};
use rand::Rng;

use crate::env::{Action, Environment, SpaceInfo, SpaceType, StepInfo, StepResult};

/// Continuous cart-pole swing-up environment
#[derive(Debug)]
pub struct CartSwingUp {
    x: f32,
    x_dot: f32,
    theta: f32,
    theta_dot: f32,

    steps: usize,
    max_steps: usize,

    gravity: f32,
    mass_pole: f32,
    total_mass: f32,
    length: f32,
    pole_mass_length: f32,
    force_limit: f32,
    dt: f32,

    x_threshold: f32,
}

impl CartSwingUp {
    /// Create a new swing-up environment with default parameters
    pub fn new() -> Self {
        let mass_cart = 1.0;
        let mass_pole = 0.1;
        let length = 0.5;

        Self {
            x: 0.0,
            x_dot: 0.0,
            theta: std::f32::consts::PI,
            theta_dot: 0.0,
            steps: 0,
            max_steps: 500,
            gravity: 9.8,
            mass_pole,
            total_mass: mass_cart + mass_pole,
            length,
            pole_mass_length: mass_pole * length,
            force_limit: 24.0,
            dt: 0.02,
            x_threshold: 2.4,
        }
    }

    /// Reset to the hanging-down position with a small perturbation
    fn reset_state(&mut self) {
        let mut rng = rand::thread_rng();

        self.x = rng.gen_range(-0.05..0.05);
        self.x_dot = rng.gen_range(-0.05..0.05);
        self.theta = std::f32::consts::PI + rng.gen_range(-0.05..0.05);
        self.theta_dot = rng.gen_range(-0.05..0.05);
    }

    /// Same dynamics as the discrete cart-pole, driven by an arbitrary force
    fn physics_step(&mut self, force: f32) {
        let cos_theta = self.theta.cos();
        let sin_theta = self.theta.sin();

        let temp = (force + self.pole_mass_length * self.theta_dot * self.theta_dot * sin_theta)
            / self.total_mass;
        let theta_acc = (self.gravity * sin_theta - cos_theta * temp)
            / (self.length
                * (4.0 / 3.0 - self.mass_pole * cos_theta * cos_theta / self.total_mass));
        let x_acc = temp - self.pole_mass_length * theta_acc * cos_theta / self.total_mass;

        self.x_dot += self.dt * x_acc;
        self.x += self.dt * self.x_dot;
        self.theta_dot += self.dt * theta_acc;
        self.theta += self.dt * self.theta_dot;
    }

    fn get_observation(&self) -> Vec<f32> {
        vec![self.x, self.x_dot, self.theta, self.theta_dot]
    }
}

impl Default for CartSwingUp {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for CartSwingUp {
    type Observation = Vec<f32>;
    type Action = Action;

    fn reset(&mut self) -> Result<Self::Observation> {
        self.reset_state();
        self.steps = 0;
        Ok(self.get_observation())
    }

    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>> {
        let force = match action {
            Action::Continuous(v) if v.len() == 1 => v[0].clamp(-self.force_limit, self.force_limit),
            Action::Continuous(v) => {
                bail!("CartSwingUp expects a 1-dimensional action, got {} dimensions", v.len())
            }
            Action::Discrete(_) => {
                bail!("CartSwingUp has a continuous action space, got a discrete action")
            }
        };

        self.physics_step(force);
        self.steps += 1;

        let terminated = self.x.abs() > self.x_threshold;
        let truncated = self.steps >= self.max_steps;

        // Dense shaping reward, 1.0 when upright and 0.0 when hanging down
        let reward = if terminated { 0.0 } else { (1.0 + self.theta.cos()) / 2.0 };

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
        SpaceInfo {
            shape: vec![1],
            dtype: SpaceType::Continuous,
            bounds: Some((-24.0, 24.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swingup_reset_hangs_down() {
        let mut env = CartSwingUp::new();
        let obs = env.reset().unwrap();

        assert_eq!(obs.len(), 4);
        assert!(
            (obs[2] - std::f32::consts::PI).abs() < 0.1,
            "Pole should start near the hanging position, got theta = {}",
            obs[2]
        );
    }

    #[test]
    fn test_swingup_step() {
        let mut env = CartSwingUp::new();
        env.reset().unwrap();

        let result = env.step(Action::Continuous(vec![5.0])).unwrap();
        assert_eq!(result.observation.len(), 4);
        assert!((0.0..=1.0).contains(&result.reward), "Reward should be in [0, 1]");
    }

    #[test]
    fn test_swingup_reward_when_upright() {
        let mut env = CartSwingUp::new();
        env.reset().unwrap();
        env.theta = 0.0;
        env.theta_dot = 0.0;

        let result = env.step(Action::Continuous(vec![0.0])).unwrap();
        assert!(result.reward > 0.9, "Reward near the top should be close to 1");
    }

    #[test]
    fn test_swingup_clamps_force() {
        let mut env = CartSwingUp::new();
        env.reset().unwrap();

        // A huge force is clamped to the limit, so the cart cannot teleport
        let result = env.step(Action::Continuous(vec![1e6])).unwrap();
        assert!(result.observation[1].abs() < 1.0, "Velocity should stay bounded after one step");
    }

    #[test]
    fn test_swingup_terminates_off_track() {
        let mut env = CartSwingUp::new();
        env.reset().unwrap();
        env.x = 3.0;

        let result = env.step(Action::Continuous(vec![0.0])).unwrap();
        assert!(result.terminated);
        assert_eq!(result.reward, 0.0);
    }

    #[test]
    fn test_swingup_rejects_discrete_action() {
        let mut env = CartSwingUp::new();
        env.reset().unwrap();
        assert!(env.step(Action::Discrete(0)).is_err());
    }

    #[test]
    fn test_swingup_action_space_bounds() {
        let env = CartSwingUp::new();
        let space = env.action_space();
        assert_eq!(space.shape, vec![1]);
        assert_eq!(space.bounds, Some((-24.0, 24.0)));
    }
}
