use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::PI;

use crate::{
    env::{ContinuousActionSpace, Environment, Report, Step},
    error::{Error, Result},
    observation::Observation,
};

const MAX_SPEED: f32 = 8.0;
const MAX_TORQUE: f32 = 2.0;
const DT: f32 = 0.05;
const G: f32 = 10.0;
const M: f32 = 1.0;
const L: f32 = 1.0;

/// Default episode length
pub const PENDULUM_MAX_STEPS: usize = 200;

/// Classic Pendulum swing-up with a continuous torque action
///
/// The observation is `[cos(θ), sin(θ), θ̇]` so angle wrapping never shows up
/// as a discontinuity. Episodes always last `max_steps` steps.
///
/// # Reward
/// r = -θ² - 0.1⋅θ̇² - 0.001⋅u²
///
/// where θ is the angle from vertical (0 = upright) and u the applied torque.
#[derive(Debug, Clone)]
pub struct Pendulum {
    theta: f32,
    theta_dot: f32,
    steps: usize,
    max_steps: usize,
    rng: StdRng,
}

impl Pendulum {
    /// Create a new Pendulum environment
    ///
    /// # Arguments
    /// * `max_steps` - Maximum number of steps per episode (typically 200)
    pub fn new(max_steps: usize) -> Self {
        Self {
            theta: 0.0,
            theta_dot: 0.0,
            steps: 0,
            max_steps,
            rng: StdRng::from_entropy(),
        }
    }

    fn observation(&self) -> Observation {
        Observation::Vector(vec![self.theta.cos(), self.theta.sin(), self.theta_dot])
    }

    fn angle_normalize(x: f32) -> f32 {
        (x + PI).rem_euclid(2.0 * PI) - PI
    }
}

impl Environment for Pendulum {
    fn reset(&mut self) -> Observation {
        self.theta = self.rng.gen_range(-PI..PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        self.steps = 0;
        self.observation()
    }

    fn step(&mut self, action: &[f32]) -> Result<Step> {
        let &[torque] = action else {
            return Err(Error::ActionDim {
                expected: 1,
                actual: action.len(),
            });
        };
        let torque = torque.clamp(-MAX_TORQUE, MAX_TORQUE);

        // Reward is computed on the state the action is applied to
        let reward = -(Self::angle_normalize(self.theta).powi(2)
            + 0.1 * self.theta_dot.powi(2)
            + 0.001 * torque.powi(2));

        // θ̈ = (3g/2L)sin(θ) + (3/mL²)u
        let theta_acc = (3.0 * G / (2.0 * L)) * self.theta.sin() + (3.0 / (M * L * L)) * torque;

        self.theta_dot = (self.theta_dot + theta_acc * DT).clamp(-MAX_SPEED, MAX_SPEED);
        self.theta = Self::angle_normalize(self.theta + self.theta_dot * DT);
        self.steps += 1;

        let mut info = Report::new(vec!["torque"]);
        info.insert("torque", torque as f64);

        Ok(Step {
            observation: self.observation(),
            reward,
            done: self.steps >= self.max_steps,
            info,
        })
    }

    fn observation_shape(&self) -> Vec<usize> {
        vec![3]
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl ContinuousActionSpace for Pendulum {
    fn action_dim(&self) -> usize {
        1
    }

    fn action_bounds(&self) -> Option<(Vec<f32>, Vec<f32>)> {
        Some((vec![-MAX_TORQUE], vec![MAX_TORQUE]))
    }
}
