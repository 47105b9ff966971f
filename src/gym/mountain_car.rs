use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    env::{ContinuousActionSpace, Environment, Report, Step},
    error::{Error, Result},
    observation::Observation,
};

const MIN_POSITION: f32 = -1.2;
const MAX_POSITION: f32 = 0.6;
const MAX_SPEED: f32 = 0.07;
const GOAL_POSITION: f32 = 0.45;
const POWER: f32 = 0.0015;

/// Default episode length
pub const MOUNTAIN_CAR_MAX_STEPS: usize = 999;

/// Mountain Car with a continuous engine force in `[-1, 1]`
///
/// The observation is `[position, velocity]`. Reaching the flag pays 100 and
/// ends the episode; every step costs `0.1 * force²`.
#[derive(Debug, Clone)]
pub struct MountainCarContinuous {
    position: f32,
    velocity: f32,
    steps: usize,
    max_steps: usize,
    rng: StdRng,
}

impl MountainCarContinuous {
    pub fn new(max_steps: usize) -> Self {
        Self {
            position: -0.5,
            velocity: 0.0,
            steps: 0,
            max_steps,
            rng: StdRng::from_entropy(),
        }
    }

    fn observation(&self) -> Observation {
        Observation::Vector(vec![self.position, self.velocity])
    }
}

impl Environment for MountainCarContinuous {
    fn reset(&mut self) -> Observation {
        self.position = self.rng.gen_range(-0.6..-0.4);
        self.velocity = 0.0;
        self.steps = 0;
        self.observation()
    }

    fn step(&mut self, action: &[f32]) -> Result<Step> {
        let &[force] = action else {
            return Err(Error::ActionDim {
                expected: 1,
                actual: action.len(),
            });
        };
        let force = force.clamp(-1.0, 1.0);

        self.velocity += force * POWER - 0.0025 * (3.0 * self.position).cos();
        self.velocity = self.velocity.clamp(-MAX_SPEED, MAX_SPEED);
        self.position = (self.position + self.velocity).clamp(MIN_POSITION, MAX_POSITION);
        if self.position <= MIN_POSITION && self.velocity < 0.0 {
            self.velocity = 0.0;
        }
        self.steps += 1;

        let reached_goal = self.position >= GOAL_POSITION;
        let mut reward = -0.1 * force * force;
        if reached_goal {
            reward += 100.0;
        }

        let mut info = Report::new(vec!["reached_goal"]);
        info.insert("reached_goal", if reached_goal { 1.0 } else { 0.0 });

        Ok(Step {
            observation: self.observation(),
            reward,
            done: reached_goal || self.steps >= self.max_steps,
            info,
        })
    }

    fn observation_shape(&self) -> Vec<usize> {
        vec![2]
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl ContinuousActionSpace for MountainCarContinuous {
    fn action_dim(&self) -> usize {
        1
    }

    fn action_bounds(&self) -> Option<(Vec<f32>, Vec<f32>)> {
        Some((vec![-1.0], vec![1.0]))
    }
}
