//! Environment contract
//!
//! Any simulation that can be reset, stepped with a continuous action and
//! describe its spaces can be trained on. The built-in environments live in
//! [`crate::gym`].

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::{error::Result, observation::Observation};

/// Named scalar values attached to a step or an episode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    values: BTreeMap<String, f64>,
}

impl Report {
    /// A report with every key initialised to zero
    pub fn new(keys: Vec<&str>) -> Self {
        Self {
            values: keys.into_iter().map(|k| (k.to_string(), 0.0)).collect(),
        }
    }

    pub fn entry(&mut self, key: &str) -> Entry<'_, String, f64> {
        self.values.entry(key.to_string())
    }

    pub fn insert(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Outcome of a single environment step
#[derive(Debug, Clone)]
pub struct Step {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: Report,
}

/// A resettable, steppable simulation
pub trait Environment {
    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Observation;

    /// Apply `action` and advance one step
    ///
    /// Fails when `action` does not match the action space.
    fn step(&mut self, action: &[f32]) -> Result<Step>;

    /// Shape of the observations returned by [`reset`](Self::reset) and [`step`](Self::step)
    fn observation_shape(&self) -> Vec<usize>;

    /// Reseed the environment's random number generator
    fn seed(&mut self, seed: u64);
}

/// Continuous (box) action space description
pub trait ContinuousActionSpace {
    /// Number of action components
    fn action_dim(&self) -> usize;

    /// Optional per-component `(low, high)` bounds
    fn action_bounds(&self) -> Option<(Vec<f32>, Vec<f32>)>;
}

/// An environment with a continuous action space, usable as a trait object
pub trait GymEnv: Environment + ContinuousActionSpace {}

impl<T: Environment + ContinuousActionSpace> GymEnv for T {}
