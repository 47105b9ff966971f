//! Trainable agent trait
//!
//! The training drivers in [`crate::driver`] only talk to agents through this
//! trait, which keeps the episode loop independent of the network, the
//! backend and the optimizer.

use crate::{error::Result, observation::Observation};

/// Training metrics returned after each learning update
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingMetrics {
    /// The scalar that was back-propagated
    pub total_loss: f32,

    /// Actor part of the loss (`-mean(log π)` for n-step updates)
    pub policy_loss: f32,

    /// Critic part of the loss (smooth L1 between values and returns)
    ///
    /// The one-step TD update has no separate critic term and reports the
    /// squared TD error here.
    pub value_loss: f32,

    /// Mean entropy of the policies in the window
    pub entropy: f32,

    /// TD error of a one-step update
    pub td_error: Option<f32>,

    /// Number of transitions the update consumed
    pub window_len: usize,
}

/// Trait for agents the training drivers can run
pub trait TrainableAgent {
    /// Choose an action for `observation` and record the transition for the
    /// next n-step update. The returned action is already post-processed.
    fn act(&mut self, observation: &Observation) -> Result<Vec<f32>>;

    /// Choose an action without recording anything
    fn select_action(&self, observation: &Observation) -> Result<Vec<f32>>;

    /// Append the reward obtained for the last recorded action
    fn observe_reward(&mut self, reward: f32);

    /// True once the current learning window is full
    fn should_learn(&self) -> bool;

    /// n-step actor-critic update over the recorded window
    ///
    /// `next_observation` is the observation reached after the last recorded
    /// step; it is only used for bootstrapping when `done` is false.
    fn learn(&mut self, next_observation: &Observation, done: bool) -> Result<TrainingMetrics>;

    /// One-step temporal-difference actor-critic update
    fn learn_td(
        &mut self,
        observation: &Observation,
        action: &[f32],
        reward: f32,
        next_observation: &Observation,
        done: bool,
    ) -> Result<TrainingMetrics>;

    /// Clear the learning window, keeping learned weights
    fn reset_episode(&mut self);

    /// Total number of actions recorded with [`act`](Self::act)
    fn total_steps(&self) -> usize;
}
