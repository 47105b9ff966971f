//! Return and loss calculations
//!
//! n-step returns are plain `f32`s. TD targets and losses are tensor
//! operations so that gradients reach the network.

use burn::{
    nn::loss::{HuberLossConfig, Reduction},
    prelude::*,
};

/// Discounted n-step returns, earliest step first
///
/// ```text
/// G_n = bootstrap
/// G_t = r_t + γ · G_{t+1}
/// ```
///
/// `bootstrap` is 0 for a terminal window and V(s_n) otherwise.
pub fn n_step_returns(rewards: &[f32], bootstrap: f32, gamma: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut g = bootstrap;
    for (ret, reward) in returns.iter_mut().zip(rewards).rev() {
        g = reward + gamma * g;
        *ret = g;
    }
    returns
}

/// r + γ · V(s')
///
/// Gradient flows through `next_value` unless the caller detached it.
pub fn td_target<B: Backend>(reward: f32, gamma: f32, next_value: Tensor<B, 1>) -> Tensor<B, 1> {
    next_value.mul_scalar(gamma).add_scalar(reward)
}

/// target − V(s)
pub fn td_error<B: Backend>(target: Tensor<B, 1>, value: Tensor<B, 1>) -> Tensor<B, 1> {
    target - value
}

/// Smooth L1 (Huber, δ = 1) averaged over all elements
pub fn smooth_l1_loss<B: Backend, const D: usize>(prediction: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
    HuberLossConfig::new(1.0)
        .init()
        .forward(prediction, target, Reduction::Mean)
}

/// −mean(log π(a|s)) over the window
pub fn actor_loss<B: Backend>(log_probs: Tensor<B, 1>) -> Tensor<B, 1> {
    log_probs.mean().neg()
}
