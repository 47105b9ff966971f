//! Shared-trunk actor-critic networks
//!
//! Both networks map a batch of observations to three tensors computed from
//! the same hidden features:
//!
//! - `mean_raw`: `[batch, action_dim]`, the unclamped Gaussian mean
//! - `spread_raw`: `[batch, action_dim]`, passed through softplus by the policy
//! - `value`: `[batch, 1]`, the state-value estimate V(s)
//!
//! ```text
//! ShallowActorCritic                 DeepActorCritic
//!   [batch, n]                         [batch, C, S, S]
//!   ↓ Linear(n → 256) + ReLU           ↓ Conv2d(C → 128, k=3) + ReLU
//!   ↓ Linear(256 → 128) + ReLU         ↓ Conv2d(128 → 64, k=3) + ReLU
//!   ├─→ mean head                      ↓ Conv2d(64 → 32, k=3) + ReLU
//!   ├─→ spread head                    ↓ Flatten, Linear(32·(S-6)² → 2048) + ReLU
//!   └─→ value head                     └─→ mean / spread / value heads
//! ```

use burn::{
    module::AutodiffModule,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Linear, LinearConfig, Relu,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};

/// A network producing Gaussian policy parameters and a state value
///
/// ### Generics
/// - `B` - A burn autodiff backend
/// - `D` - The rank of the batched observation tensor (2 for vectors, 4 for images)
pub trait ActorCriticModel<B: AutodiffBackend, const D: usize>: AutodiffModule<B> {
    /// Forward pass: observations → `(mean_raw, spread_raw, value)`
    fn forward(&self, observation: Tensor<B, D>) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>);
}

/// Configuration of the fully-connected network used for vector observations
#[derive(Config, Debug)]
pub struct ShallowActorCriticConfig {
    pub input_dim: usize,
    pub action_dim: usize,
    #[config(default = 256)]
    pub hidden_1: usize,
    #[config(default = 128)]
    pub hidden_2: usize,
}

impl ShallowActorCriticConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ShallowActorCritic<B> {
        ShallowActorCritic {
            fc1: LinearConfig::new(self.input_dim, self.hidden_1).init(device),
            fc2: LinearConfig::new(self.hidden_1, self.hidden_2).init(device),
            actor_mu: LinearConfig::new(self.hidden_2, self.action_dim).init(device),
            actor_sigma: LinearConfig::new(self.hidden_2, self.action_dim).init(device),
            critic: LinearConfig::new(self.hidden_2, 1).init(device),
        }
    }
}

/// Two fully-connected layers followed by mean, spread and value heads
#[derive(Module, Debug)]
pub struct ShallowActorCritic<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    actor_mu: Linear<B>,
    actor_sigma: Linear<B>,
    critic: Linear<B>,
}

impl<B: Backend> ShallowActorCritic<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
        let x = Relu.forward(self.fc1.forward(x));
        let x = Relu.forward(self.fc2.forward(x));

        let mu = self.actor_mu.forward(x.clone());
        let sigma = self.actor_sigma.forward(x.clone());
        let value = self.critic.forward(x);
        (mu, sigma, value)
    }
}

impl<B: AutodiffBackend> ActorCriticModel<B, 2> for ShallowActorCritic<B> {
    fn forward(&self, observation: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
        ShallowActorCritic::forward(self, observation)
    }
}

/// Configuration of the convolutional network used for image observations
#[derive(Config, Debug)]
pub struct DeepActorCriticConfig {
    /// Channels of the (channels-first) input image
    pub input_channels: usize,
    pub action_dim: usize,
    /// Side length of the square input image
    #[config(default = 84)]
    pub image_size: usize,
    #[config(default = 2048)]
    pub hidden_dim: usize,
}

const CONV_CHANNELS: [usize; 3] = [128, 64, 32];
const KERNEL: usize = 3;

impl DeepActorCriticConfig {
    /// Side length of the feature maps after the three unpadded convolutions
    pub fn feature_size(&self) -> usize {
        self.image_size.saturating_sub(3 * (KERNEL - 1))
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DeepActorCritic<B> {
        let side = self.feature_size();
        let flattened_dim = CONV_CHANNELS[2] * side * side;

        DeepActorCritic {
            conv1: Conv2dConfig::new([self.input_channels, CONV_CHANNELS[0]], [KERNEL, KERNEL]).init(device),
            conv2: Conv2dConfig::new([CONV_CHANNELS[0], CONV_CHANNELS[1]], [KERNEL, KERNEL]).init(device),
            conv3: Conv2dConfig::new([CONV_CHANNELS[1], CONV_CHANNELS[2]], [KERNEL, KERNEL]).init(device),
            fc: LinearConfig::new(flattened_dim, self.hidden_dim).init(device),
            actor_mu: LinearConfig::new(self.hidden_dim, self.action_dim).init(device),
            actor_sigma: LinearConfig::new(self.hidden_dim, self.action_dim).init(device),
            critic: LinearConfig::new(self.hidden_dim, 1).init(device),
        }
    }
}

/// Three convolutions and one fully-connected layer followed by mean, spread
/// and value heads
#[derive(Module, Debug)]
pub struct DeepActorCritic<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    fc: Linear<B>,
    actor_mu: Linear<B>,
    actor_sigma: Linear<B>,
    critic: Linear<B>,
}

impl<B: Backend> DeepActorCritic<B> {
    /// `x`: `[batch, channels, image_size, image_size]`
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
        let x = Relu.forward(self.conv1.forward(x));
        let x = Relu.forward(self.conv2.forward(x));
        let x = Relu.forward(self.conv3.forward(x));

        let [batch, channels, height, width] = x.dims();
        let x = x.reshape([batch, channels * height * width]);
        let x = Relu.forward(self.fc.forward(x));

        let mu = self.actor_mu.forward(x.clone());
        let sigma = self.actor_sigma.forward(x.clone());
        let value = self.critic.forward(x);
        (mu, sigma, value)
    }
}

impl<B: AutodiffBackend> ActorCriticModel<B, 4> for DeepActorCritic<B> {
    fn forward(&self, observation: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
        DeepActorCritic::forward(self, observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DEFAULT_IMAGE_SIZE;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_shallow_output_shapes() {
        let device = NdArrayDevice::default();
        let net = ShallowActorCriticConfig::new(3, 2).init::<NdArray>(&device);

        let input = Tensor::<NdArray, 2>::random([5, 3], burn::tensor::Distribution::Default, &device);
        let (mu, sigma, value) = net.forward(input);

        assert_eq!(mu.dims(), [5, 2]);
        assert_eq!(sigma.dims(), [5, 2]);
        assert_eq!(value.dims(), [5, 1]);
    }

    #[test]
    fn test_deep_output_shapes() {
        let device = NdArrayDevice::default();
        let config = DeepActorCriticConfig::new(3, 3).with_image_size(10).with_hidden_dim(16);
        assert_eq!(config.feature_size(), 4);
        let net = config.init::<NdArray>(&device);

        let input = Tensor::<NdArray, 4>::random([2, 3, 10, 10], burn::tensor::Distribution::Default, &device);
        let (mu, sigma, value) = net.forward(input);

        assert_eq!(mu.dims(), [2, 3]);
        assert_eq!(sigma.dims(), [2, 3]);
        assert_eq!(value.dims(), [2, 1]);
    }

    #[test]
    fn test_default_deep_config_matches_default_frames() {
        let config = DeepActorCriticConfig::new(3, 3);
        assert_eq!(config.image_size, DEFAULT_IMAGE_SIZE);
        assert_eq!(config.feature_size(), 78);
        assert_eq!(config.hidden_dim, 2048);
    }
}
