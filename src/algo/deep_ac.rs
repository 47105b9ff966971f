//! Deep Actor-Critic for continuous action spaces
//!
//! A single network with a shared trunk produces both the Gaussian policy
//! π(a|s) and the state value V(s). Two update rules are available:
//!
//! - **n-step**: transitions are recorded while acting; once the window is
//!   full (or the episode ends) the discounted n-step returns are computed,
//!   bootstrapped from V(s_n) unless the window ended the episode, and the
//!   network takes one optimizer step on
//!
//!   ```text
//!   loss = -mean(log π(a_t|s_t)) + smooth_l1(V(s_t), G_t)
//!   ```
//!
//! - **one-step TD**: every step is learned from immediately with
//!
//!   ```text
//!   δ    = r + γ·V(s') - V(s)
//!   loss = -mean(log π(a|s) + δ²)
//!   ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use burn::{backend::{Autodiff, NdArray}, optim::RmsPropConfig};
//! use deep_ac::{
//!     algo::deep_ac::{DeepActorCriticAgent, DeepActorCriticAgentConfig},
//!     device::ComputeContext,
//!     nn::{ShallowActorCritic, ShallowActorCriticConfig},
//! };
//!
//! type B = Autodiff<NdArray>;
//!
//! let ctx = ComputeContext::<B>::seeded(Default::default(), 555);
//! let model = ShallowActorCriticConfig::new(3, 1).init::<B>(ctx.device());
//! let mut agent = DeepActorCriticAgent::<_, _, _, 2>::new(
//!     model,
//!     RmsPropConfig::new().init::<B, ShallowActorCritic<B>>(),
//!     1,
//!     DeepActorCriticAgentConfig::default(),
//!     &ctx,
//! );
//! ```

use burn::{
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use tracing::debug;

use crate::{
    adapters::{postprocess_action, preprocess, DEFAULT_IMAGE_SIZE},
    config::AgentParams,
    device::ComputeContext,
    error::{Error, Result},
    nn::ActorCriticModel,
    observation::Observation,
    traits::{ToTensor, TrainableAgent, TrainingMetrics},
};

use super::{
    gaussian::{gaussian_policy, PolicyOutput},
    returns::{actor_loss, n_step_returns, smooth_l1_loss, td_error, td_target},
};

/// Configuration for the Deep Actor-Critic agent
#[derive(Debug, Clone, PartialEq)]
pub struct DeepActorCriticAgentConfig {
    /// Discount factor γ (default: 0.99)
    pub gamma: f32,
    /// Optimizer learning rate (default: 1e-3)
    pub learning_rate: f64,
    /// Transitions per n-step update (default: 100)
    pub learning_step_thresh: usize,
    /// Side length image observations are resized to (default: 84)
    pub image_size: usize,
    /// Stop gradients through V(s') in the one-step TD update (default: false)
    pub detach_td_bootstrap: bool,
}

impl Default for DeepActorCriticAgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            learning_rate: 1e-3,
            learning_step_thresh: 100,
            image_size: DEFAULT_IMAGE_SIZE,
            detach_td_bootstrap: false,
        }
    }
}

impl From<&AgentParams> for DeepActorCriticAgentConfig {
    fn from(params: &AgentParams) -> Self {
        Self {
            gamma: params.gamma,
            learning_rate: params.learning_rate,
            learning_step_thresh: params.learning_step_thresh,
            image_size: params.image_size,
            detach_td_bootstrap: params.detach_td_bootstrap,
        }
    }
}

/// One recorded step
///
/// `value` and `log_prob` keep their autodiff graph until the window is
/// learned from.
#[derive(Debug, Clone)]
pub struct Transition<B: Backend, const D: usize> {
    /// Batched, preprocessed observation
    pub observation: Tensor<B, D>,
    /// V(s_t), shape `[1]`
    pub value: Tensor<B, 1>,
    /// Raw sampled action before post-processing
    pub action: Tensor<B, 1>,
    /// log π(a_t|s_t), shape `[1]`
    pub log_prob: Tensor<B, 1>,
    /// Policy entropy at s_t, detached
    pub entropy: Tensor<B, 1>,
}

/// Transitions of the current learning window, in order
#[derive(Debug, Clone)]
pub struct Trajectory<B: Backend, const D: usize> {
    transitions: Vec<Transition<B, D>>,
}

impl<B: Backend, const D: usize> Trajectory<B, D> {
    fn new() -> Self {
        Self { transitions: Vec::new() }
    }

    fn push(&mut self, transition: Transition<B, D>) {
        self.transitions.push(transition);
    }

    fn clear(&mut self) {
        self.transitions.clear();
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    fn cat<F>(&self, field: F) -> Tensor<B, 1>
    where
        F: Fn(&Transition<B, D>) -> Tensor<B, 1>,
    {
        Tensor::cat(self.transitions.iter().map(field).collect(), 0)
    }
}

/// Losses of one n-step window
#[derive(Debug, Clone)]
pub struct WindowLoss<B: Backend> {
    /// actor + critic, the tensor that is back-propagated
    pub total: Tensor<B, 1>,
    pub actor: Tensor<B, 1>,
    pub critic: Tensor<B, 1>,
}

/// Deep Actor-Critic agent
///
/// ### Generics
/// - `B` - A burn autodiff backend
/// - `M` - The actor-critic network
/// - `O` - The optimizer updating `M`
/// - `D` - The rank of the batched observation tensor (2 for vectors, 4 for images)
pub struct DeepActorCriticAgent<B, M, O, const D: usize>
where
    B: AutodiffBackend,
    M: ActorCriticModel<B, D>,
    O: Optimizer<M, B>,
{
    // Option for ownership during the optimizer step
    actor_critic: Option<M>,
    optimizer: O,
    device: B::Device,
    action_dim: usize,

    trajectory: Trajectory<B, D>,
    rewards: Vec<f32>,

    config: DeepActorCriticAgentConfig,
    total_steps: usize,
}

impl<B, M, O, const D: usize> DeepActorCriticAgent<B, M, O, D>
where
    B: AutodiffBackend,
    M: ActorCriticModel<B, D>,
    O: Optimizer<M, B>,
{
    pub fn new(
        actor_critic: M,
        optimizer: O,
        action_dim: usize,
        config: DeepActorCriticAgentConfig,
        ctx: &ComputeContext<B>,
    ) -> Self {
        Self {
            actor_critic: Some(actor_critic),
            optimizer,
            device: ctx.device().clone(),
            action_dim,
            trajectory: Trajectory::new(),
            rewards: Vec::new(),
            config,
            total_steps: 0,
        }
    }

    pub fn model(&self) -> &M {
        self.actor_critic
            .as_ref()
            .expect("model is only taken out during an optimizer step")
    }

    pub fn config(&self) -> &DeepActorCriticAgentConfig {
        &self.config
    }

    pub fn trajectory(&self) -> &Trajectory<B, D> {
        &self.trajectory
    }

    /// Rewards of the current learning window
    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// Preprocess an observation and batch it for the network
    pub fn preprocess_obs(&self, observation: &Observation) -> Result<Tensor<B, D>> {
        let observation = preprocess(observation, self.config.image_size);
        if observation.rank() + 1 != D {
            return Err(Error::ObservationRank {
                expected: D.saturating_sub(1),
                actual: observation.rank(),
            });
        }
        Ok((&observation).to_tensor(&self.device))
    }

    /// Policy and value for a batched observation
    pub fn policy(&self, observation: Tensor<B, D>) -> Result<PolicyOutput<B>> {
        let (mean_raw, spread_raw, value) = self.model().forward(observation);
        gaussian_policy(mean_raw, spread_raw, value)
    }

    /// Sample an action, record the transition and return the post-processed action
    pub fn get_action(&mut self, observation: &Observation) -> Result<Vec<f32>> {
        let observation = self.preprocess_obs(observation)?;
        let PolicyOutput { distribution, value } = self.policy(observation.clone())?;

        let action = distribution.sample();
        let log_prob = distribution.log_prob(action.clone())?;
        let entropy = distribution.entropy().detach();

        self.trajectory.push(Transition {
            observation,
            value,
            action: action.clone(),
            log_prob,
            entropy,
        });
        self.total_steps += 1;

        Ok(postprocess_action(action.into_data().iter::<f32>().collect()))
    }

    /// Sample a post-processed action without recording anything
    pub fn sample_action(&self, observation: &Observation) -> Result<Vec<f32>> {
        let observation = self.preprocess_obs(observation)?;
        let action = self.policy(observation)?.distribution.sample();
        Ok(postprocess_action(action.into_data().iter::<f32>().collect()))
    }

    /// n-step returns of the reward window
    ///
    /// Bootstraps from V(`final_observation`), without gradient, unless `done`.
    pub fn calculate_n_step_return(&self, final_observation: &Observation, done: bool) -> Result<Vec<f32>> {
        let bootstrap = if done {
            0.0
        } else {
            let observation = self.preprocess_obs(final_observation)?;
            let (_, _, value) = self.model().forward(observation);
            value.detach().into_scalar().elem::<f32>()
        };
        Ok(n_step_returns(&self.rewards, bootstrap, self.config.gamma))
    }

    /// Actor and critic losses of the recorded window against `returns`
    pub fn calculate_loss(&self, returns: &[f32]) -> Result<WindowLoss<B>> {
        if self.trajectory.is_empty() {
            return Err(Error::EmptyTrajectory);
        }
        if returns.len() != self.trajectory.len() {
            return Err(Error::TrajectoryMismatch {
                transitions: self.trajectory.len(),
                returns: returns.len(),
            });
        }

        let values = self.trajectory.cat(|t| t.value.clone());
        let log_probs = self.trajectory.cat(|t| t.log_prob.clone());
        let returns: Tensor<B, 1> = returns.to_vec().to_tensor(&self.device);

        let critic = smooth_l1_loss(values, returns);
        let actor = actor_loss(log_probs);

        Ok(WindowLoss {
            total: actor.clone() + critic.clone(),
            actor,
            critic,
        })
    }

    /// n-step update over the recorded window, then start a new window
    pub fn learn_n_step(&mut self, next_observation: &Observation, done: bool) -> Result<TrainingMetrics> {
        let returns = self.calculate_n_step_return(next_observation, done)?;
        let losses = self.calculate_loss(&returns)?;
        let window_len = self.trajectory.len();

        let metrics = TrainingMetrics {
            total_loss: losses.total.clone().into_scalar().elem::<f32>(),
            policy_loss: losses.actor.into_scalar().elem::<f32>(),
            value_loss: losses.critic.into_scalar().elem::<f32>(),
            entropy: self.trajectory.cat(|t| t.entropy.clone()).mean().into_scalar().elem::<f32>(),
            td_error: None,
            window_len,
        };

        self.step_optimizer(losses.total);

        self.trajectory.clear();
        self.rewards.clear();

        debug!(
            loss = metrics.total_loss,
            policy_loss = metrics.policy_loss,
            value_loss = metrics.value_loss,
            window_len,
            done,
            "n-step update"
        );
        Ok(metrics)
    }

    /// One-step TD update from a single transition
    ///
    /// `action` is the action that was sent to the environment. The recorded
    /// n-step window is left untouched.
    pub fn learn_td_ac(
        &mut self,
        observation: &Observation,
        action: &[f32],
        reward: f32,
        next_observation: &Observation,
        done: bool,
    ) -> Result<TrainingMetrics> {
        if action.len() != self.action_dim {
            return Err(Error::ActionDim {
                expected: self.action_dim,
                actual: action.len(),
            });
        }

        let observation = self.preprocess_obs(observation)?;
        let next_observation = self.preprocess_obs(next_observation)?;

        let PolicyOutput { distribution, value } = self.policy(observation)?;
        let (_, _, next_value) = self.model().forward(next_observation);
        let next_value: Tensor<B, 1> = next_value.reshape([1]);
        let next_value = if self.config.detach_td_bootstrap {
            next_value.detach()
        } else {
            next_value
        };

        let action: Tensor<B, 1> = action.to_vec().to_tensor(&self.device);
        let log_prob = distribution.log_prob(action)?;

        let target = td_target(reward, self.config.gamma, next_value);
        let delta = td_error(target, value);
        let delta_sq = delta.clone().powf_scalar(2.0);
        let loss = (log_prob.clone() + delta_sq.clone()).mean().neg();

        let metrics = TrainingMetrics {
            total_loss: loss.clone().into_scalar().elem::<f32>(),
            policy_loss: log_prob.neg().into_scalar().elem::<f32>(),
            value_loss: delta_sq.into_scalar().elem::<f32>(),
            entropy: distribution.entropy().into_scalar().elem::<f32>(),
            td_error: Some(delta.into_scalar().elem::<f32>()),
            window_len: 1,
        };

        self.step_optimizer(loss);

        debug!(loss = metrics.total_loss, td_error = ?metrics.td_error, done, "one-step TD update");
        Ok(metrics)
    }

    fn step_optimizer(&mut self, loss: Tensor<B, 1>) {
        let actor_critic = self
            .actor_critic
            .take()
            .expect("model is only taken out during an optimizer step");

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &actor_critic);

        self.actor_critic = Some(self.optimizer.step(self.config.learning_rate, actor_critic, grads));
    }
}

impl<B, M, O, const D: usize> TrainableAgent for DeepActorCriticAgent<B, M, O, D>
where
    B: AutodiffBackend,
    M: ActorCriticModel<B, D>,
    O: Optimizer<M, B>,
{
    fn act(&mut self, observation: &Observation) -> Result<Vec<f32>> {
        self.get_action(observation)
    }

    fn select_action(&self, observation: &Observation) -> Result<Vec<f32>> {
        self.sample_action(observation)
    }

    fn observe_reward(&mut self, reward: f32) {
        self.rewards.push(reward);
    }

    fn should_learn(&self) -> bool {
        self.trajectory.len() >= self.config.learning_step_thresh
    }

    fn learn(&mut self, next_observation: &Observation, done: bool) -> Result<TrainingMetrics> {
        self.learn_n_step(next_observation, done)
    }

    fn learn_td(
        &mut self,
        observation: &Observation,
        action: &[f32],
        reward: f32,
        next_observation: &Observation,
        done: bool,
    ) -> Result<TrainingMetrics> {
        self.learn_td_ac(observation, action, reward, next_observation, done)
    }

    fn reset_episode(&mut self) {
        self.trajectory.clear();
        self.rewards.clear();
    }

    fn total_steps(&self) -> usize {
        self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::GAS_EPSILON,
        nn::{DeepActorCritic, DeepActorCriticConfig, ShallowActorCritic, ShallowActorCriticConfig},
        observation::Image,
    };
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        optim::{adaptor::OptimizerAdaptor, RmsProp, RmsPropConfig, SgdConfig},
    };

    type TestBackend = Autodiff<NdArray>;
    type VectorAgent = DeepActorCriticAgent<
        TestBackend,
        ShallowActorCritic<TestBackend>,
        OptimizerAdaptor<RmsProp, ShallowActorCritic<TestBackend>, TestBackend>,
        2,
    >;

    fn vector_agent(config: DeepActorCriticAgentConfig) -> VectorAgent {
        let ctx = ComputeContext::<TestBackend>::default();
        let model = ShallowActorCriticConfig::new(3, 1)
            .with_hidden_1(16)
            .with_hidden_2(8)
            .init::<TestBackend>(ctx.device());
        DeepActorCriticAgent::new(model, RmsPropConfig::new().init(), 1, config, &ctx)
    }

    fn obs() -> Observation {
        Observation::Vector(vec![0.1, -0.2, 0.3])
    }

    fn value_of(agent: &VectorAgent, observation: &Observation) -> f32 {
        let input = agent.preprocess_obs(observation).unwrap();
        agent.policy(input).unwrap().value.into_scalar().elem::<f32>()
    }

    #[test]
    fn config_from_params() {
        let params = AgentParams {
            gamma: 0.9,
            learning_step_thresh: 5,
            detach_td_bootstrap: true,
            ..AgentParams::default()
        };
        let config = DeepActorCriticAgentConfig::from(&params);
        assert_eq!(config.gamma, 0.9);
        assert_eq!(config.learning_step_thresh, 5);
        assert!(config.detach_td_bootstrap);
    }

    #[test]
    fn act_records_transitions_and_select_does_not() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig::default());

        let action = agent.act(&obs()).unwrap();
        assert_eq!(action.len(), 1);
        assert_eq!(agent.trajectory().len(), 1);
        assert_eq!(agent.total_steps(), 1);

        agent.select_action(&obs()).unwrap();
        assert_eq!(agent.trajectory().len(), 1);
        assert_eq!(agent.total_steps(), 1);
    }

    #[test]
    fn should_learn_at_threshold() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig {
            learning_step_thresh: 2,
            ..Default::default()
        });
        agent.act(&obs()).unwrap();
        assert!(!agent.should_learn());
        agent.act(&obs()).unwrap();
        assert!(agent.should_learn());
    }

    #[test]
    fn n_step_learn_changes_network_output() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig {
            learning_rate: 0.05,
            ..Default::default()
        });
        let before = value_of(&agent, &obs());

        for _ in 0..3 {
            agent.act(&obs()).unwrap();
            agent.observe_reward(1.0);
        }
        let metrics = agent.learn(&obs(), false).unwrap();

        assert_eq!(metrics.window_len, 3);
        assert!(metrics.total_loss.is_finite());
        assert!((metrics.total_loss - metrics.policy_loss - metrics.value_loss).abs() < 1e-4);
        assert_ne!(before, value_of(&agent, &obs()));
    }

    #[test]
    fn learn_clears_window_buffers() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig::default());
        for _ in 0..4 {
            agent.act(&obs()).unwrap();
            agent.observe_reward(-0.5);
        }
        agent.learn(&obs(), true).unwrap();

        assert!(agent.trajectory().is_empty());
        assert!(agent.rewards().is_empty());
        assert_eq!(agent.total_steps(), 4);
    }

    #[test]
    fn terminal_returns_ignore_final_observation() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig {
            gamma: 0.5,
            ..Default::default()
        });
        for _ in 0..3 {
            agent.observe_reward(1.0);
        }
        let returns = agent.calculate_n_step_return(&obs(), true).unwrap();
        assert_eq!(returns, vec![1.75, 1.5, 1.0]);
    }

    #[test]
    fn non_terminal_returns_bootstrap_from_value() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig {
            gamma: 0.9,
            ..Default::default()
        });
        agent.observe_reward(2.0);
        let v = value_of(&agent, &obs());

        let returns = agent.calculate_n_step_return(&obs(), false).unwrap();
        assert!((returns[0] - (2.0 + 0.9 * v)).abs() < 1e-5);
    }

    #[test]
    fn learn_rejects_misaligned_window() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig::default());
        agent.act(&obs()).unwrap();
        agent.act(&obs()).unwrap();
        agent.observe_reward(1.0);

        assert!(matches!(
            agent.learn(&obs(), true),
            Err(Error::TrajectoryMismatch { transitions: 2, returns: 1 })
        ));
    }

    #[test]
    fn learn_rejects_empty_window() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig::default());
        assert!(matches!(agent.learn(&obs(), true), Err(Error::EmptyTrajectory)));
    }

    #[test]
    fn rejects_observation_of_wrong_rank() {
        let agent = vector_agent(DeepActorCriticAgentConfig::default());
        let image = Image::channels_last(4, 4, 3, vec![0.0; 48]).unwrap();

        assert!(matches!(
            agent.select_action(&Observation::Image(image)),
            Err(Error::ObservationRank { expected: 1, actual: 3 })
        ));
    }

    #[test]
    fn td_learn_reports_error_and_keeps_window() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig::default());
        agent.act(&obs()).unwrap();

        let next = Observation::Vector(vec![0.2, 0.0, -0.1]);
        let v = value_of(&agent, &obs());
        let v_next = value_of(&agent, &next);

        let metrics = agent.learn_td(&obs(), &[0.3], 1.0, &next, false).unwrap();
        let td_error = metrics.td_error.unwrap();

        assert!((td_error - (1.0 + 0.99 * v_next - v)).abs() < 1e-4);
        assert!((metrics.value_loss - td_error * td_error).abs() < 1e-4);
        assert_eq!(metrics.window_len, 1);
        assert_eq!(agent.trajectory().len(), 1);
    }

    #[test]
    fn td_bootstrap_gradient_follows_detach_setting() {
        let ctx = ComputeContext::<TestBackend>::default();
        let model = ShallowActorCriticConfig::new(3, 1)
            .with_hidden_1(16)
            .with_hidden_2(8)
            .init::<TestBackend>(ctx.device());
        let next = Observation::Vector(vec![0.2, 0.0, -0.1]);

        // one plain SGD step from identical weights, V(s') read back afterwards
        let next_value_after_step = |detach_td_bootstrap: bool| {
            let config = DeepActorCriticAgentConfig {
                learning_rate: 0.1,
                detach_td_bootstrap,
                ..Default::default()
            };
            let optimizer = SgdConfig::new().init::<TestBackend, ShallowActorCritic<TestBackend>>();
            let mut agent = DeepActorCriticAgent::<_, _, _, 2>::new(model.clone(), optimizer, 1, config, &ctx);

            let metrics = agent.learn_td(&obs(), &[0.3], 1.0, &next, false).unwrap();
            assert!(metrics.total_loss.is_finite());

            let input = agent.preprocess_obs(&next).unwrap();
            agent.policy(input).unwrap().value.into_scalar().elem::<f32>()
        };

        let attached = next_value_after_step(false);
        let detached = next_value_after_step(true);
        assert!(
            (attached - detached).abs() > 1e-5,
            "attached={attached} detached={detached}"
        );
    }

    #[test]
    fn td_learn_rejects_wrong_action_dim() {
        let mut agent = vector_agent(DeepActorCriticAgentConfig::default());
        assert!(matches!(
            agent.learn_td(&obs(), &[0.0, 0.0], 0.0, &obs(), false),
            Err(Error::ActionDim { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn image_observations_are_resized_and_actions_post_processed() {
        let ctx = ComputeContext::<TestBackend>::default();
        let model: DeepActorCritic<TestBackend> = DeepActorCriticConfig::new(3, 3)
            .with_image_size(10)
            .with_hidden_dim(16)
            .init(ctx.device());
        let config = DeepActorCriticAgentConfig {
            image_size: 10,
            learning_step_thresh: 2,
            ..Default::default()
        };
        let optimizer = RmsPropConfig::new().init::<TestBackend, DeepActorCritic<TestBackend>>();
        let mut agent = DeepActorCriticAgent::<_, _, _, 4>::new(model, optimizer, 3, config, &ctx);

        let frame = Observation::Image(Image::channels_last(12, 12, 3, vec![0.5; 12 * 12 * 3]).unwrap());
        assert_eq!(agent.preprocess_obs(&frame).unwrap().dims(), [1, 3, 10, 10]);

        for _ in 0..2 {
            let action = agent.act(&frame).unwrap();
            assert_eq!(action.len(), 3);
            assert!((0.0..=1.0).contains(&action[1]));
            assert!((GAS_EPSILON..=1.0 + GAS_EPSILON).contains(&action[2]));
            agent.observe_reward(0.1);
        }
        assert!(agent.should_learn());

        let metrics = agent.learn(&frame, false).unwrap();
        assert_eq!(metrics.window_len, 2);
    }
}
