//! Episode loops
//!
//! Both drivers run `max_episodes` episodes of an [`Environment`] with a
//! [`TrainableAgent`], report scalars through the [`TrainingSession`] and
//! return one [`EpisodeSummary`] per episode.
//!
//! ```text
//! n-step:   act → step → observe reward → [window full or done] learn
//! one-step: select_action → step → learn_td
//! ```

use tracing::{debug, info};

use crate::{
    env::{Environment, Report, Step},
    error::Result,
    metrics::MetricsSink,
    session::TrainingSession,
    traits::TrainableAgent,
};

/// Outcome of one training episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub steps: usize,
    /// Undiscounted sum of the episode's rewards
    pub reward: f32,
    /// Mean loss of the updates made during the episode
    pub mean_loss: Option<f32>,
    /// Per-key sum of the environment's step info
    pub info: Report,
}

impl EpisodeSummary {
    fn new(episode: usize, steps: usize, reward: f32, losses: &[f32], info: Report) -> Self {
        let mean_loss = (!losses.is_empty()).then(|| losses.iter().sum::<f32>() / losses.len() as f32);
        Self {
            episode,
            steps,
            reward,
            mean_loss,
            info,
        }
    }

    fn log(&self, global_step: usize) {
        info!(
            episode = self.episode,
            steps = self.steps,
            ep_reward = self.reward,
            mean_loss = ?self.mean_loss,
            global_step,
            "episode finished"
        );
        for (key, total) in self.info.iter() {
            debug!(episode = self.episode, key, total, "episode info");
        }
    }
}

fn accumulate(totals: &mut Report, step_info: &Report) {
    for (key, value) in step_info.iter() {
        *totals.entry(key).or_insert(0.0) += value;
    }
}

/// Train with n-step updates
///
/// The agent learns whenever its window is full or the episode ends.
/// Records `agent/loss` per update, `agent/reward` per step and
/// `agent/ep_reward` per episode.
pub fn run_n_step<A, E, S>(
    agent: &mut A,
    env: &mut E,
    session: &mut TrainingSession<S>,
    max_episodes: usize,
) -> Result<Vec<EpisodeSummary>>
where
    A: TrainableAgent + ?Sized,
    E: Environment + ?Sized,
    S: MetricsSink,
{
    let mut summaries = Vec::with_capacity(max_episodes);

    for episode in 0..max_episodes {
        session.begin_episode(episode);
        agent.reset_episode();

        let mut observation = env.reset();
        let mut ep_reward = 0.0;
        let mut steps = 0;
        let mut losses = Vec::new();
        let mut info = Report::default();

        loop {
            let action = agent.act(&observation)?;
            let Step {
                observation: next_observation,
                reward,
                done,
                info: step_info,
            } = env.step(&action)?;
            accumulate(&mut info, &step_info);
            agent.observe_reward(reward);
            steps += 1;

            if agent.should_learn() || done {
                let metrics = agent.learn(&next_observation, done)?;
                session.record("agent/loss", f64::from(metrics.total_loss));
                losses.push(metrics.total_loss);
            }

            ep_reward += reward;
            session.advance_step();
            session.record("agent/reward", f64::from(reward));
            debug!(episode, step = steps, reward, "step");

            observation = next_observation;
            if done {
                break;
            }
        }

        session.record("agent/ep_reward", f64::from(ep_reward));
        let summary = EpisodeSummary::new(episode, steps, ep_reward, &losses, info);
        summary.log(session.global_step());
        summaries.push(summary);
    }

    Ok(summaries)
}

/// Train with a one-step TD update after every environment step
///
/// Records `main/loss` and `main/reward` per step and `main/ep_reward` per
/// episode.
pub fn run_one_step_td<A, E, S>(
    agent: &mut A,
    env: &mut E,
    session: &mut TrainingSession<S>,
    max_episodes: usize,
) -> Result<Vec<EpisodeSummary>>
where
    A: TrainableAgent + ?Sized,
    E: Environment + ?Sized,
    S: MetricsSink,
{
    let mut summaries = Vec::with_capacity(max_episodes);

    for episode in 0..max_episodes {
        session.begin_episode(episode);

        let mut observation = env.reset();
        let mut ep_reward = 0.0;
        let mut steps = 0;
        let mut losses = Vec::new();
        let mut info = Report::default();

        loop {
            let action = agent.select_action(&observation)?;
            let Step {
                observation: next_observation,
                reward,
                done,
                info: step_info,
            } = env.step(&action)?;
            accumulate(&mut info, &step_info);

            let metrics = agent.learn_td(&observation, &action, reward, &next_observation, done)?;
            session.record("main/loss", f64::from(metrics.total_loss));
            losses.push(metrics.total_loss);

            ep_reward += reward;
            steps += 1;
            session.advance_step();
            session.record("main/reward", f64::from(reward));
            debug!(episode, step = steps, reward, td_error = ?metrics.td_error, "step");

            observation = next_observation;
            if done {
                break;
            }
        }

        session.record("main/ep_reward", f64::from(ep_reward));
        let summary = EpisodeSummary::new(episode, steps, ep_reward, &losses, info);
        summary.log(session.global_step());
        summaries.push(summary);
    }

    Ok(summaries)
}
