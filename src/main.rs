use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    optim::RmsPropConfig,
    tensor::backend::AutodiffBackend,
};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use deep_ac::{
    algo::deep_ac::{DeepActorCriticAgent, DeepActorCriticAgentConfig},
    config::Params,
    device::ComputeContext,
    driver::{run_n_step, run_one_step_td, EpisodeSummary},
    env::{ContinuousActionSpace, Environment, GymEnv},
    gym,
    metrics::{MetricsSink, NullSink},
    nn::{DeepActorCritic, DeepActorCriticConfig, ShallowActorCritic, ShallowActorCriticConfig},
    session::TrainingSession,
    traits::TrainableAgent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// One-step temporal-difference updates after every step
    Td,
    /// n-step updates once the learning window is full
    NStep,
}

/// Train a deep actor-critic agent on a continuous-control environment
#[derive(Debug, Parser)]
#[command(name = "deep_ac_agent", version)]
struct Cli {
    /// Environment identifier
    #[arg(long, default_value = "Pendulum-v0")]
    env_name: String,

    /// JSON parameter file with `agent` and `env` sections
    #[arg(long, default_value = "parameters.json")]
    params_file: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Td)]
    mode: Mode,

    /// Train without writing a summary directory
    #[arg(long)]
    no_summary: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let params = Params::load(&cli.params_file)
        .with_context(|| format!("loading parameters from {}", cli.params_file.display()))?;

    let mut env = gym::make(&cli.env_name, &params.env)
        .with_context(|| format!("available environments: {}", gym::ENVIRONMENTS.join(", ")))?;
    env.seed(params.agent.seed);

    let mut session = open_session(&cli, &params)?;

    info!(
        env = %cli.env_name,
        mode = ?cli.mode,
        observation_shape = ?env.observation_shape(),
        action_dim = env.action_dim(),
        action_bounds = ?env.action_bounds(),
        episodes = params.agent.max_num_episodes,
        "starting training"
    );

    let summaries = dispatch(&params, env.as_mut(), &mut session, cli.mode)?;

    if let Some(best) = summaries.iter().max_by(|a, b| a.reward.total_cmp(&b.reward)) {
        info!(episode = best.episode, reward = best.reward, "best episode");
    }
    session.close();
    Ok(())
}

fn open_session(cli: &Cli, params: &Params) -> Result<TrainingSession> {
    if cli.no_summary {
        return Ok(TrainingSession::new(Box::new(NullSink) as Box<dyn MetricsSink>));
    }
    TrainingSession::create(params, &cli.env_name).context("opening training session")
}

/// Pick the backend from the parameters and the enabled features
fn dispatch(
    params: &Params,
    env: &mut dyn GymEnv,
    session: &mut TrainingSession,
    mode: Mode,
) -> Result<Vec<EpisodeSummary>> {
    if params.agent.use_cuda {
        #[cfg(feature = "wgpu")]
        {
            use burn::backend::{wgpu::WgpuDevice, Wgpu};
            return train::<Autodiff<Wgpu>>(params, env, session, mode, WgpuDevice::default());
        }
        #[cfg(not(feature = "wgpu"))]
        warn!("use_cuda is set but this binary was built without the `wgpu` feature; training on the CPU");
    }
    train::<Autodiff<NdArray>>(params, env, session, mode, NdArrayDevice::default())
}

/// Build the network matching the observation shape and train
fn train<B: AutodiffBackend>(
    params: &Params,
    env: &mut dyn GymEnv,
    session: &mut TrainingSession,
    mode: Mode,
    device: B::Device,
) -> Result<Vec<EpisodeSummary>> {
    let ctx = ComputeContext::<B>::seeded(device, params.agent.seed);
    let config = DeepActorCriticAgentConfig::from(&params.agent);
    let action_dim = env.action_dim();
    let episodes = params.agent.max_num_episodes;

    match env.observation_shape().as_slice() {
        &[input_dim] => {
            let model = ShallowActorCriticConfig::new(input_dim, action_dim).init::<B>(ctx.device());
            let optimizer = RmsPropConfig::new().init::<B, ShallowActorCritic<B>>();
            let mut agent = DeepActorCriticAgent::<B, _, _, 2>::new(model, optimizer, action_dim, config, &ctx);
            run(&mut agent, env, session, mode, episodes)
        }
        // environments emit channels-last frames
        &[_, _, channels] => {
            let model = DeepActorCriticConfig::new(channels, action_dim)
                .with_image_size(params.agent.image_size)
                .init::<B>(ctx.device());
            let optimizer = RmsPropConfig::new().init::<B, DeepActorCritic<B>>();
            let mut agent = DeepActorCriticAgent::<B, _, _, 4>::new(model, optimizer, action_dim, config, &ctx);
            run(&mut agent, env, session, mode, episodes)
        }
        shape => bail!("no network for observations of shape {shape:?}"),
    }
}

fn run<A: TrainableAgent>(
    agent: &mut A,
    env: &mut dyn GymEnv,
    session: &mut TrainingSession,
    mode: Mode,
    episodes: usize,
) -> Result<Vec<EpisodeSummary>> {
    let summaries = match mode {
        Mode::Td => run_one_step_td(agent, env, session, episodes)?,
        Mode::NStep => run_n_step(agent, env, session, episodes)?,
    };
    Ok(summaries)
}
