//! Built-in continuous-control environments

pub mod dot_racer;
pub mod mountain_car;
pub mod pendulum;

pub use dot_racer::DotRacer;
pub use mountain_car::MountainCarContinuous;
pub use pendulum::Pendulum;

use crate::{
    config::EnvParams,
    env::GymEnv,
    error::{Error, Result},
};

/// Identifiers accepted by [`make`]
pub const ENVIRONMENTS: [&str; 3] = ["Pendulum-v0", "MountainCarContinuous-v0", "DotRacer-v0"];

/// Instantiate an environment by identifier
pub fn make(env_name: &str, params: &EnvParams) -> Result<Box<dyn GymEnv>> {
    let env: Box<dyn GymEnv> = match env_name {
        "Pendulum-v0" => Box::new(Pendulum::new(
            params.max_episode_steps.unwrap_or(pendulum::PENDULUM_MAX_STEPS),
        )),
        "MountainCarContinuous-v0" => Box::new(MountainCarContinuous::new(
            params
                .max_episode_steps
                .unwrap_or(mountain_car::MOUNTAIN_CAR_MAX_STEPS),
        )),
        "DotRacer-v0" => Box::new(DotRacer::new(
            params.max_episode_steps.unwrap_or(dot_racer::DOT_RACER_MAX_STEPS),
        )),
        other => return Err(Error::UnknownEnvironment(other.to_string())),
    };
    Ok(env)
}
