//! Neural networks for the actor-critic agent

pub mod actor_critic;

pub use actor_critic::{
    ActorCriticModel, DeepActorCritic, DeepActorCriticConfig, ShallowActorCritic,
    ShallowActorCriticConfig,
};
