//! Deep actor-critic reinforcement learning for continuous control
//!
//! A shared-trunk network outputs the mean and spread of a diagonal Gaussian
//! policy together with a state-value estimate. The agent learns either from
//! n-step windows of experience ([`driver::run_n_step`]) or after every step
//! with a one-step TD update ([`driver::run_one_step_td`]).

pub mod adapters;
pub mod algo;
pub mod config;
pub mod device;
pub mod driver;
pub mod env;
pub mod error;
pub mod gym;
pub mod metrics;
pub mod nn;
pub mod observation;
pub mod session;
pub mod traits;

pub use error::{Error, Result};
