/// Deep Actor-Critic agent
pub mod deep_ac;

/// Diagonal Gaussian policy
pub mod gaussian;

pub mod returns;
