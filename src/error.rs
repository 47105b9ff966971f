//! Error type shared by the agent, the environments and the configuration layer.

use std::path::PathBuf;

/// Errors raised by the library.
///
/// Numeric failures inside the network itself are not represented here; they
/// surface as panics from the tensor backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The policy head produced parameters that do not describe a valid Gaussian
    #[error("invalid policy distribution: {0}")]
    InvalidDistribution(String),

    /// The observation cannot be batched into the tensor rank the network expects
    #[error("observation of rank {actual} cannot feed a network expecting rank {expected} inputs")]
    ObservationRank { expected: usize, actual: usize },

    /// Observation data does not match its declared shape
    #[error("observation data holds {actual} values but its shape {shape:?} needs {expected}")]
    ObservationShape {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Action length does not match the action space
    #[error("action has {actual} components, the action space has {expected}")]
    ActionDim { expected: usize, actual: usize },

    /// Returns and transitions of a learning window are not aligned
    #[error("learning window holds {transitions} transitions but {returns} returns")]
    TrajectoryMismatch { transitions: usize, returns: usize },

    /// A learning step was requested without any recorded transition
    #[error("cannot learn from an empty trajectory")]
    EmptyTrajectory,

    /// A configuration value is out of range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParam { name: &'static str, reason: String },

    /// The environment registry has no entry for this identifier
    #[error("unknown environment `{0}`")]
    UnknownEnvironment(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
