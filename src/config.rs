//! Run parameters
//!
//! Parameters are read once from a JSON file with an `agent` and an `env`
//! section and never change afterwards. Both sections are exported next to the
//! run's metrics so every experiment keeps a record of what it was run with.
//!
//! ```json
//! {
//!   "agent": {
//!     "seed": 555,
//!     "use_cuda": false,
//!     "gamma": 0.99,
//!     "max_num_episodes": 1000,
//!     "summary_file_path_prefix": "logs/DeepAC_",
//!     "learning_step_thresh": 100
//!   },
//!   "env": { "max_episode_steps": 200 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    adapters::DEFAULT_IMAGE_SIZE,
    error::{Error, Result},
};

/// Smallest image side the three unpadded 3×3 convolutions accept
pub const MIN_IMAGE_SIZE: usize = 7;

/// Agent section of the parameter file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentParams {
    /// Seeds the tensor backend and the environment
    pub seed: u64,

    /// Train on the GPU backend when the binary was built with it
    pub use_cuda: bool,

    /// Discount factor γ, in (0, 1]
    pub gamma: f32,

    pub max_num_episodes: usize,

    /// Prefix of the per-run summary directory
    pub summary_file_path_prefix: String,

    /// Optimizer learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Window length of the n-step update
    #[serde(default = "default_learning_step_thresh")]
    pub learning_step_thresh: usize,

    /// Side length image observations are resized to
    #[serde(default = "default_image_size")]
    pub image_size: usize,

    /// Stop gradients through V(s_t+1) in the one-step TD update
    #[serde(default)]
    pub detach_td_bootstrap: bool,
}

fn default_learning_rate() -> f64 {
    1e-3
}

fn default_learning_step_thresh() -> usize {
    100
}

fn default_image_size() -> usize {
    DEFAULT_IMAGE_SIZE
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            seed: 555,
            use_cuda: false,
            gamma: 0.99,
            max_num_episodes: 1000,
            summary_file_path_prefix: "logs/DeepAC_".to_string(),
            learning_rate: default_learning_rate(),
            learning_step_thresh: default_learning_step_thresh(),
            image_size: default_image_size(),
            detach_td_bootstrap: false,
        }
    }
}

/// Environment section of the parameter file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvParams {
    /// Overrides the environment's default episode length
    #[serde(default)]
    pub max_episode_steps: Option<usize>,
}

/// Complete parameter file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub agent: AgentParams,
    #[serde(default)]
    pub env: EnvParams,
}

impl Params {
    /// Read and validate a parameter file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let params: Params = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let agent = &self.agent;
        if !(agent.gamma > 0.0 && agent.gamma <= 1.0) {
            return Err(Error::InvalidParam {
                name: "gamma",
                reason: format!("{} is outside (0, 1]", agent.gamma),
            });
        }
        if !(agent.learning_rate > 0.0 && agent.learning_rate.is_finite()) {
            return Err(Error::InvalidParam {
                name: "learning_rate",
                reason: format!("{} is not a positive number", agent.learning_rate),
            });
        }
        if agent.learning_step_thresh == 0 {
            return Err(Error::InvalidParam {
                name: "learning_step_thresh",
                reason: "must be at least 1".to_string(),
            });
        }
        if agent.image_size < MIN_IMAGE_SIZE {
            return Err(Error::InvalidParam {
                name: "image_size",
                reason: format!("{} is below the minimum of {MIN_IMAGE_SIZE}", agent.image_size),
            });
        }
        if self.env.max_episode_steps == Some(0) {
            return Err(Error::InvalidParam {
                name: "max_episode_steps",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Write `agent_params.json` and `env_params.json` into `dir`
    pub fn export(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        write_json(&dir.join("agent_params.json"), &self.agent)?;
        write_json(&dir.join("env_params.json"), &self.env)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "agent": {
            "seed": 1,
            "use_cuda": false,
            "gamma": 0.9,
            "max_num_episodes": 5,
            "summary_file_path_prefix": "runs/test_"
        },
        "env": {}
    }"#;

    #[test]
    fn optional_fields_take_defaults() {
        let params: Params = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(params.agent.learning_rate, 1e-3);
        assert_eq!(params.agent.learning_step_thresh, 100);
        assert_eq!(params.agent.image_size, 84);
        assert!(!params.agent.detach_td_bootstrap);
        assert_eq!(params.env.max_episode_steps, None);
        params.validate().unwrap();
    }

    #[test]
    fn rejects_gamma_out_of_range() {
        for gamma in [0.0, -0.5, 1.5, f32::NAN] {
            let mut params = Params::default();
            params.agent.gamma = gamma;
            assert!(
                matches!(params.validate(), Err(Error::InvalidParam { name: "gamma", .. })),
                "gamma = {gamma}"
            );
        }

        let mut params = Params::default();
        params.agent.gamma = 1.0;
        params.validate().unwrap();
    }

    #[test]
    fn rejects_tiny_images_and_empty_windows() {
        let mut params = Params::default();
        params.agent.image_size = 6;
        assert!(params.validate().is_err());

        let mut params = Params::default();
        params.agent.learning_step_thresh = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn load_and_export_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        fs::write(&path, MINIMAL).unwrap();

        let params = Params::load(&path).unwrap();
        assert_eq!(params.agent.seed, 1);

        params.export(dir.path()).unwrap();
        let agent: AgentParams =
            serde_json::from_str(&fs::read_to_string(dir.path().join("agent_params.json")).unwrap()).unwrap();
        assert_eq!(agent, params.agent);
        assert!(dir.path().join("env_params.json").exists());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Params::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
