//! Engine configuration, persisted as TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Safety bounds for one consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Outer evaluate+propagate passes per answer.
    #[serde(default = "default_max_evaluation_passes")]
    pub max_evaluation_passes: usize,
    /// Propagation iterations per outer pass.
    #[serde(default = "default_max_propagation_iterations")]
    pub max_propagation_iterations: usize,
    /// Depth bound for the question selector's descent into sub-goals.
    #[serde(default = "default_max_question_depth")]
    pub max_question_depth: usize,
}

fn default_max_evaluation_passes() -> usize {
    10
}
fn default_max_propagation_iterations() -> usize {
    100
}
fn default_max_question_depth() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_evaluation_passes: default_max_evaluation_passes(),
            max_propagation_iterations: default_max_propagation_iterations(),
            max_question_depth: default_max_question_depth(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
