//! Model/provider profiles handed to the automation agent as `config.yaml`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name of the generated agent configuration.
pub const CONFIG_FILE: &str = "config.yaml";

/// Default provider understood by the agent library.
pub const DEFAULT_PROVIDER: &str = "GoogleGenAI";

/// Default model for every profile.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Roles the agent library looks up a profile for.
pub const PROFILE_ROLES: [&str; 8] = [
    "default",
    "manager",
    "executor",
    "codeact",
    "text_manipulator",
    "app_opener",
    "scripter",
    "structured_output",
];

/// Profile config errors.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to serialize agent config: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("Failed to write agent config: {0}")]
    Write(#[from] std::io::Error),
}

/// Agent-wide switches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSection {
    pub vision: bool,
    pub reasoning: bool,
    pub max_steps: u32,
}

/// One LLM profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmProfile {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
}

/// Complete `config.yaml` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentProfileConfig {
    pub agent: AgentSection,
    pub llm_profiles: BTreeMap<String, LlmProfile>,
}

impl Default for AgentProfileConfig {
    fn default() -> Self {
        Self::for_model(DEFAULT_PROVIDER, DEFAULT_MODEL)
    }
}

impl AgentProfileConfig {
    /// Every role pinned to the same provider and model at temperature 0.
    pub fn for_model(provider: &str, model: &str) -> Self {
        let llm_profiles = PROFILE_ROLES
            .iter()
            .map(|role| {
                (
                    role.to_string(),
                    LlmProfile {
                        provider: provider.to_string(),
                        model: model.to_string(),
                        temperature: 0.0,
                    },
                )
            })
            .collect();

        Self {
            agent: AgentSection {
                vision: true,
                reasoning: true,
                max_steps: 20,
            },
            llm_profiles,
        }
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String, ProfileError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write `config.yaml` into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<std::path::PathBuf, ProfileError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, self.to_yaml()?)?;
        Ok(path)
    }
}
