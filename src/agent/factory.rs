//! Builds configured agents for a goal.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use tracing::info;

use super::automation::{AgentError, AutomationAgent};
use super::process::{ProcessAgent, StartMessage};
use super::tools::MemoryTools;
use crate::config::{AgentProfileConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::storage::NoteStore;

/// Variable carrying the app guide text into the agent's context.
pub const APP_CARD_VARIABLE: &str = "app_card_instructions";

/// What the user asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentRequest {
    /// Natural language goal.
    pub goal: String,
    /// Optional app guide text injected as a variable.
    pub app_card: Option<String>,
    /// Ask the agent for structured output.
    pub structured_output: bool,
    /// Enable the agent's reasoning mode.
    pub reasoning: bool,
}

/// Produces agents. The orchestrator only knows this trait, so tests can
/// hand it scripted agents.
pub trait AgentLauncher: Send + Sync {
    fn launch(&self, request: &AgentRequest) -> Result<Box<dyn AutomationAgent>, AgentError>;
}

/// Configuration for the agent bridge.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Bridge executable.
    pub command: String,
    /// Extra bridge arguments.
    pub args: Vec<String>,
    /// Where `config.yaml` is written and the bridge runs.
    pub working_dir: PathBuf,
    /// Variable the API key is read from.
    pub api_key_env: String,
    /// Variable the agent library expects the key in.
    pub target_key_env: String,
    /// Explicit API key, bypassing the environment.
    pub api_key: Option<String>,
    /// LLM provider for every profile.
    pub provider: String,
    /// Model for every profile.
    pub model: String,
    /// Step budget for a single run.
    pub max_steps: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "droidrun-bridge".to_string(),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            target_key_env: "GOOGLE_API_KEY".to_string(),
            api_key: None,
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_steps: 50,
        }
    }
}

impl AgentConfig {
    /// Set the bridge command and its arguments.
    pub fn with_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.command = command.into();
        self.args = args;
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Use a fixed API key instead of reading the environment.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set provider and model.
    pub fn with_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = provider.into();
        self.model = model.into();
        self
    }
}

/// Builds [`ProcessAgent`]s with credentials, profiles, memory tools and
/// variables wired in.
#[derive(Debug, Clone)]
pub struct AgentFactory {
    config: AgentConfig,
    notes: NoteStore,
}

impl AgentFactory {
    pub fn new(config: AgentConfig, notes: NoteStore) -> Self {
        Self { config, notes }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// API key from the explicit setting or the source variable.
    pub fn resolve_api_key(&self) -> Result<String, AgentError> {
        if let Some(key) = self.config.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        env::var(&self.config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AgentError::MissingCredentials(self.config.api_key_env.clone()))
    }

    fn start_message(&self, request: &AgentRequest, config_path: PathBuf) -> StartMessage {
        let mut variables = BTreeMap::new();
        if let Some(card) = request.app_card.as_ref().filter(|c| !c.trim().is_empty()) {
            variables.insert(APP_CARD_VARIABLE.to_string(), card.clone());
        }

        StartMessage {
            goal: request.goal.clone(),
            config_path,
            reasoning: request.reasoning,
            vision: true,
            max_steps: self.config.max_steps,
            structured_output: request.structured_output,
            variables,
            tools: MemoryTools::specs(),
        }
    }
}

impl AgentLauncher for AgentFactory {
    fn launch(&self, request: &AgentRequest) -> Result<Box<dyn AutomationAgent>, AgentError> {
        let api_key = self.resolve_api_key()?;

        let config_path = AgentProfileConfig::for_model(&self.config.provider, &self.config.model)
            .write_to(&self.config.working_dir)
            .map_err(|e| AgentError::Init(e.to_string()))?;
        info!("Using: {} ({})", self.config.model, config_path.display());

        let agent = ProcessAgent::new(
            self.config.command.clone(),
            self.start_message(request, config_path),
            MemoryTools::new(self.notes.clone()),
        )
        .with_args(self.config.args.iter().cloned())
        .with_env(self.config.target_key_env.clone(), api_key)
        .with_working_dir(self.config.working_dir.clone());

        Ok(Box::new(agent))
    }
}
