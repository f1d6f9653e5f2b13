//! Server settings.
//!
//! Layered: built-in defaults, then `settings.json` in the platform config
//! directory (`directories::ProjectDirs`), then environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::agent::AgentConfig;
use crate::config::{DEFAULT_MODEL, DEFAULT_PROVIDER};

/// Settings for the HTTP server and its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Directory for notes, history, macros, app guides and config.yaml
    pub data_dir: PathBuf,
    /// Path to the adb binary
    pub adb_path: String,
    /// ADB device serial (optional)
    pub device_id: Option<String>,
    /// Agent bridge executable
    pub agent_command: String,
    /// Extra agent bridge arguments
    pub agent_args: Vec<String>,
    /// Variable the API key is read from
    pub api_key_env: String,
    /// Variable the agent expects the key in
    pub target_key_env: String,
    /// LLM provider written into config.yaml
    pub provider: String,
    /// Model written into config.yaml
    pub model: String,
    /// Step budget per run
    pub max_steps: u32,
    /// Deadline for a single run, in seconds
    pub task_timeout_secs: u64,
    /// Text-to-speech command used for narration
    pub tts_command: String,
    /// Speak agent actions out loud
    pub narration: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let agent = AgentConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("."),
            adb_path: "adb".to_string(),
            device_id: None,
            agent_command: agent.command,
            agent_args: agent.args,
            api_key_env: agent.api_key_env,
            target_key_env: agent.target_key_env,
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_steps: agent.max_steps,
            task_timeout_secs: 300,
            tts_command: "espeak".to_string(),
            narration: true,
        }
    }
}

impl Settings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "moderras", "phone-agent-server")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file and the process environment.
    pub fn load() -> Self {
        let mut settings = Self::settings_path()
            .and_then(|path| Self::from_file(&path))
            .unwrap_or_default();
        settings.apply_env(|key| env::var(key).ok());
        settings
    }

    fn from_file(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Ignoring malformed {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Override fields from environment variables looked up through `lookup`.
    /// Unparseable numbers and booleans are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("PHONE_AGENT_HOST") {
            self.host = v;
        }
        if let Some(v) = var("PHONE_AGENT_PORT") {
            parse_into("PHONE_AGENT_PORT", &v, &mut self.port);
        }
        if let Some(v) = var("PHONE_AGENT_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("ADB_PATH") {
            self.adb_path = v;
        }
        if let Some(v) = var("ADB_DEVICE_ID") {
            self.device_id = Some(v);
        }
        if let Some(v) = var("AGENT_COMMAND") {
            self.agent_command = v;
        }
        if let Some(v) = var("AGENT_ARGS") {
            self.agent_args = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(v) = var("AGENT_API_KEY_ENV") {
            self.api_key_env = v;
        }
        if let Some(v) = var("AGENT_TARGET_KEY_ENV") {
            self.target_key_env = v;
        }
        if let Some(v) = var("AGENT_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = var("AGENT_MODEL") {
            self.model = v;
        }
        if let Some(v) = var("AGENT_MAX_STEPS") {
            parse_into("AGENT_MAX_STEPS", &v, &mut self.max_steps);
        }
        if let Some(v) = var("TASK_TIMEOUT_SECS") {
            parse_into("TASK_TIMEOUT_SECS", &v, &mut self.task_timeout_secs);
        }
        if let Some(v) = var("TTS_COMMAND") {
            self.tts_command = v;
        }
        if let Some(v) = var("NARRATION") {
            match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.narration = true,
                "0" | "false" | "no" | "off" => self.narration = false,
                _ => warn!("Ignoring NARRATION={}", v),
            }
        }
    }

    /// Address the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Agent bridge configuration derived from these settings.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            api_key_env: self.api_key_env.clone(),
            target_key_env: self.target_key_env.clone(),
            max_steps: self.max_steps,
            ..AgentConfig::default()
        }
        .with_command(self.agent_command.clone(), self.agent_args.clone())
        .with_working_dir(self.data_dir.clone())
        .with_model(self.provider.clone(), self.model.clone())
    }
}

fn parse_into<T: std::str::FromStr>(key: &str, value: &str, slot: &mut T) {
    match value.trim().parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("Ignoring {}={}", key, value),
    }
}
