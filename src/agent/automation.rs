//! The seam between the server and the external automation agent.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::outcome::AgentOutcome;

/// Agent errors.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0} not found in environment. Please add {0}=your_key_here to your .env file.")]
    MissingCredentials(String),
    #[error("Failed to initialize agent: {0}")]
    Init(String),
    #[error("Failed to start agent '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Agent I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Agent exited ({status}) without reporting a result{stderr}")]
    NoResult { status: String, stderr: String },
}

/// Progress reported by the agent while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A UI action such as `click` or `open_app`.
    Action { name: String, detail: Option<String> },
    /// A call to one of the injected tools.
    ToolCall { name: String },
    /// Free-form progress text.
    Log(String),
}

/// Receives agent events. Called inline on the agent's task, so it must be
/// cheap and must not block.
pub type EventCallback = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// A configured agent, ready to pursue one goal.
///
/// Dropping the future returned by [`AutomationAgent::run`] must stop the
/// agent; that is how timeouts and cancellation reach it.
#[async_trait]
pub trait AutomationAgent: Send {
    /// Run to completion and report the outcome.
    async fn run(self: Box<Self>, on_event: EventCallback) -> Result<AgentOutcome, AgentError>;
}
