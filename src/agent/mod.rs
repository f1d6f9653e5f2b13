//! Boundary to the external automation agent.

mod automation;
mod factory;
mod outcome;
mod process;
mod tools;

pub use automation::{AgentError, AgentEvent, AutomationAgent, EventCallback};
pub use factory::{AgentConfig, AgentFactory, AgentLauncher, AgentRequest, APP_CARD_VARIABLE};
pub use outcome::{
    final_answer, hint_for, normalize, AgentOutcome, Normalized, ResultRecord, COMPLETION_MARKER,
    INVALID_RESPONSE_MARKER,
};
pub use process::{ProcessAgent, StartMessage};
pub use tools::{MemoryTools, ToolSpec};
