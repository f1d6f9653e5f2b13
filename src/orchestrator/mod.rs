//! Single-task orchestration: session state and the background run.

mod runner;
mod state;

pub use runner::{
    timeout_message, Orchestrator, StartError, DEFAULT_TASK_TIMEOUT, MIN_COMMAND_LEN,
    TIMEOUT_MESSAGE,
};
pub use state::{
    ActiveTask, SessionState, StatusSnapshot, TaskStatus, MAX_LOG_ENTRIES, STATUS_LOG_LIMIT,
};
