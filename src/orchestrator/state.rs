//! Session state for the single in-flight task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Log lines returned by a status snapshot.
pub const STATUS_LOG_LIMIT: usize = 100;

/// Log lines kept in memory.
pub const MAX_LOG_ENTRIES: usize = 1000;

/// Lifecycle of the current (or last) task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
    Stopped,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to the running background task.
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub id: Uuid,
    pub cancel: CancellationToken,
}

/// Everything the status endpoint reports, plus the bookkeeping needed to
/// stop a run and put the keyboard back.
#[derive(Debug, Default)]
pub struct SessionState {
    pub status: TaskStatus,
    logs: VecDeque<String>,
    pub result: Option<String>,
    pub step_count: u32,
    /// Keyboard active before the run switched it.
    pub original_keyboard: Option<String>,
    pub active: Option<ActiveTask>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Reset per-run fields and mark `task` as the active run.
    pub fn begin_run(&mut self, task: ActiveTask) {
        self.status = TaskStatus::Running;
        self.logs.clear();
        self.result = None;
        self.step_count = 0;
        self.original_keyboard = None;
        self.active = Some(task);
        self.started_at = Some(Utc::now());
        self.finished_at = None;
    }

    /// Release the active handle if it still belongs to run `id`.
    pub fn end_run(&mut self, id: Uuid) {
        if self.active.as_ref().map(|task| task.id) == Some(id) {
            self.active = None;
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Append a user-facing log line.
    pub fn push_log(&mut self, line: impl Into<String>) {
        if self.logs.len() == MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(line.into());
    }

    /// Up to `limit` most recent log lines, oldest first.
    pub fn recent_logs(&self, limit: usize) -> Vec<String> {
        let skip = self.logs.len().saturating_sub(limit);
        self.logs.iter().skip(skip).cloned().collect()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            logs: self.recent_logs(STATUS_LOG_LIMIT),
            result: self.result.clone(),
            step_count: self.step_count,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub status: TaskStatus,
    pub logs: Vec<String>,
    pub result: Option<String>,
    pub step_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
