//! Background task lifecycle: one agent run at a time, with a deadline,
//! cooperative cancellation and keyboard restoration on every exit path.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use super::state::{ActiveTask, SessionState, StatusSnapshot, TaskStatus};
use crate::adb::{DeviceBridge, DEFAULT_IME};
use crate::agent::{
    final_answer, hint_for, normalize, AgentEvent, AgentLauncher, AgentRequest, EventCallback,
    COMPLETION_MARKER,
};
use crate::narration::{narration_for, NotifierRef, SilentNotifier};
use crate::storage::{CommandHistory, NoteStore};

/// Hard limit for a single agent run.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Result text recorded when a run hits [`DEFAULT_TASK_TIMEOUT`].
pub const TIMEOUT_MESSAGE: &str = "Task exceeded 5 minute timeout";

/// Shortest accepted command, after trimming.
pub const MIN_COMMAND_LEN: usize = 3;

/// Why a run could not be started.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    #[error("Agent is busy. Stop current task first.")]
    Busy,
    #[error("Command too short or empty")]
    InvalidCommand,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Succeeded { text: String, completed: bool },
    Failed(String),
    TimedOut,
    Stopped,
    Crashed(String),
}

/// Owns the session state and drives agent runs.
///
/// Shared as `Arc<Orchestrator>`; [`Orchestrator::start`] spawns the run on
/// the current tokio runtime.
pub struct Orchestrator {
    state: Mutex<SessionState>,
    device: Arc<dyn DeviceBridge>,
    launcher: Arc<dyn AgentLauncher>,
    notes: NoteStore,
    history: CommandHistory,
    notifier: NotifierRef,
    task_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        device: Arc<dyn DeviceBridge>,
        launcher: Arc<dyn AgentLauncher>,
        notes: NoteStore,
        history: CommandHistory,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            device,
            launcher,
            notes,
            history,
            notifier: Arc::new(SilentNotifier),
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    /// Announce agent actions through `notifier`.
    pub fn with_notifier(mut self, notifier: NotifierRef) -> Self {
        self.notifier = notifier;
        self
    }

    /// Override the per-run deadline.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn device(&self) -> &Arc<dyn DeviceBridge> {
        &self.device
    }

    pub fn notifier(&self) -> &NotifierRef {
        &self.notifier
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn status(&self) -> TaskStatus {
        self.lock().status
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_busy()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a command and launch its run in the background.
    ///
    /// Rejected with [`StartError::Busy`] while another run is active and with
    /// [`StartError::InvalidCommand`] when the trimmed command is shorter than
    /// [`MIN_COMMAND_LEN`] characters.
    pub fn start(self: &Arc<Self>, request: AgentRequest) -> Result<Uuid, StartError> {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        {
            let mut state = self.lock();
            if state.is_busy() {
                return Err(StartError::Busy);
            }
            if request.goal.trim().chars().count() < MIN_COMMAND_LEN {
                return Err(StartError::InvalidCommand);
            }
            state.begin_run(ActiveTask {
                id,
                cancel: cancel.clone(),
            });
        }

        let this = Arc::clone(self);
        tokio::spawn(async move { this.drive(id, request, cancel).await });
        Ok(id)
    }

    /// Cancel the active run and put the keyboard back right away.
    /// Returns `false` when nothing was running.
    pub async fn stop(&self) -> bool {
        let keyboard = {
            let state = self.lock();
            let Some(active) = &state.active else {
                return false;
            };
            active.cancel.cancel();
            state.original_keyboard.clone()
        };

        info!("🛑 Stop requested");
        if let Some(keyboard) = keyboard {
            self.device.set_keyboard(&keyboard).await;
        }
        true
    }

    /// Restore the captured keyboard, or the default IME if none was
    /// captured. Returns the IME that was set.
    pub async fn fix_keyboard(&self) -> String {
        let target = self
            .lock()
            .original_keyboard
            .clone()
            .unwrap_or_else(|| DEFAULT_IME.to_string());
        self.device.set_keyboard(&target).await;
        target
    }

    async fn drive(self: Arc<Self>, id: Uuid, request: AgentRequest, cancel: CancellationToken) {
        self.notes.clear();
        self.history.push(&request.goal);
        info!("🚀 Starting task: {}", request.goal);

        let keyboard = self.device.current_keyboard().await;
        if let Some(keyboard) = &keyboard {
            info!("📱 Original keyboard: {}", keyboard);
        }
        self.lock().original_keyboard = keyboard.clone();

        let verdict = tokio::select! {
            biased;
            _ = cancel.cancelled() => Verdict::Stopped,
            verdict = self.execute(&request) => verdict,
        };
        self.record(verdict);

        if let Some(keyboard) = keyboard {
            info!("♻️ Restoring original keyboard...");
            self.device.set_keyboard(&keyboard).await;
        }

        let mut state = self.lock();
        state.end_run(id);
        info!("🏁 Task ended with status: {}", state.status);
    }

    async fn execute(self: &Arc<Self>, request: &AgentRequest) -> Verdict {
        let agent = match self.launcher.launch(request) {
            Ok(agent) => agent,
            Err(e) => return Verdict::Crashed(e.to_string()),
        };
        self.lock()
            .push_log(format!("▶️ Executing: {}", request.goal));

        match tokio::time::timeout(self.task_timeout, agent.run(self.event_callback())).await {
            Err(_) => Verdict::TimedOut,
            Ok(Err(e)) => Verdict::Crashed(e.to_string()),
            Ok(Ok(outcome)) => {
                let normalized = normalize(&outcome, request.structured_output);
                if normalized.success {
                    Verdict::Succeeded {
                        completed: normalized.text.contains(COMPLETION_MARKER),
                        text: normalized.text,
                    }
                } else {
                    Verdict::Failed(normalized.text)
                }
            }
        }
    }

    fn event_callback(self: &Arc<Self>) -> EventCallback {
        let this = Arc::clone(self);
        Arc::new(move |event| this.on_agent_event(event))
    }

    fn on_agent_event(&self, event: AgentEvent) {
        let phrase = match &event {
            AgentEvent::Action { name, .. } | AgentEvent::ToolCall { name } => narration_for(name),
            AgentEvent::Log(_) => None,
        };

        {
            let mut state = self.lock();
            match event {
                AgentEvent::Action { name, detail } => {
                    state.step_count += 1;
                    let line = match detail {
                        Some(detail) => format!("🎯 Step {}: {} ({})", state.step_count, name, detail),
                        None => format!("🎯 Step {}: {}", state.step_count, name),
                    };
                    state.push_log(line);
                }
                AgentEvent::ToolCall { name } => state.push_log(format!("🧠 Tool: {}", name)),
                AgentEvent::Log(message) => state.push_log(message),
            }
        }

        if let Some(phrase) = phrase {
            self.notifier.announce(phrase);
        }
    }

    fn record(&self, verdict: Verdict) {
        let mut state = self.lock();
        match verdict {
            Verdict::Succeeded { text, completed } => {
                state.status = TaskStatus::Success;
                let (answer, line) = if completed {
                    let answer = final_answer(&text);
                    let line = format!("✅ Task completed: {}", answer);
                    (answer, line)
                } else {
                    let line = format!("✅ Success: {}", text);
                    (text, line)
                };
                state.result = Some(answer);
                state.push_log(line);
            }
            Verdict::Failed(text) => {
                let text = if text.is_empty() {
                    "Unknown failure".to_string()
                } else {
                    text
                };
                state.status = TaskStatus::Failed;
                state.push_log(format!("❌ Failed: {}", text));
                if let Some(hint) = hint_for(&text) {
                    state.push_log(hint);
                }
                state.result = Some(text);
            }
            Verdict::TimedOut => {
                state.status = TaskStatus::Failed;
                state.push_log(timed_out_log(self.task_timeout));
                state.result = Some(timeout_message(self.task_timeout));
            }
            Verdict::Stopped => {
                state.status = TaskStatus::Stopped;
                state.push_log("🛑 Task manually stopped by user");
            }
            Verdict::Crashed(message) => {
                error!("Agent crashed: {}", message);
                state.status = TaskStatus::Error;
                state.push_log(format!("💥 Error: {}", message));
                if let Some(hint) = hint_for(&message) {
                    state.push_log(hint);
                }
                state.result = Some(message);
            }
        }
    }
}

/// Result text for a run that hit `timeout`.
pub fn timeout_message(timeout: Duration) -> String {
    let (amount, unit) = describe(timeout);
    format!("Task exceeded {} {} timeout", amount, unit)
}

/// Log line recorded when a run hits `timeout`.
fn timed_out_log(timeout: Duration) -> String {
    let (amount, unit) = describe(timeout);
    let plural = if amount == 1 { "" } else { "s" };
    format!("⏱️ Task timed out after {} {}{}", amount, unit, plural)
}

fn describe(duration: Duration) -> (u128, &'static str) {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        (millis, "millisecond")
    } else if millis >= 60_000 && millis % 60_000 == 0 {
        (millis / 60_000, "minute")
    } else {
        (millis / 1000, "second")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::{DeviceInfo, WirelessOutcome};
    use crate::agent::{AgentError, AgentOutcome, AutomationAgent};
    use crate::narration::Notifier;
    use crate::storage::BestEffortStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeDevice {
        keyboard: Option<String>,
        set_calls: Mutex<Vec<String>>,
    }

    impl FakeDevice {
        fn with_keyboard(ime: &str) -> Self {
            Self {
                keyboard: Some(ime.to_string()),
                ..Default::default()
            }
        }

        fn set_calls(&self) -> Vec<String> {
            self.set_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceBridge for FakeDevice {
        async fn current_keyboard(&self) -> Option<String> {
            self.keyboard.clone()
        }

        async fn set_keyboard(&self, ime_id: &str) {
            self.set_calls.lock().unwrap().push(ime_id.to_string());
        }

        async fn connect_wireless(&self, _ip: &str, _port: &str) -> WirelessOutcome {
            WirelessOutcome {
                success: false,
                message: "not supported".to_string(),
            }
        }

        async fn list_devices(&self) -> Vec<DeviceInfo> {
            Vec::new()
        }
    }

    #[derive(Clone)]
    enum Script {
        Finish(Vec<AgentEvent>, serde_json::Value),
        Hang,
        Crash(String),
        LaunchFails,
    }

    struct ScriptedAgent(Script);

    #[async_trait]
    impl AutomationAgent for ScriptedAgent {
        async fn run(self: Box<Self>, on_event: EventCallback) -> Result<AgentOutcome, AgentError> {
            match self.0 {
                Script::Finish(events, value) => {
                    for event in events {
                        on_event(event);
                    }
                    Ok(AgentOutcome::from_value(value))
                }
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(AgentOutcome::Opaque("late".to_string()))
                }
                Script::Crash(message) => Err(AgentError::Init(message)),
                Script::LaunchFails => unreachable!(),
            }
        }
    }

    struct ScriptedLauncher {
        script: Script,
        launches: AtomicUsize,
        requests: Mutex<Vec<AgentRequest>>,
    }

    impl ScriptedLauncher {
        fn new(script: Script) -> Self {
            Self {
                script,
                launches: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl AgentLauncher for ScriptedLauncher {
        fn launch(&self, request: &AgentRequest) -> Result<Box<dyn AutomationAgent>, AgentError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            match &self.script {
                Script::LaunchFails => Err(AgentError::MissingCredentials("GOOGLE_API_KEY".into())),
                script => Ok(Box::new(ScriptedAgent(script.clone()))),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<String>>);

    impl Notifier for RecordingNotifier {
        fn announce(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    struct Harness {
        _dir: TempDir,
        store: BestEffortStore,
        device: Arc<FakeDevice>,
        launcher: Arc<ScriptedLauncher>,
        notifier: Arc<RecordingNotifier>,
        orchestrator: Arc<Orchestrator>,
    }

    fn harness(script: Script, device: FakeDevice, timeout: Duration) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = BestEffortStore::new(dir.path());
        let device = Arc::new(device);
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = Arc::new(
            Orchestrator::new(
                device.clone(),
                launcher.clone(),
                NoteStore::new(store.clone()),
                CommandHistory::new(store.clone()),
            )
            .with_notifier(notifier.clone())
            .with_task_timeout(timeout),
        );
        Harness {
            _dir: dir,
            store,
            device,
            launcher,
            notifier,
            orchestrator,
        }
    }

    fn request(goal: &str) -> AgentRequest {
        AgentRequest {
            goal: goal.to_string(),
            ..Default::default()
        }
    }

    async fn wait_idle(orchestrator: &Orchestrator) {
        for _ in 0..500 {
            if !orchestrator.is_busy() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task did not finish");
    }

    #[tokio::test]
    async fn test_completion_marker_is_stripped() {
        let h = harness(
            Script::Finish(vec![], json!({"success": true, "reason": "TASK_COMPLETE:   Cheapest is ₹899  "})),
            FakeDevice::with_keyboard("com.example/.Ime"),
            DEFAULT_TASK_TIMEOUT,
        );

        h.orchestrator.start(request("find the cheapest jeans")).unwrap();
        wait_idle(&h.orchestrator).await;

        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.status, TaskStatus::Success);
        assert_eq!(snapshot.result.as_deref(), Some("Cheapest is ₹899"));
        assert!(snapshot.logs.iter().any(|l| l == "✅ Task completed: Cheapest is ₹899"));
        assert_eq!(h.device.set_calls(), vec!["com.example/.Ime"]);
    }

    #[tokio::test]
    async fn test_short_commands_are_rejected() {
        let h = harness(Script::Hang, FakeDevice::default(), DEFAULT_TASK_TIMEOUT);

        for command in ["", "  ", "ab", "  ab  ", "!?"] {
            assert_eq!(
                h.orchestrator.start(request(command)),
                Err(StartError::InvalidCommand)
            );
        }
        assert_eq!(h.orchestrator.status(), TaskStatus::Idle);
        assert!(!h.orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_busy_rejects_second_run() {
        let h = harness(Script::Hang, FakeDevice::with_keyboard("kb/.One"), DEFAULT_TASK_TIMEOUT);

        h.orchestrator.start(request("scroll the feed")).unwrap();
        assert_eq!(
            h.orchestrator.start(request("open the camera")),
            Err(StartError::Busy)
        );
        // Validation never masks the conflict.
        assert_eq!(h.orchestrator.start(request("x")), Err(StartError::Busy));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.launcher.launches.load(Ordering::SeqCst), 1);

        assert!(h.orchestrator.stop().await);
        wait_idle(&h.orchestrator).await;
        assert_eq!(h.orchestrator.status(), TaskStatus::Stopped);
        assert!(h
            .orchestrator
            .snapshot()
            .logs
            .iter()
            .any(|l| l == "🛑 Task manually stopped by user"));
        // Restored by stop and again by cleanup.
        assert_eq!(h.device.set_calls(), vec!["kb/.One", "kb/.One"]);
    }

    #[tokio::test]
    async fn test_stop_without_task() {
        let h = harness(Script::Hang, FakeDevice::default(), DEFAULT_TASK_TIMEOUT);
        assert!(!h.orchestrator.stop().await);
        assert!(h.device.set_calls().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_marks_failed_and_restores_keyboard() {
        let h = harness(
            Script::Hang,
            FakeDevice::with_keyboard("kb/.Two"),
            Duration::from_millis(50),
        );

        h.orchestrator.start(request("wait forever")).unwrap();
        wait_idle(&h.orchestrator).await;

        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(
            snapshot.result,
            Some(timeout_message(Duration::from_millis(50)))
        );
        assert!(snapshot
            .logs
            .contains(&"⏱️ Task timed out after 50 milliseconds".to_string()));
        assert_eq!(h.device.set_calls(), vec!["kb/.Two"]);
    }

    #[test]
    fn test_timed_out_log_wording() {
        assert_eq!(
            timed_out_log(DEFAULT_TASK_TIMEOUT),
            "⏱️ Task timed out after 5 minutes"
        );
        assert_eq!(
            timed_out_log(Duration::from_secs(60)),
            "⏱️ Task timed out after 1 minute"
        );
        assert_ne!(timed_out_log(DEFAULT_TASK_TIMEOUT), TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_timeout_message_wording() {
        assert_eq!(timeout_message(DEFAULT_TASK_TIMEOUT), TIMEOUT_MESSAGE);
        assert_eq!(
            timeout_message(Duration::from_secs(45)),
            "Task exceeded 45 second timeout"
        );
        assert_eq!(
            timeout_message(Duration::from_millis(50)),
            "Task exceeded 50 millisecond timeout"
        );
    }

    #[tokio::test]
    async fn test_failure_gets_hint() {
        let h = harness(
            Script::Finish(vec![], json!({"success": false, "output": "HTTP 429 from provider"})),
            FakeDevice::default(),
            DEFAULT_TASK_TIMEOUT,
        );

        h.orchestrator.start(request("book a cab")).unwrap();
        wait_idle(&h.orchestrator).await;

        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(snapshot.result.as_deref(), Some("HTTP 429 from provider"));
        assert!(snapshot.logs.iter().any(|l| l.contains("rate limit")));
        // No keyboard was captured, so nothing is restored.
        assert!(h.device.set_calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_failure_text() {
        let h = harness(
            Script::Finish(vec![], json!({"success": false, "reason": ""})),
            FakeDevice::default(),
            DEFAULT_TASK_TIMEOUT,
        );

        h.orchestrator.start(request("do something")).unwrap();
        wait_idle(&h.orchestrator).await;

        assert_eq!(
            h.orchestrator.snapshot().result.as_deref(),
            Some("Unknown failure")
        );
    }

    #[tokio::test]
    async fn test_crash_records_error() {
        let h = harness(
            Script::Crash("Manager response invalid".to_string()),
            FakeDevice::with_keyboard("kb/.Three"),
            DEFAULT_TASK_TIMEOUT,
        );

        h.orchestrator.start(request("send a message")).unwrap();
        wait_idle(&h.orchestrator).await;

        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert!(snapshot.result.unwrap().contains("Manager response invalid"));
        assert!(snapshot.logs.iter().any(|l| l.starts_with("💡")));
        assert_eq!(h.device.set_calls(), vec!["kb/.Three"]);
    }

    #[tokio::test]
    async fn test_launch_failure_records_error() {
        let h = harness(Script::LaunchFails, FakeDevice::default(), DEFAULT_TASK_TIMEOUT);

        h.orchestrator.start(request("open maps")).unwrap();
        wait_idle(&h.orchestrator).await;

        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert!(snapshot.result.unwrap().contains("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_run_prepares_notes_history_and_events() {
        let h = harness(
            Script::Finish(
                vec![
                    AgentEvent::Action {
                        name: "open_app".to_string(),
                        detail: Some("Settings".to_string()),
                    },
                    AgentEvent::ToolCall {
                        name: "save_note".to_string(),
                    },
                    AgentEvent::Log("thinking about wifi".to_string()),
                    AgentEvent::Action {
                        name: "click".to_string(),
                        detail: None,
                    },
                ],
                json!({"output": "Wi-Fi is on"}),
            ),
            FakeDevice::default(),
            DEFAULT_TASK_TIMEOUT,
        );
        let notes = NoteStore::new(h.store.clone());
        notes.save("stale", "from last run");

        let mut req = request("  turn on wifi ");
        req.app_card = Some("Settings > Network".to_string());
        h.orchestrator.start(req).unwrap();
        wait_idle(&h.orchestrator).await;

        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.status, TaskStatus::Success);
        assert_eq!(snapshot.result.as_deref(), Some("Wi-Fi is on"));
        assert_eq!(snapshot.step_count, 2);
        assert!(snapshot.logs.contains(&"🎯 Step 1: open_app (Settings)".to_string()));
        assert!(snapshot.logs.contains(&"thinking about wifi".to_string()));
        assert!(notes.read_all().is_empty());
        assert_eq!(h.orchestrator.history().list(), vec!["  turn on wifi "]);
        assert_eq!(
            *h.notifier.0.lock().unwrap(),
            vec!["Opening app", "Clicking"]
        );
        assert_eq!(
            h.launcher.requests.lock().unwrap()[0].app_card.as_deref(),
            Some("Settings > Network")
        );
    }

    #[tokio::test]
    async fn test_fix_keyboard_defaults() {
        let h = harness(Script::Hang, FakeDevice::default(), DEFAULT_TASK_TIMEOUT);
        assert_eq!(h.orchestrator.fix_keyboard().await, DEFAULT_IME);
        assert_eq!(h.device.set_calls(), vec![DEFAULT_IME]);
    }

    #[tokio::test]
    async fn test_new_run_after_finish() {
        let h = harness(
            Script::Finish(vec![], json!({"reason": "done"})),
            FakeDevice::default(),
            DEFAULT_TASK_TIMEOUT,
        );

        h.orchestrator.start(request("first task")).unwrap();
        wait_idle(&h.orchestrator).await;
        h.orchestrator.start(request("second task")).unwrap();
        wait_idle(&h.orchestrator).await;

        assert_eq!(h.launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(h.orchestrator.history().list(), vec!["second task", "first task"]);
    }
}
