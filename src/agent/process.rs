//! Agent backed by an external bridge process.
//!
//! The bridge hosts the automation library and talks JSON lines over stdio:
//!
//! ```text
//! host  -> agent  {"type":"start","goal":"...","tools":[...],...}
//! agent -> host   {"type":"action","name":"click","detail":"Search"}
//! agent -> host   {"type":"tool_call","id":"1","name":"save_note","args":{...}}
//! host  -> agent  {"type":"tool_result","id":"1","name":"save_note","output":"..."}
//! agent -> host   {"type":"result","value":{"success":true,"reason":"..."}}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::automation::{AgentError, AgentEvent, AutomationAgent, EventCallback};
use super::outcome::AgentOutcome;
use super::tools::{MemoryTools, ToolSpec};

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// How long the bridge may linger after reporting its result.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// First message sent to the bridge.
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    pub goal: String,
    pub config_path: PathBuf,
    pub reasoning: bool,
    pub vision: bool,
    pub max_steps: u32,
    pub structured_output: bool,
    pub variables: BTreeMap<String, String>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostMessage<'a> {
    Start(&'a StartMessage),
    ToolResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        output: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeMessage {
    Action {
        name: String,
        #[serde(default)]
        detail: Option<String>,
    },
    Log {
        message: String,
    },
    ToolCall {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        args: Value,
    },
    Result {
        #[serde(default)]
        value: Value,
    },
}

/// Runs one goal in a freshly spawned bridge process.
pub struct ProcessAgent {
    command: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
    start: StartMessage,
    tools: MemoryTools,
}

impl ProcessAgent {
    pub fn new(command: impl Into<String>, start: StartMessage, tools: MemoryTools) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            start,
            tools,
        }
    }

    /// Extra command-line arguments.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Environment variable for the bridge process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Working directory for the bridge process.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl AutomationAgent for ProcessAgent {
    async fn run(self: Box<Self>, on_event: EventCallback) -> Result<AgentOutcome, AgentError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        info!("Spawning agent bridge: {} {}", self.command, self.args.join(" "));
        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(AgentError::Init("agent bridge stdio unavailable".to_string()));
        };

        let mut stderr_tail = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("agent stderr: {}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        // The bridge may ignore stdin entirely, so a failed write is not fatal.
        let mut stdin_open = send(&mut stdin, &HostMessage::Start(&self.start)).await;

        let mut outcome = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message = match serde_json::from_str::<BridgeMessage>(line) {
                Ok(message) => message,
                Err(_) => {
                    debug!("agent: {}", line);
                    continue;
                }
            };

            match message {
                BridgeMessage::Action { name, detail } => {
                    on_event(AgentEvent::Action { name, detail });
                }
                BridgeMessage::Log { message } => {
                    on_event(AgentEvent::Log(message));
                }
                BridgeMessage::ToolCall { id, name, args } => {
                    on_event(AgentEvent::ToolCall { name: name.clone() });
                    let output = self.tools.call(&name, &args);
                    if stdin_open {
                        let reply = HostMessage::ToolResult { id, name, output };
                        stdin_open = send(&mut stdin, &reply).await;
                    }
                }
                BridgeMessage::Result { value } => {
                    outcome = Some(AgentOutcome::from_value(value));
                    break;
                }
            }
        }

        drop(stdin);
        if let Some(outcome) = outcome {
            // Give the bridge a moment to exit; kill_on_drop covers stragglers.
            if tokio::time::timeout(EXIT_GRACE, child.wait()).await.is_err() {
                debug!("Agent bridge still running after result, killing it");
            }
            return Ok(outcome);
        }

        let status = child.wait().await?;
        // A grandchild may still hold stderr open.
        let tail = match tokio::time::timeout(EXIT_GRACE, &mut stderr_tail).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                stderr_tail.abort();
                String::new()
            }
        };
        Err(AgentError::NoResult {
            status: status.to_string(),
            stderr: if tail.is_empty() {
                String::new()
            } else {
                format!(": {}", tail)
            },
        })
    }
}

/// Write one JSON line. Returns whether the pipe is still usable.
async fn send<W, T>(writer: &mut W, message: &T) -> bool
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = match serde_json::to_string(message) {
        Ok(line) => line,
        Err(e) => {
            warn!("Failed to encode message for agent: {}", e);
            return true;
        }
    };
    line.push('\n');

    let written = async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    };
    match written.await {
        Ok(()) => true,
        Err(e) => {
            debug!("Agent stdin closed: {}", e);
            false
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::storage::{BestEffortStore, NoteStore};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn start_message() -> StartMessage {
        StartMessage {
            goal: "check the weather".to_string(),
            config_path: PathBuf::from("config.yaml"),
            reasoning: false,
            vision: true,
            max_steps: 50,
            structured_output: false,
            variables: BTreeMap::new(),
            tools: MemoryTools::specs(),
        }
    }

    fn script_agent(dir: &TempDir, script: &str) -> Box<ProcessAgent> {
        let notes = NoteStore::new(BestEffortStore::new(dir.path()));
        Box::new(
            ProcessAgent::new("sh", start_message(), MemoryTools::new(notes))
                .with_args(["-c", script])
                .with_working_dir(dir.path()),
        )
    }

    fn recorder() -> (EventCallback, Arc<Mutex<Vec<AgentEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: EventCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
        (callback, events)
    }

    #[tokio::test]
    async fn test_events_and_result() {
        let dir = TempDir::new().unwrap();
        let script = r#"read start
echo 'starting up'
echo '{"type":"action","name":"open_app","detail":"Weather"}'
echo '{"type":"log","message":"reading forecast"}'
echo '{"type":"result","value":{"success":true,"reason":"TASK_COMPLETE: Sunny"}}'
"#;
        let (callback, events) = recorder();

        let outcome = script_agent(&dir, script).run(callback).await.unwrap();

        match outcome {
            AgentOutcome::Record(record) => {
                assert_eq!(record.success, Some(true));
                assert_eq!(record.reason, Some(Value::String("TASK_COMPLETE: Sunny".into())));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                AgentEvent::Action {
                    name: "open_app".to_string(),
                    detail: Some("Weather".to_string()),
                },
                AgentEvent::Log("reading forecast".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_calls_reach_note_store() {
        let dir = TempDir::new().unwrap();
        let script = r#"read start
echo '{"type":"tool_call","id":"1","name":"save_note","args":{"key":"city","value":"Pune"}}'
read reply
case "$reply" in
  *tool_result*) echo '{"type":"result","value":{"output":"saved"}}' ;;
  *) echo '{"type":"result","value":{"success":false,"output":"no reply"}}' ;;
esac
"#;
        let (callback, events) = recorder();

        let outcome = script_agent(&dir, script).run(callback).await.unwrap();

        assert_eq!(
            crate::agent::normalize(&outcome, false).text,
            "saved".to_string()
        );
        let notes = NoteStore::new(BestEffortStore::new(dir.path())).read_all();
        assert_eq!(notes.get("city").map(String::as_str), Some("Pune"));
        assert_eq!(
            *events.lock().unwrap(),
            vec![AgentEvent::ToolCall {
                name: "save_note".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_exit_without_result() {
        let dir = TempDir::new().unwrap();
        let (callback, _events) = recorder();

        let err = script_agent(&dir, "echo 'quota exhausted' >&2; exit 3")
            .run(callback)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("without reporting a result"));
        assert!(message.contains("quota exhausted"));
    }

    #[tokio::test]
    async fn test_inherited_stderr_does_not_hold_the_run() {
        let dir = TempDir::new().unwrap();
        let (callback, _events) = recorder();
        let agent = script_agent(&dir, "read start; sleep 30 >/dev/null & exit 3");

        let result = tokio::time::timeout(EXIT_GRACE * 3, agent.run(callback))
            .await
            .expect("run should end soon after the bridge exits");

        assert!(matches!(result, Err(AgentError::NoResult { .. })));
    }

    #[tokio::test]
    async fn test_dropping_run_kills_bridge() {
        let dir = TempDir::new().unwrap();
        let (callback, _events) = recorder();
        let agent = script_agent(&dir, "read start; echo $$ > pid; exec sleep 30");

        let timed_out = tokio::time::timeout(Duration::from_millis(500), agent.run(callback)).await;
        assert!(timed_out.is_err());

        let pid = std::fs::read_to_string(dir.path().join("pid")).unwrap();
        let pid = pid.trim().to_string();
        let mut alive = true;
        for _ in 0..100 {
            let status = std::process::Command::new("kill")
                .args(["-0", &pid])
                .stderr(Stdio::null())
                .status()
                .unwrap();
            if !status.success() {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "bridge process {} survived the dropped run", pid);
    }

    #[tokio::test]
    async fn test_missing_command() {
        let dir = TempDir::new().unwrap();
        let notes = NoteStore::new(BestEffortStore::new(dir.path()));
        let agent = Box::new(ProcessAgent::new(
            "/nonexistent/agent-bridge",
            start_message(),
            MemoryTools::new(notes),
        ));
        let (callback, _events) = recorder();

        assert!(matches!(
            agent.run(callback).await,
            Err(AgentError::Spawn { .. })
        ));
    }
}
