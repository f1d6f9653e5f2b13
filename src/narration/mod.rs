//! Spoken narration of agent activity.
//!
//! Narration is cosmetic. Announcements are fired on detached tasks and are
//! never awaited, so a slow or missing TTS binary cannot hold up a run.

use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Something that can say a short sentence out loud.
pub trait Notifier: Send + Sync {
    /// Announce `text`. Must return promptly and must not panic.
    fn announce(&self, text: &str);
}

pub type NotifierRef = Arc<dyn Notifier>;

/// Drops every announcement.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn announce(&self, _text: &str) {}
}

/// Speaks through a text-to-speech command such as `espeak` or `say`.
#[derive(Debug, Clone)]
pub struct SpeechNotifier {
    command: String,
}

impl SpeechNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Notifier for SpeechNotifier {
    fn announce(&self, text: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available for narration: {}", text);
            return;
        };

        let command = self.command.clone();
        let text = text.to_string();
        runtime.spawn(async move {
            let result = Command::new(&command)
                .arg(&text)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if let Err(e) = result {
                debug!("Narration via {} failed: {}", command, e);
            }
        });
    }
}

/// Phrase to announce for an agent action or tool, matched loosely on the
/// action name.
pub fn narration_for(action: &str) -> Option<&'static str> {
    const PHRASES: [(&str, &str); 5] = [
        ("open_app", "Opening app"),
        ("type", "Typing"),
        ("click", "Clicking"),
        ("scroll", "Scrolling"),
        ("complete", "Task complete"),
    ];

    let action = action.to_lowercase();
    PHRASES
        .iter()
        .find(|(needle, _)| action.contains(needle))
        .map(|(_, phrase)| *phrase)
}
