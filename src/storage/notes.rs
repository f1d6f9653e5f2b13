//! Short-term memory notes shared with the agent during a single run.

use std::collections::BTreeMap;
use tracing::info;

use super::store::BestEffortStore;

/// File holding the current session's notes.
pub const MEMORY_FILE: &str = "session_memory.json";

/// Key/value notes, wiped at the start of every run.
#[derive(Debug, Clone)]
pub struct NoteStore {
    store: BestEffortStore,
}

impl NoteStore {
    pub fn new(store: BestEffortStore) -> Self {
        Self { store }
    }

    /// All notes, sorted by key.
    pub fn read_all(&self) -> BTreeMap<String, String> {
        self.store.read(MEMORY_FILE)
    }

    /// Insert or replace a note. Returns `false` if it could not be written.
    pub fn save(&self, key: &str, value: &str) -> bool {
        let mut notes = self.read_all();
        notes.insert(key.to_string(), value.to_string());
        self.store.write(MEMORY_FILE, &notes)
    }

    /// Remove the notes file.
    pub fn clear(&self) {
        if self.store.exists(MEMORY_FILE) && self.store.remove(MEMORY_FILE) {
            info!("🧠 Session memory cleared.");
        }
    }

    /// Tool-facing save: returns the confirmation text handed back to the
    /// agent.
    pub fn save_note(&self, key: &str, value: &str) -> String {
        if self.save(key, value) {
            format!("✓ Saved to memory: {} = {}", key, value)
        } else {
            format!(
                "✗ Error saving: could not write {}",
                self.store.path(MEMORY_FILE).display()
            )
        }
    }

    /// Tool-facing read: a human readable dump of every note.
    pub fn read_notes(&self) -> String {
        if !self.store.exists(MEMORY_FILE) {
            return "Memory is empty. No data saved yet.".to_string();
        }

        let notes = self.read_all();
        if notes.is_empty() {
            return "Memory is empty.".to_string();
        }

        match serde_json::to_string_pretty(&notes) {
            Ok(dump) => format!("Memory Contents:\n{}", dump),
            Err(e) => format!("✗ Error reading: {}", e),
        }
    }
}
