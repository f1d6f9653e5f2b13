//! Recent command history.

use tracing::warn;

use super::store::BestEffortStore;

/// File holding the most recent commands, newest first.
pub const HISTORY_FILE: &str = "recent_query.json";

/// Maximum number of commands kept.
pub const HISTORY_LIMIT: usize = 10;

/// Most-recent-first list of distinct commands.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    store: BestEffortStore,
}

impl CommandHistory {
    pub fn new(store: BestEffortStore) -> Self {
        Self { store }
    }

    /// Stored commands, newest first.
    pub fn list(&self) -> Vec<String> {
        self.store.read(HISTORY_FILE)
    }

    /// Move `command` to the front, dropping any older copy and anything
    /// past the limit.
    pub fn push(&self, command: &str) {
        let mut history = self.list();
        history.retain(|entry| entry != command);
        history.insert(0, command.to_string());
        history.truncate(HISTORY_LIMIT);

        if !self.store.write(HISTORY_FILE, &history) {
            warn!("Failed to update command history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn history() -> (TempDir, CommandHistory) {
        let dir = TempDir::new().unwrap();
        let history = CommandHistory::new(BestEffortStore::new(dir.path()));
        (dir, history)
    }

    #[test]
    fn test_empty_history() {
        let (_dir, history) = history();
        assert!(history.list().is_empty());
    }

    #[test]
    fn test_duplicate_moves_to_front() {
        let (_dir, history) = history();
        history.push("open settings");
        history.push("open camera");
        history.push("open settings");

        assert_eq!(history.list(), vec!["open settings", "open camera"]);
    }

    #[test]
    fn test_keeps_ten_most_recent() {
        let (_dir, history) = history();
        for i in 0..11 {
            history.push(&format!("command {}", i));
        }

        let list = history.list();
        assert_eq!(list.len(), HISTORY_LIMIT);
        assert_eq!(list[0], "command 10");
        assert_eq!(list[9], "command 1");
        assert!(!list.contains(&"command 0".to_string()));
    }

    #[test]
    fn test_recovers_from_malformed_file() {
        let (dir, history) = history();
        std::fs::write(dir.path().join(HISTORY_FILE), "[[[").unwrap();

        history.push("send a message");
        assert_eq!(history.list(), vec!["send a message"]);
    }
}
